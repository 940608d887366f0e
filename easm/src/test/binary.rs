use super::assemble_clean;
use crate::binary::write_binary;
use byteorder::ByteOrder;
use eisa::constants::DEFAULT_INTERRUPT_ADDR;
use eisa::{InstructionBuilder, Opcode, Register, Syscall};
use util::Endian;

fn image(source: &str) -> Vec<u8> {
    let data = assemble_clean(source);
    let mut out = Vec::new();
    write_binary(&data, &mut out).unwrap();
    out
}

#[test]
fn header_carries_entry_and_interrupt_words() {
    let out = image("main:\n    load $r1, 42\n    exit\n");

    assert_eq!(Endian::read_u64(&out[0..8]), 0x10);
    assert_eq!(Endian::read_u64(&out[8..16]), DEFAULT_INTERRUPT_ADDR);
    // two 64-bit instruction words follow
    assert_eq!(out.len(), 16 + 16);

    let expected_load = {
        let mut b = InstructionBuilder::new();
        b.opcode(Opcode::Load.code());
        b.no_conditional_test();
        b.arg_reg(Register::R1.index());
        b.next_as_value();
        b.arg_imm(42);
        b.get()
    };
    assert_eq!(Endian::read_u64(&out[16..24]), expected_load);

    let expected_syscall = {
        let mut b = InstructionBuilder::new();
        b.opcode(Opcode::Syscall.code());
        b.no_conditional_test();
        b.next_as_value();
        b.arg_imm(Syscall::Exit.code() as u32);
        b.get()
    };
    assert_eq!(Endian::read_u64(&out[24..32]), expected_syscall);
}

#[test]
fn missing_entry_point_writes_zero() {
    let out = image("nop\n");
    assert_eq!(Endian::read_u64(&out[0..8]), 0);
}

#[test]
fn interrupt_label_fills_the_second_header_word() {
    let out = image("nop\ninterrupt:\n    rti\n");
    assert_eq!(Endian::read_u64(&out[8..16]), 0x10 + 8);
}

#[test]
fn data_directives_lay_out_little_endian() {
    let out = image("start:\n.word 0xDEADBEEFCAFEBABE\n.space 4\n.byte 1, 2, 3\n");
    let body = &out[16..];

    assert_eq!(
        &body[0..8],
        &[0xBE, 0xBA, 0xFE, 0xCA, 0xEF, 0xBE, 0xAD, 0xDE]
    );
    assert_eq!(&body[8..12], &[0, 0, 0, 0]);
    assert_eq!(&body[12..15], &[1, 2, 3]);
    assert_eq!(body.len(), 15);
}

#[test]
fn org_gap_is_zero_filled() {
    let out = image(".byte 0xFF\n.org 0x10\n.byte 0xEE\n");
    let body = &out[16..];
    assert_eq!(body[0], 0xFF);
    assert!(body[1..0x10].iter().all(|&b| b == 0));
    assert_eq!(body[0x10], 0xEE);
    assert_eq!(body.len(), 0x11);
}

#[test]
fn images_are_bit_identical_across_runs() {
    let source = "main:\n    addlt.i $r1, $r2, $r3\n    cmp $r1, 0\n    exit 7\n";
    assert_eq!(image(source), image(source));
}

#[test]
fn decimal_data_narrowing() {
    // .data narrows doubles to single precision
    let out = image(".data 2.5\n");
    let body = &out[16..];
    assert_eq!(Endian::read_u32(body), 2.5f32.to_bits());

    // .word keeps the full double
    let out = image(".word 2.5\n");
    let body = &out[16..];
    assert_eq!(Endian::read_u64(body), 2.5f64.to_bits());
}
