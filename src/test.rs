use crate::constants::*;
use crate::encoding::InstructionBuilder;
use crate::isa::*;
use crate::registers::{Register, GENERAL_COUNT, GENERAL_START, SYSCALL_START};
use util::EnumVariantNames;

#[test]
fn register_indices_are_stable() {
    assert_eq!(Register::Ip.index(), 0);
    assert_eq!(Register::Rpc.index(), 1);
    assert_eq!(Register::Sp.index(), 2);
    assert_eq!(Register::Fp.index(), 3);
    assert_eq!(Register::Ret.index(), 4);
    assert_eq!(Register::S1.index(), SYSCALL_START);
    assert_eq!(Register::R1.index(), GENERAL_START);
    assert_eq!(Register::R12.index(), GENERAL_START + GENERAL_COUNT - 1);
}

#[test]
fn register_round_trips_through_name() {
    for index in 0..GENERAL_START + GENERAL_COUNT {
        let reg = Register::from_index(index).unwrap();
        assert_eq!(Register::parse(reg.variant_name()), Some(reg));
    }
}

#[test]
fn register_parse_is_case_insensitive() {
    assert_eq!(Register::parse("SP"), Some(Register::Sp));
    assert_eq!(Register::parse("r12"), Some(Register::R12));
    assert_eq!(Register::parse("r13"), None);
}

#[test]
fn condition_prefix_prefers_longest_spelling() {
    assert_eq!(
        ConditionFlag::from_prefix("neq.u"),
        Some((ConditionFlag::Ne, 3))
    );
    assert_eq!(
        ConditionFlag::from_prefix("ne.u"),
        Some((ConditionFlag::Ne, 2))
    );
    assert_eq!(
        ConditionFlag::from_prefix("lte"),
        Some((ConditionFlag::Le, 3))
    );
    assert_eq!(ConditionFlag::from_prefix("z"), Some((ConditionFlag::Z, 1)));
}

#[test]
fn condition_inverse_is_an_involution() {
    let flags = [
        ConditionFlag::Z,
        ConditionFlag::Nz,
        ConditionFlag::Eq,
        ConditionFlag::Ne,
        ConditionFlag::Lt,
        ConditionFlag::Le,
        ConditionFlag::Gt,
        ConditionFlag::Ge,
    ];
    for flag in &flags {
        assert_eq!(flag.inverse().inverse(), *flag);
    }
}

#[test]
fn datatype_suffixes_round_trip() {
    let cases = [
        ("hu", DataType::U32),
        ("u", DataType::U64),
        ("hi", DataType::S32),
        ("i", DataType::S64),
        ("f", DataType::F32),
        ("d", DataType::F64),
    ];
    for (suffix, dt) in &cases {
        assert_eq!(DataType::from_suffix(suffix), Some(*dt));
        assert_eq!(dt.suffix(), *suffix);
    }
    assert_eq!(DataType::from_suffix("q"), None);
}

#[test]
fn builder_packs_fields_lsb_first() {
    // load $r1, 42 : opcode, no-test sentinel, value-slot immediate
    let mut builder = InstructionBuilder::new();
    builder.opcode(Opcode::Load.code());
    builder.no_conditional_test();
    builder.arg_reg(Register::R1.index());
    builder.next_as_value();
    builder.arg_imm(42);

    let expected: u64 = u64::from(Opcode::Load.code())
        | (u64::from(ConditionFlag::None.bits()) << 6)
        | (u64::from(Register::R1.index()) << 10)
        | (0b00 << 18)
        | (42u64 << 20);
    assert_eq!(builder.get(), expected);
}

#[test]
fn builder_value_slot_register_tag() {
    let mut builder = InstructionBuilder::new();
    builder.opcode(Opcode::Load.code());
    builder.no_conditional_test();
    builder.arg_reg(Register::R1.index());
    builder.next_as_value();
    builder.arg_reg(Register::R2.index());

    let expected: u64 = u64::from(Opcode::Load.code())
        | (u64::from(ConditionFlag::None.bits()) << 6)
        | (u64::from(Register::R1.index()) << 10)
        | (0b11 << 18)
        | (u64::from(Register::R2.index()) << 20);
    assert_eq!(builder.get(), expected);
}

#[test]
fn builder_address_slot_register_becomes_indirect() {
    // store $r1, ($sp)
    let mut builder = InstructionBuilder::new();
    builder.opcode(Opcode::Store.code());
    builder.no_conditional_test();
    builder.arg_reg(Register::R1.index());
    builder.next_as_address();
    builder.arg_reg(Register::Sp.index());

    let expected: u64 = u64::from(Opcode::Store.code())
        | (u64::from(ConditionFlag::None.bits()) << 6)
        | (u64::from(Register::R1.index()) << 10)
        | (0b01 << 18)
        | (u64::from(Register::Sp.index()) << 20);
    // the 16-bit zero offset occupies bits 28..44
    assert_eq!(builder.get(), expected);
}

#[test]
fn builder_reg_indirect_offset_is_twos_complement() {
    let mut builder = InstructionBuilder::new();
    builder.opcode(Opcode::Load.code());
    builder.no_conditional_test();
    builder.arg_reg(Register::R1.index());
    builder.next_as_value();
    builder.arg_reg_indirect(Register::Fp.index(), -8);

    let offset_bits = u64::from((-8i16) as u16);
    let expected: u64 = u64::from(Opcode::Load.code())
        | (u64::from(ConditionFlag::None.bits()) << 6)
        | (u64::from(Register::R1.index()) << 10)
        | (0b10 << 18)
        | (u64::from(Register::Fp.index()) << 20)
        | (offset_bits << 28);
    assert_eq!(builder.get(), expected);
}

#[test]
fn builder_conditional_and_datatype_fields() {
    // addeq.i $r1, $r2, 1
    let mut builder = InstructionBuilder::new();
    builder.opcode(Opcode::Add.code());
    builder.conditional_test(ConditionFlag::Eq);
    builder.data_type(DataType::S64);
    builder.arg_reg(Register::R1.index());
    builder.arg_reg(Register::R2.index());
    builder.next_as_value();
    builder.arg_imm(1);

    let expected: u64 = u64::from(Opcode::Add.code())
        | (u64::from(ConditionFlag::Eq.bits()) << 6)
        | (u64::from(DataType::S64.bits()) << 10)
        | (u64::from(Register::R1.index()) << 13)
        | (u64::from(Register::R2.index()) << 21)
        | (0b00 << 29)
        | (1u64 << 31);
    assert_eq!(builder.get(), expected);
}

#[test]
fn encoding_is_deterministic() {
    let build = || {
        let mut b = InstructionBuilder::new();
        b.opcode(Opcode::Syscall.code());
        b.no_conditional_test();
        b.next_as_value();
        b.arg_imm(Syscall::Exit.code() as u32);
        b.get()
    };
    assert_eq!(build(), build());
}

#[test]
fn header_constants() {
    assert_eq!(HEADER_BYTES, 16);
    assert_eq!(INSTRUCTION_BYTES, 8);
    assert_eq!(ENTRY_LABEL, "main");
}
