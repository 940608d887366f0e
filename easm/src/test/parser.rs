use super::{assemble_clean, assemble_collect};
use crate::args::Argument;
use crate::chunks::ChunkPayload;
use crate::instructions::Instruction;
use eisa::constants::HEADER_BYTES;
use eisa::{ConditionFlag, DataType, Opcode, Register};
use matches::assert_matches;
use util::Level;

fn instruction(payload: &ChunkPayload) -> &Instruction {
    match payload {
        ChunkPayload::Instruction(instruction) => instruction,
        _ => panic!("expected an instruction chunk"),
    }
}

#[test]
fn simple_program_produces_two_instruction_chunks() {
    let data = assemble_clean("main:\n    load $r1, 42\n    exit\n");

    assert_eq!(data.chunks.len(), 2);
    assert_eq!(data.chunks[0].offset, 0);
    assert_eq!(data.chunks[1].offset, 8);
    assert_eq!(data.entry_point(), Some(HEADER_BYTES));

    let load = instruction(&data.chunks[0].payload);
    assert_eq!(load.signature.opcode, Opcode::Load);
    assert_eq!(
        load.args,
        vec![
            Argument::Register(Register::R1.index()),
            Argument::Immediate(42)
        ]
    );

    // the exit intercept produced a syscall
    let syscall = instruction(&data.chunks[1].payload);
    assert_eq!(syscall.signature.opcode, Opcode::Syscall);
}

#[test]
fn exit_with_code_expands_to_load_and_syscall() {
    let data = assemble_clean("exit 3");
    assert_eq!(data.chunks.len(), 2);

    let load = instruction(&data.chunks[0].payload);
    assert_eq!(load.signature.opcode, Opcode::Load);
    assert_eq!(
        load.args,
        vec![
            Argument::Register(Register::Ret.index()),
            Argument::Immediate(3)
        ]
    );

    let syscall = instruction(&data.chunks[1].payload);
    assert_eq!(syscall.signature.opcode, Opcode::Syscall);
    assert_eq!(syscall.args, vec![Argument::Immediate(0)]);
}

#[test]
fn backward_label_reference_is_resolved_immediately() {
    let data = assemble_clean("target:\n    nop\n    b target\n");
    let branch = instruction(&data.chunks[1].payload);
    // branch lowers to load $ip, <addr>
    assert_eq!(branch.signature.opcode, Opcode::Load);
    assert_eq!(branch.args[0], Argument::Register(Register::Ip.index()));
    assert_eq!(branch.args[1], Argument::Immediate(HEADER_BYTES));
}

#[test]
fn forward_label_reference_is_patched_on_definition() {
    let data = assemble_clean("    b after\n    nop\nafter:\n    nop\n");
    let branch = instruction(&data.chunks[0].payload);
    assert_eq!(branch.args[1], Argument::Immediate(HEADER_BYTES + 16));

    // nothing unresolved remains
    for chunk in &data.chunks {
        assert_eq!(chunk.first_label(), None);
    }
}

#[test]
fn unresolved_label_at_eof_is_an_error() {
    let (result, messages) = assemble_collect("b nowhere\n");
    assert!(result.is_err());
    assert!(messages.iter().any(|m| m.text().contains("unresolved reference to label nowhere")));
}

#[test]
fn duplicate_main_label_is_an_error() {
    let (result, messages) = assemble_collect("main:\nnop\nmain:\nnop\n");
    assert!(result.is_err());
    assert!(messages.has_error());
    assert!(messages.has_message_of(Level::Note));
}

#[test]
fn duplicate_ordinary_label_warns_and_updates() {
    let (result, messages) = assemble_collect("x:\nnop\nx:\nload $r1, x\n");
    let data = result.expect("should still assemble");
    assert!(messages.has_message_of(Level::Warning));
    assert!(!messages.has_error());
    // the second definition (offset 8) wins
    let load = instruction(&data.chunks[1].payload);
    assert_eq!(load.args[1], Argument::Immediate(HEADER_BYTES + 8));
}

#[test]
fn unknown_mnemonic_is_an_error() {
    let (result, messages) = assemble_collect("frobnicate $r1\n");
    assert!(result.is_err());
    assert!(messages.iter().any(|m| m.text().contains("unknown mnemonic")));
}

#[test]
fn two_argument_arithmetic_duplicates_the_destination() {
    let data = assemble_clean("add $r1, 5\n");
    let add = instruction(&data.chunks[0].payload);
    assert_eq!(add.overload, 1);
    assert_eq!(
        add.args,
        vec![
            Argument::Register(Register::R1.index()),
            Argument::Register(Register::R1.index()),
            Argument::Immediate(5)
        ]
    );
}

#[test]
fn conditional_and_datatype_suffixes() {
    let data = assemble_clean("addeq.i $r1, $r2, 1\n");
    let add = instruction(&data.chunks[0].payload);
    assert_eq!(add.test, Some(ConditionFlag::Eq));
    assert_eq!(add.datatypes, vec![DataType::S64]);
}

#[test]
fn missing_datatype_defaults_to_u64() {
    let data = assemble_clean("add $r1, $r2, 1\n");
    let add = instruction(&data.chunks[0].payload);
    assert_eq!(add.datatypes, vec![DataType::U64]);
}

#[test]
fn unknown_conditional_suffix_is_an_error() {
    let (result, messages) = assemble_collect("addqq $r1, $r2, 1\n");
    assert!(result.is_err());
    assert!(messages.iter().any(|m| m.text().contains("unknown conditional test")));
}

#[test]
fn cvt_parses_two_datatypes() {
    let data = assemble_clean("cvthi2f $r1\n");
    let cvt = instruction(&data.chunks[0].payload);
    assert_eq!(cvt.datatypes, vec![DataType::S32, DataType::F32]);
    // unary form duplicated the register
    assert_eq!(cvt.args.len(), 2);
}

#[test]
fn cvt_without_separator_is_an_error() {
    let (result, messages) = assemble_collect("cvthif $r1\n");
    assert!(result.is_err());
    assert!(messages.iter().any(|m| m.text().contains("expected '2'")));
}

#[test]
fn overload_mismatch_lists_candidates() {
    let (result, messages) = assemble_collect("store 5, 6\n");
    assert!(result.is_err());
    let error = messages
        .iter()
        .find(|m| m.level() == Level::Error)
        .expect("an error");
    assert!(error.text().contains("no match for mnemonic store"));
    assert!(error.text().contains("<reg> <addr>"));
}

#[test]
fn register_indirect_arguments() {
    let data = assemble_clean("load $r1, -8($fp)\n");
    let load = instruction(&data.chunks[0].payload);
    assert_eq!(
        load.args[1],
        Argument::RegisterIndirect {
            reg: Register::Fp.index(),
            offset: -8
        }
    );
}

#[test]
fn address_arguments() {
    let data = assemble_clean("store $r1, (0x80)\n");
    let store = instruction(&data.chunks[0].payload);
    assert_eq!(store.args[1], Argument::Address(0x80));
}

#[test]
fn character_literal_arguments() {
    let data = assemble_clean("load $r1, 'A'\nload $r2, '\\n'\n");
    assert_eq!(instruction(&data.chunks[0].payload).args[1], Argument::Immediate(65));
    assert_eq!(instruction(&data.chunks[1].payload).args[1], Argument::Immediate(10));
}

#[test]
fn decimal_immediate_argument() {
    let data = assemble_clean("load $r1, 2.5\n");
    assert_matches!(
        instruction(&data.chunks[0].payload).args[1],
        Argument::DecimalImmediate(_)
    );
}

#[test]
fn loadw_splits_a_wide_immediate() {
    let data = assemble_clean("loadw $r1, 0xDEADBEEFCAFEBABE\n");
    assert_eq!(data.chunks.len(), 2);
    let low = instruction(&data.chunks[0].payload);
    let high = instruction(&data.chunks[1].payload);
    assert_eq!(low.signature.opcode, Opcode::Load);
    assert_eq!(low.args[1], Argument::Immediate(0xCAFEBABE));
    assert_eq!(high.signature.opcode, Opcode::Loadu);
    assert_eq!(high.args[1], Argument::Immediate(0xDEADBEEF));
}

#[test]
fn zero_is_load_zero() {
    let data = assemble_clean("zero $r3\n");
    let load = instruction(&data.chunks[0].payload);
    assert_eq!(load.signature.opcode, Opcode::Load);
    assert_eq!(
        load.args,
        vec![Argument::Register(Register::R3.index()), Argument::Immediate(0)]
    );
}

#[test]
fn data_directive_sizes() {
    let data = assemble_clean(".byte 1, 2\n.data 3\n.word 4\n");
    assert_eq!(data.chunks[0].size(), 2);
    assert_eq!(data.chunks[1].size(), 4);
    assert_eq!(data.chunks[2].size(), 8);
}

#[test]
fn empty_data_directive_reserves_one_element() {
    let data = assemble_clean(".word\n");
    assert_eq!(data.chunks[0].size(), 8);
    match &data.chunks[0].payload {
        ChunkPayload::Data(bytes) => assert_eq!(bytes, &vec![0u8; 8]),
        _ => panic!("expected data chunk"),
    }
}

#[test]
fn string_data_is_nul_terminated() {
    let data = assemble_clean(".byte \"ab\"\n");
    match &data.chunks[0].payload {
        ChunkPayload::Data(bytes) => assert_eq!(bytes, &vec![b'a', b'b', 0]),
        _ => panic!("expected data chunk"),
    }
}

#[test]
fn forward_label_in_data_directive_is_an_error() {
    let (result, messages) = assemble_collect(".word later\nlater:\n");
    assert!(result.is_err());
    assert!(messages
        .iter()
        .any(|m| m.text().contains("labels cannot be used prior to declaration")));
}

#[test]
fn backward_label_in_data_directive_uses_its_address() {
    let data = assemble_clean("here:\nnop\n.word here\n");
    match &data.chunks[1].payload {
        ChunkPayload::Data(bytes) => {
            let mut expected = vec![0u8; 8];
            expected[0] = HEADER_BYTES as u8;
            assert_eq!(bytes, &expected);
        }
        _ => panic!("expected data chunk"),
    }
}

#[test]
fn org_raises_the_offset() {
    let data = assemble_clean(".org 0x20\nnop\n");
    assert_eq!(data.chunks[0].offset, 0x20);
}

#[test]
fn org_lowering_warns() {
    let (result, messages) = assemble_collect("nop\nnop\n.org 0\nnop\n");
    assert!(result.is_ok());
    assert!(messages.has_message_of(Level::Warning));
}

#[test]
fn parenthesised_label_is_an_address_reference() {
    let data = assemble_clean("value:\n.word 7\nload $r1, (value)\n");
    let load = instruction(&data.chunks[1].payload);
    // resolves to an Address so the encoder uses the memory tag
    assert_eq!(load.args[1], Argument::Address(HEADER_BYTES));
}

#[test]
fn label_with_offset_arithmetic() {
    let data = assemble_clean("base:\nnop\nload $r1, base + 8\n");
    let load = instruction(&data.chunks[1].payload);
    assert_eq!(load.args[1], Argument::Immediate(HEADER_BYTES + 8));
}

#[test]
fn reconstruction_contains_origin_annotations() {
    let data = assemble_clean("main:\n    load $r1, 42\n    exit\n");
    let mut out = Vec::new();
    crate::parser::reconstruct_assembly(&data, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("load $r1, 0x2a"));
    assert!(lines[0].contains("test.asm:2+0"), "{}", lines[0]);
    assert!(lines[1].contains("+8"), "{}", lines[1]);
}
