//! End-to-end checks: the emitted assembly must assemble cleanly.

use super::compile_ok;
use util::MessageList;

fn assemble(asm: &str) -> easm::data::Data {
    let mut messages = MessageList::new();
    let options = easm::Options::default();
    let result = easm::assemble_str("prog.asm", asm, &options, &mut messages);
    assert!(
        !messages.has_error(),
        "assembler rejected compiler output: {:?}\n---\n{}",
        messages
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>(),
        asm
    );
    result.expect("assembly failed")
}

#[test]
fn globals_and_arithmetic_assemble() {
    let asm = compile_ok("let x: i32 = 5 + 2;\nlet y: i64 = 10;\nlet z: i64 = y * 3;");
    let data = assemble(&asm);
    assert!(data.entry_point().is_some());
    assert!(!data.chunks.is_empty());
}

#[test]
fn control_flow_assembles() {
    let asm = compile_ok(
        "let i: i64 = 0;\nwhile i < 10 {\n  if i == 5 { break; }\n  i = i + 1;\n}",
    );
    let data = assemble(&asm);

    // every generated block label resolved; no placeholders remain
    for chunk in &data.chunks {
        assert_eq!(chunk.first_label(), None);
    }
}

#[test]
fn functions_and_calls_assemble() {
    let asm = compile_ok(
        "fn add(a: i64, b: i64) -> i64 { return a + b; }\nlet s: i64 = add(2, 3);",
    );
    let data = assemble(&asm);

    let mut image = Vec::new();
    easm::binary::write_binary(&data, &mut image).unwrap();
    // header plus at least the call sequence
    assert!(image.len() > 16);
}

#[test]
fn floats_and_casts_assemble() {
    let asm = compile_ok("let a: f64 = 2.5;\nlet b: i64 = 4;\nlet c: f64 = (b as f64) / a;");
    assemble(&asm);
}

#[test]
fn arrays_and_subscripts_assemble() {
    let asm = compile_ok("let a: [i64; 3] = [1, 2, 3];\nlet x: i64 = a[1];");
    assemble(&asm);
}

#[test]
fn lazy_logic_assembles() {
    let asm = compile_ok(
        "let a: bool = true;\nlet b: bool = false;\nif a && (b || a) { } else { }",
    );
    assemble(&asm);
}

#[test]
fn reconstruction_round_trips_origins() {
    let asm = compile_ok("let x: i64 = 1;\nlet y: i64 = x;");
    let data = assemble(&asm);

    let mut reconstruction = Vec::new();
    easm::parser::reconstruct_assembly(&data, &mut reconstruction).unwrap();
    let text = String::from_utf8(reconstruction).unwrap();

    // every reconstructed line carries a prog.asm origin and a byte offset
    for line in text.lines() {
        assert!(line.contains("prog.asm:"), "{}", line);
        assert!(line.contains('+'), "{}", line);
    }
}
