use crate::{compile_to_assembly, Config};
use util::MessageList;

mod codegen;
mod parse;
mod pipeline;
mod regalloc;

/// Compile with defaults, returning the rendered assembly and diagnostics.
pub fn compile(source: &str) -> (Option<String>, MessageList) {
    compile_to_assembly("test.edel", source, Config::default())
}

/// Compile, asserting success; returns the rendered assembly.
pub fn compile_ok(source: &str) -> String {
    let (assembly, messages) = compile(source);
    assert!(
        !messages.has_error(),
        "unexpected errors: {:?}",
        messages.iter().map(|m| m.text().to_string()).collect::<Vec<_>>()
    );
    assembly.expect("compilation produced no assembly")
}

/// Compile, asserting failure; returns the diagnostics.
pub fn compile_err(source: &str) -> MessageList {
    let (_, messages) = compile(source);
    assert!(messages.has_error(), "expected compilation to fail");
    messages
}
