use super::{compile_err, compile_ok};

#[test]
fn global_let_reserves_and_stores() {
    let asm = compile_ok("let x: i32 = 5 + 2;");

    // a labelled block reserves the global's four bytes
    assert!(asm.contains("globl_"), "{}", asm);
    assert!(asm.contains(".space 4"), "{}", asm);

    // the sum is computed on the signed 32-bit datatype and stored
    assert!(asm.contains("add.hi"), "{}", asm);
    assert!(asm.contains("store $r1, (globl_"), "{}", asm);
}

#[test]
fn emitted_lines_carry_origin_annotations() {
    let asm = compile_ok("let x: i64 = 1;");
    assert!(asm.contains("; @test.edel:1"), "{}", asm);
}

#[test]
fn top_level_flow_ends_with_exit() {
    let asm = compile_ok("let x: i64 = 1;");
    let main_block: Vec<&str> = asm.lines().collect();
    assert!(main_block.iter().any(|l| l.trim_start().starts_with("exit")));
}

#[test]
fn if_else_produces_three_blocks_and_a_fused_compare() {
    let asm = compile_ok(
        "fn f() { }\nfn g() { }\nlet a: i64 = 0;\nif a == 0 { f(); } else { g(); }",
    );

    assert!(asm.contains("then_"), "{}", asm);
    assert!(asm.contains("else_"), "{}", asm);
    assert!(asm.contains("after_"), "{}", asm);

    // the relational guard fuses into compare-and-branch
    assert!(asm.contains("cmp.i"), "{}", asm);
    assert!(asm.contains("beq then_"), "{}", asm);
    assert!(asm.contains("bne else_"), "{}", asm);
    // the then branch jumps over the else branch
    assert!(asm.contains("jmp after_"), "{}", asm);
}

#[test]
fn plain_boolean_guard_compares_to_zero() {
    let asm = compile_ok("let a: bool = true;\nif a { }");
    assert!(asm.contains("cmp"), "{}", asm);
    assert!(asm.contains("bnz then_"), "{}", asm);
}

#[test]
fn while_loop_shape() {
    let asm = compile_ok("let i: i64 = 0;\nwhile i < 10 { i = i + 1; }");

    assert!(asm.contains("whileguard_"), "{}", asm);
    assert!(asm.contains("whilebody_"), "{}", asm);
    assert!(asm.contains("endwhile_"), "{}", asm);
    // the body loops back to the guard
    assert!(asm.contains("jmp whileguard_"), "{}", asm);
    // the guard branches into the body and past the loop
    assert!(asm.contains("blt whilebody_"), "{}", asm);
    assert!(asm.contains("bge endwhile_"), "{}", asm);
}

#[test]
fn loop_with_break_and_continue() {
    let asm = compile_ok("let i: i64 = 0;\nloop { if i == 3 { break; } i = i + 1; continue; }");
    assert!(asm.contains("loopbody_"), "{}", asm);
    assert!(asm.contains("endloop_"), "{}", asm);
    assert!(asm.contains("jmp endloop_"), "{}", asm); // break
    assert!(asm.contains("jmp loopbody_"), "{}", asm); // continue / loop back
}

#[test]
fn break_outside_a_loop_is_an_error() {
    let messages = compile_err("break;");
    assert!(messages
        .iter()
        .any(|m| m.text().contains("must be inside a loop")));
}

#[test]
fn function_definition_and_call() {
    let asm = compile_ok("fn add1(x: i64) -> i64 { return x + 1; }\nlet y: i64 = add1(4);");

    // the function body lives in its own labelled block
    assert!(asm.contains("func_"), "{}", asm);
    assert!(asm.contains("jal func_"), "{}", asm);
    assert!(asm.contains("call add1: fn(i64) -> i64"), "{}", asm);

    // the calling convention saves and restores the linkage registers
    assert!(asm.contains("save $rpc"), "{}", asm);
    assert!(asm.contains("save $fp"), "{}", asm);
    assert!(asm.contains("restore $rpc"), "{}", asm);
    assert!(asm.contains("restore $fp"), "{}", asm);

    // arguments are pushed into the callee frame
    assert!(asm.contains("arg #1: i64"), "{}", asm);
    // the stack is net-cleaned after the call
    assert!(asm.contains("stack clean-up"), "{}", asm);

    // the function returns its value through a register
    assert!(asm.contains("ret $r"), "{}", asm);
}

#[test]
fn unit_function_gets_an_implicit_return() {
    let asm = compile_ok("fn noop() { }");
    let block_start = asm.find("func_").expect("function block missing");
    let tail = &asm[block_start..];
    assert!(tail.contains("ret"), "{}", tail);
}

#[test]
fn missing_return_is_an_error() {
    let messages = compile_err("fn f() -> i64 { }");
    assert!(messages
        .iter()
        .any(|m| m.text().contains("missing return statement")));
}

#[test]
fn function_overloads_resolve_by_argument_types() {
    let asm = compile_ok(
        "fn pick(x: i64) -> i64 { return 1; }\nfn pick(x: f64) -> i64 { return 2; }\nlet a: i64 = pick(1.5);",
    );
    assert!(asm.contains("call pick: fn(f64) -> i64"), "{}", asm);
}

#[test]
fn declaration_emits_a_stub_body() {
    let asm = compile_ok("fn promised() -> i64;");
    assert!(asm.contains("func_"), "{}", asm);
    assert!(asm.contains("ret 0"), "{}", asm);
}

#[test]
fn namespace_members_are_called_by_qualified_name() {
    let asm = compile_ok("namespace m { fn f() { } }\nm.f();");
    assert!(asm.contains("call m.f"), "{}", asm);
}

#[test]
fn namespace_cannot_be_shadowed() {
    let messages = compile_err("namespace m { }\nlet m: i64 = 1;");
    assert!(messages
        .iter()
        .any(|m| m.text().contains("cannot be shadowed")));
}

#[test]
fn global_array_literal_is_stored_elementwise() {
    let asm = compile_ok("let a: [i64; 3] = [1, 2, 3];");
    assert!(asm.contains(".space 24"), "{}", asm);
    assert!(asm.contains("store $r1, (globl_"), "{}", asm);
    assert!(asm.contains("+ 8)"), "{}", asm);
    assert!(asm.contains("+ 16)"), "{}", asm);
}

#[test]
fn array_length_property_folds() {
    let asm = compile_ok("let a: [i64; 3] = [1, 2, 3];\nlet n: u64 = a.length;");
    // the length is a folded constant, loaded as a plain immediate
    assert!(asm.contains(".length: u64"), "{}", asm);
}

#[test]
fn sizeof_folds_to_a_constant() {
    let asm = compile_ok("let s: u64 = sizeof(2.5);");
    assert!(asm.contains("loadw $r1, 8"), "{}", asm);
    assert!(asm.contains("sizeof(f64)"), "{}", asm);
}

#[test]
fn pointer_roundtrip() {
    let asm = compile_ok("let x: i64 = 5;\nlet p: *i64 = &x;\nlet y: i64 = *p;");
    // the address load and the dereference both appear
    assert!(asm.contains("&x: *i64"), "{}", asm);
    assert!(asm.contains("deref *i64"), "{}", asm);
}

#[test]
fn subscript_scales_by_element_size() {
    let asm = compile_ok("let a: [i64; 4] = [1, 2, 3, 4];\nlet x: i64 = a[2];");
    // index scaled by eight then added to the base
    assert!(asm.contains("mul.u"), "{}", asm);
    assert!(asm.contains("operator[]([i64; 4], u64)"), "{}", asm);
}

#[test]
fn cast_emits_a_conversion() {
    let asm = compile_ok("let a: i64 = 5;\nlet b: f64 = a as f64;");
    assert!(asm.contains("cvti2d"), "{}", asm);
}

#[test]
fn pointer_to_integer_cast_is_rejected() {
    let messages = compile_err("let x: i64 = 5;\nlet p: *i64 = x as *i64;");
    assert!(messages.iter().any(|m| m.text().contains("not a subtype")));
}

#[test]
fn lazy_and_uses_a_rhs_block() {
    let asm = compile_ok("let a: bool = true;\nlet b: bool = true;\nif a && b { }");
    assert!(asm.contains("rhs_"), "{}", asm);
}

#[test]
fn lazy_or_materialises_without_a_conditional() {
    let asm = compile_ok("let a: bool = true;\nlet b: bool = false;\nlet c: bool = a || b;");
    assert!(asm.contains("true_"), "{}", asm);
    assert!(asm.contains("false_"), "{}", asm);
    assert!(asm.contains("end_"), "{}", asm);
    assert!(asm.contains("load $ret, 1"), "{}", asm);
    assert!(asm.contains("load $ret, 0"), "{}", asm);
}

#[test]
fn assignment_to_constant_is_an_error() {
    let messages = compile_err("const c: i64 = 1;\nc = 2;");
    assert!(messages
        .iter()
        .any(|m| m.text().contains("unable to assign to constant symbol")));
}

#[test]
fn type_mismatch_reports_both_spellings() {
    let messages = compile_err("let x: i32 = true;");
    assert!(messages
        .iter()
        .any(|m| m.text().contains("type bool is not a subtype of i32")));
}

#[test]
fn unknown_symbol_is_reported() {
    let messages = compile_err("let x: i64 = missing;");
    assert!(messages
        .iter()
        .any(|m| m.text().contains("unknown symbol 'missing'")));
}

#[test]
fn call_arity_mismatch_reports_the_declaration() {
    let messages = compile_err("fn f(x: i64) { }\nf();");
    assert!(messages
        .iter()
        .any(|m| m.text().contains("expected 1 argument, got 0")));
    assert!(messages.iter().any(|m| m.text().contains("defined here")));
}

#[test]
fn negation_and_not() {
    let asm = compile_ok("let a: i64 = 5;\nlet b: i64 = -a;\nlet c: bool = !(a == 5);");
    // negation computes 0 - a
    assert!(asm.contains("sub.i"), "{}", asm);
}

#[test]
fn discard_binding_evaluates_without_storing() {
    let asm = compile_ok("fn f() -> i64 { return 1; }\nlet _ = f();");
    assert!(asm.contains("jal func_"), "{}", asm);
    // nothing was allocated for the binding itself
    assert!(!asm.contains("alloc _"), "{}", asm);
}
