//! Compiler from the edel language to textual assembly.
//!
//! Compilation is a four-phase pipeline over the AST (see
//! [`ast`](ast/index.html)): collate declarations into a registry, process
//! (type-check), resolve symbol references, and generate code into an
//! [assembly program](assembly/struct.Program.html) of labelled basic
//! blocks. The program is then rendered as text for the assembler, every
//! line annotated with its high-level origin (`; @file:line:col`) so the
//! visualizer can trace emitted bytes back to source.
//!
//! The language is statically typed with subtyping along integer
//! widenings, `f32` to `f64`, and array-to-pointer decay. Functions
//! overload by signature; operators resolve through a registry scored by
//! exact-match count.

#[macro_use]
extern crate pest_derive;

pub mod assembly;
pub mod ast;
pub mod builtins;
pub mod context;
pub mod create;
pub mod operators;
pub mod parser;
pub mod regalloc;
pub mod stack;
pub mod symbols;
pub mod types;
pub mod value;

#[cfg(test)]
mod test;

pub use context::{Config, Context};

use symbols::Registry;
use util::{MessageList, PhaseResult};

/// Run the full pipeline over `source`, returning the rendered assembly.
/// Diagnostics accumulate in the returned list; `None` means failure.
pub fn compile_to_assembly(
    path: &str,
    source: &str,
    config: Config,
) -> (Option<String>, MessageList) {
    let indent = config.indent_asm;
    let mut ctx = Context::new(config);

    match compile(&mut ctx, path, source) {
        Ok(()) => {
            let text = ctx.program.render(indent);
            (Some(text), ctx.messages)
        }
        Err(_) => (None, ctx.messages),
    }
}

fn compile(ctx: &mut Context, path: &str, source: &str) -> PhaseResult {
    let mut nodes = parser::parse_program(path, source, &mut ctx.messages)?;

    if ctx.config.print_ast {
        for node in &nodes {
            print!("{}", ast_tree(node, 0));
        }
    }

    // phase 1: collate declarations for forward references
    let mut registry = Registry::new();
    for node in &mut nodes {
        node.collate_registry(ctx, &mut registry)?;
    }
    ctx.symbols.insert_registry(registry);

    // phase 2: type-check
    for node in &mut nodes {
        node.process(ctx)?;
    }

    // phase 3: pin down symbol references
    for node in &mut nodes {
        node.resolve(ctx)?;
    }

    // phase 4: emit
    for node in &mut nodes {
        ctx.program.add_location(node.loc().clone());
        let result = node.generate_code(ctx);
        ctx.program.remove_location();
        result?;
        ctx.regs.mark_all_free();
    }

    // terminate the top-level flow
    ctx.program.add(create::exit());
    Ok(())
}

/// A one-line-per-node rendering of the AST, used by `--ast`.
pub fn ast_tree(node: &ast::Node, indent: usize) -> String {
    use ast::Node;
    let pad = "  ".repeat(indent);
    let mut out = String::new();

    let (label, children): (String, Vec<&Node>) = match node {
        Node::Block(n) => ("block".to_string(), n.stmts.iter().collect()),
        Node::Let(n) => (
            format!("{} {}", if n.constant { "const" } else { "let" }, n.name),
            n.init.iter().map(|b| &**b).collect(),
        ),
        Node::If(n) => {
            let mut children: Vec<&Node> = vec![&n.guard, &n.then_branch];
            if let Some(else_branch) = &n.else_branch {
                children.push(else_branch);
            }
            ("if".to_string(), children)
        }
        Node::While(n) => ("while".to_string(), vec![&n.guard, &n.body]),
        Node::Loop(n) => ("loop".to_string(), vec![&n.body]),
        Node::LoopControl(n) => (
            if n.is_break { "break" } else { "continue" }.to_string(),
            Vec::new(),
        ),
        Node::Return(n) => ("return".to_string(), n.expr.iter().map(|b| &**b).collect()),
        Node::Namespace(n) => (format!("namespace {}", n.name), n.stmts.iter().collect()),
        Node::Function(n) => (
            format!("fn {}({} params)", n.name, n.params.len()),
            n.body.iter().map(|b| &**b).collect(),
        ),
        Node::Literal(n) => (
            match &n.source {
                ast::LiteralSource::Int(_, text) => text.clone(),
                ast::LiteralSource::Float(_, text) => text.clone(),
                ast::LiteralSource::Bool(b) => b.to_string(),
                ast::LiteralSource::Char(c) => format!("'{}'", *c as char),
            },
            Vec::new(),
        ),
        Node::ArrayLiteral(n) => ("array literal".to_string(), n.elements.iter().collect()),
        Node::SymbolRef(n) => (n.name.clone(), Vec::new()),
        Node::Unary(n) => (format!("unary {}", n.symbol), vec![&n.operand]),
        Node::Binary(n) => (format!("binary {}", n.symbol), n.args.iter().collect()),
        Node::Assign(n) => ("assign".to_string(), n.args.iter().collect()),
        Node::Dot(n) => (format!(".{}", n.property), vec![&n.lhs]),
        Node::AddressOf(n) => ("address-of".to_string(), vec![&n.operand]),
        Node::Deref(n) => ("dereference".to_string(), vec![&n.operand]),
        Node::Subscript(n) => ("subscript".to_string(), n.args.iter().collect()),
        Node::Cast(n) => ("cast".to_string(), vec![&n.operand]),
        Node::Call(n) => {
            let mut children: Vec<&Node> = vec![&n.subject];
            children.extend(n.args.iter());
            ("call".to_string(), children)
        }
        Node::SizeOf(n) => ("sizeof".to_string(), vec![&n.operand]),
        Node::Lazy(n) => (
            if n.and { "&&" } else { "||" }.to_string(),
            n.args.iter().collect(),
        ),
    };

    out.push_str(&format!("{}{}\n", pad, label));
    for child in children {
        out.push_str(&ast_tree(child, indent + 1));
    }
    out
}
