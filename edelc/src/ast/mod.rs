//! The abstract syntax tree and its four-phase lowering pipeline.
//!
//! Every node supports the same contract:
//!
//! 1. `collate_registry` gathers declarations into a scope-local registry
//!    so later siblings can reference them (forward references).
//! 2. `process` type-checks and attaches a [`Value`](../value/struct.Value.html)
//!    to the node. Children are processed first.
//! 3. `resolve` narrows unresolved symbol references using type hints;
//!    it is idempotent.
//! 4. `generate_code` emits instructions into the current basic block and
//!    attaches the node's rvalue.

use crate::context::{ConditionalContext, Context, LoopContext};
use crate::symbols::{Registry, StorageLocation};
use crate::types::TypeId;
use crate::value::Value;
use util::{Failed, Location, Message, PhaseResult};

pub mod expr;
pub mod func;
pub mod stmt;

pub use expr::*;
pub use func::*;
pub use stmt::*;

/// Unresolved type spelling from the parser; resolved against the type
/// graph during `process`.
#[derive(Clone, Debug)]
pub enum TypeExpr {
    Named(String, Location),
    Unit,
    Pointer(Box<TypeExpr>),
    Array(Box<TypeExpr>, u64),
    Function(Vec<TypeExpr>, Option<Box<TypeExpr>>),
}

pub fn resolve_type(ctx: &mut Context, spec: &TypeExpr) -> PhaseResult<TypeId> {
    match spec {
        TypeExpr::Named(name, loc) => match ctx.types.named(name) {
            Some(id) => Ok(id),
            None => {
                ctx.messages.add(Message::error(
                    loc.copy(),
                    format!("unknown type '{}'", name),
                ));
                Err(Failed)
            }
        },
        TypeExpr::Unit => Ok(crate::types::UNIT),
        TypeExpr::Pointer(inner) => {
            let inner = resolve_type(ctx, inner)?;
            Ok(ctx.types.pointer_to(inner))
        }
        TypeExpr::Array(inner, count) => {
            let inner = resolve_type(ctx, inner)?;
            Ok(ctx.types.array_of(inner, *count))
        }
        TypeExpr::Function(params, ret) => {
            let mut param_ids = Vec::with_capacity(params.len());
            for param in params {
                param_ids.push(resolve_type(ctx, param)?);
            }
            let ret = match ret {
                Some(ret) => resolve_type(ctx, ret)?,
                None => crate::types::UNIT,
            };
            Ok(ctx.types.function_of(param_ids, ret))
        }
    }
}

/// State shared by every node kind.
#[derive(Clone, Debug)]
pub struct Base {
    pub loc: Location,
    pub value: Option<Value>,
    pub type_hint: Option<TypeId>,
    pub cond: Option<ConditionalContext>,
    pub cond_handled: bool,
    /// Storage the parent wants this node's result placed in.
    pub target: Option<StorageLocation>,
}

impl Base {
    pub fn new(loc: Location) -> Base {
        Base {
            loc,
            value: None,
            type_hint: None,
            cond: None,
            cond_handled: false,
            target: None,
        }
    }
}

pub enum Node {
    Block(BlockNode),
    Let(LetNode),
    If(IfNode),
    While(WhileNode),
    Loop(LoopNode),
    LoopControl(LoopControlNode),
    Return(ReturnNode),
    Namespace(NamespaceNode),
    Function(FunctionNode),
    Literal(LiteralNode),
    ArrayLiteral(ArrayLiteralNode),
    SymbolRef(SymbolRefNode),
    Unary(UnaryNode),
    Binary(BinaryNode),
    Assign(AssignNode),
    Dot(DotNode),
    AddressOf(AddressOfNode),
    Deref(DerefNode),
    Subscript(SubscriptNode),
    Cast(CastNode),
    Call(CallNode),
    SizeOf(SizeOfNode),
    Lazy(LazyNode),
}

macro_rules! dispatch {
    ($self:expr, $node:ident => $body:expr) => {
        match $self {
            Node::Block($node) => $body,
            Node::Let($node) => $body,
            Node::If($node) => $body,
            Node::While($node) => $body,
            Node::Loop($node) => $body,
            Node::LoopControl($node) => $body,
            Node::Return($node) => $body,
            Node::Namespace($node) => $body,
            Node::Function($node) => $body,
            Node::Literal($node) => $body,
            Node::ArrayLiteral($node) => $body,
            Node::SymbolRef($node) => $body,
            Node::Unary($node) => $body,
            Node::Binary($node) => $body,
            Node::Assign($node) => $body,
            Node::Dot($node) => $body,
            Node::AddressOf($node) => $body,
            Node::Deref($node) => $body,
            Node::Subscript($node) => $body,
            Node::Cast($node) => $body,
            Node::Call($node) => $body,
            Node::SizeOf($node) => $body,
            Node::Lazy($node) => $body,
        }
    };
}

impl Node {
    pub fn base(&self) -> &Base {
        dispatch!(self, node => &node.base)
    }

    pub fn base_mut(&mut self) -> &mut Base {
        dispatch!(self, node => &mut node.base)
    }

    pub fn loc(&self) -> &Location {
        &self.base().loc
    }

    /// The node's value; valid after `process`.
    pub fn value(&self) -> &Value {
        self.base()
            .value
            .as_ref()
            .expect("node value requested before processing")
    }

    pub fn value_mut(&mut self) -> &mut Value {
        self.base_mut()
            .value
            .as_mut()
            .expect("node value requested before processing")
    }

    pub fn set_type_hint(&mut self, hint: TypeId) {
        self.base_mut().type_hint = Some(hint);
    }

    pub fn set_target(&mut self, target: StorageLocation) {
        self.base_mut().target = Some(target);
    }

    pub fn set_conditional(&mut self, cond: ConditionalContext) {
        self.base_mut().cond = Some(cond);
    }

    /// Whether this node's code generation consumed its conditional
    /// context by emitting branches.
    pub fn conditional_handled(&self) -> bool {
        self.base().cond_handled
    }

    pub fn collate_registry(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        dispatch!(self, node => node.collate(ctx, registry))
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        dispatch!(self, node => node.process(ctx))
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        dispatch!(self, node => node.resolve(ctx))
    }

    pub fn generate_code(&mut self, ctx: &mut Context) -> PhaseResult {
        dispatch!(self, node => node.generate(ctx))
    }

    pub fn always_returns(&self) -> bool {
        dispatch!(self, node => node.always_returns())
    }
}

/// Error for "type A is not a subtype of B", shared across checks.
pub(crate) fn error_type_mismatch(
    ctx: &mut Context,
    loc: &Location,
    found: TypeId,
    expected: TypeId,
) {
    let text = format!(
        "type {} is not a subtype of {}",
        ctx.types.name(found),
        ctx.types.name(expected)
    );
    ctx.messages.add(Message::error(loc.copy(), text));
}

/// Check that the node's value is an rvalue, reporting otherwise.
pub(crate) fn expect_rvalue(ctx: &mut Context, value: &Value, loc: &Location) -> PhaseResult {
    if value.is_rvalue() {
        return Ok(());
    }
    let text = format!("expected rvalue, got {}", ctx.types.name(value.type_id));
    ctx.messages.add(Message::error(loc.copy(), text));
    Err(Failed)
}

/// Check that the node's value is an lvalue, reporting otherwise.
pub(crate) fn expect_lvalue(ctx: &mut Context, value: &Value, loc: &Location) -> PhaseResult {
    if value.is_lvalue() {
        return Ok(());
    }
    let text = format!("expected lvalue, got {}", ctx.types.name(value.type_id));
    ctx.messages.add(Message::error(loc.copy(), text));
    Err(Failed)
}

/// Shared resolution of an unresolved symbol-reference value against an
/// optional type hint.
pub(crate) fn resolve_symbol_ref(
    ctx: &mut Context,
    value: &mut Value,
    hint: Option<TypeId>,
    loc: &Location,
) -> PhaseResult {
    let (name, candidates) = match value.symbol_ref_parts() {
        Some((name, candidates)) => (name.to_string(), candidates.to_vec()),
        None => return Ok(()),
    };

    if candidates.len() == 1 {
        let id = candidates[0];
        let type_id = ctx.symbols.get(id).type_id;
        value.bind_symbol(id, type_id);
        return Ok(());
    }

    if let Some(hint) = hint {
        let matching: Vec<_> = candidates
            .iter()
            .copied()
            .filter(|id| {
                let t = ctx.symbols.get(*id).type_id;
                t == hint || ctx.types.is_subtype(t, hint)
            })
            .collect();
        if matching.len() == 1 {
            let id = matching[0];
            let type_id = ctx.symbols.get(id).type_id;
            value.bind_symbol(id, type_id);
            return Ok(());
        }
    }

    ctx.messages.add(Message::error(
        loc.copy(),
        format!("unable to resolve '{}' to a single symbol", name),
    ));
    for id in candidates {
        let note = format!(
            "candidate: {}: {}",
            ctx.symbols.full_name(id),
            ctx.types.name(ctx.symbols.get(id).type_id)
        );
        let candidate_loc = ctx.symbols.get(id).loc.clone();
        ctx.messages.add(Message::note(candidate_loc, note));
    }
    Err(Failed)
}

/// Push a loop context for the duration of a body's code generation.
pub(crate) fn with_loop<F>(ctx: &mut Context, loop_ctx: LoopContext, body: F) -> PhaseResult
where
    F: FnOnce(&mut Context) -> PhaseResult,
{
    ctx.loops.push(loop_ctx);
    let result = body(ctx);
    ctx.loops.pop();
    result
}
