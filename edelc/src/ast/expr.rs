//! Expression nodes: literals, references, and the operator family.

use super::{
    error_type_mismatch, expect_lvalue, expect_rvalue, resolve_symbol_ref, resolve_type, Base,
    Node, TypeExpr,
};
use crate::assembly::{AsmArg, BasicBlock, Position};
use crate::builtins::{self, CopyDest};
use crate::context::{ConditionalContext, Context};
use crate::create;
use crate::operators::{self, OperatorId};
use crate::regalloc::Object;
use crate::symbols::{Category, Registry};
use crate::types::{self, TypeId};
use crate::value::{Literal, Ref, Value, ValueKind};
use eisa::Register;
use std::collections::HashSet;
use util::{Failed, Message, PhaseResult};

/// Literal forms as delivered by the parser.
#[derive(Clone, Debug)]
pub enum LiteralSource {
    Int(u64, String),
    Float(f64, String),
    Bool(bool),
    Char(u8),
}

pub struct LiteralNode {
    pub base: Base,
    pub source: LiteralSource,
}

impl LiteralNode {
    pub fn collate(&mut self, _ctx: &mut Context, _registry: &mut Registry) -> PhaseResult {
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        let source = self.source.clone();
        let literal = match source {
            LiteralSource::Int(value, text) => {
                // an integer literal adopts a numeric hint, defaulting to
                // the widest signed integer
                match self.base.type_hint {
                    Some(hint) if ctx.types.is_int(hint) => Literal::new(hint, value, text),
                    Some(hint) if hint == types::F32 => {
                        Literal::new(types::F32, u64::from((value as f32).to_bits()), text)
                    }
                    Some(hint) if hint == types::F64 => {
                        Literal::new(types::F64, (value as f64).to_bits(), text)
                    }
                    _ => Literal::new(types::I64, value, text),
                }
            }
            LiteralSource::Float(value, text) => {
                let type_id = match self.base.type_hint {
                    Some(hint) if hint == types::F32 => types::F32,
                    _ => types::F64,
                };
                let bits = if type_id == types::F32 {
                    u64::from((value as f32).to_bits())
                } else {
                    value.to_bits()
                };
                Literal::new(type_id, bits, text)
            }
            LiteralSource::Bool(value) => Literal::new(
                types::BOOL,
                u64::from(value),
                if value { "true" } else { "false" },
            ),
            LiteralSource::Char(value) => {
                Literal::new(types::U8, u64::from(value), format!("'{}'", value as char))
            }
        };
        self.base.value = Some(Value::literal(literal));
        Ok(())
    }

    pub fn resolve(&mut self, _ctx: &mut Context) -> PhaseResult {
        Ok(())
    }

    pub fn generate(&mut self, _ctx: &mut Context) -> PhaseResult {
        // loaded on demand by whoever materialises the value
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}

pub struct ArrayLiteralNode {
    pub base: Base,
    pub elements: Vec<Node>,
}

impl ArrayLiteralNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        for element in &mut self.elements {
            element.collate_registry(ctx, registry)?;
        }
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        let elem_hint = self
            .base
            .type_hint
            .and_then(|hint| ctx.types.wrapped_inner(hint));

        for element in &mut self.elements {
            if let Some(hint) = elem_hint {
                element.set_type_hint(hint);
            }
            element.process(ctx)?;
            element.resolve(ctx)?;
        }

        let elem_type = match (elem_hint, self.elements.first()) {
            (Some(hint), _) => hint,
            (None, Some(first)) => first.value().type_id,
            (None, None) => {
                ctx.messages.add(Message::error(
                    self.base.loc.copy(),
                    "cannot deduce the element type of an empty array literal".to_string(),
                ));
                return Err(Failed);
            }
        };

        for element in &self.elements {
            let found = element.value().type_id;
            if !ctx.types.is_subtype(found, elem_type) {
                error_type_mismatch(ctx, element.loc(), found, elem_type);
                return Err(Failed);
            }
        }

        let array_type = ctx.types.array_of(elem_type, self.elements.len() as u64);
        let values: Vec<Value> = self.elements.iter().map(|e| e.value().clone()).collect();
        self.base.value = Some(Value::contiguous(
            array_type,
            values,
            ctx.symbols.in_global_scope(),
        ));
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        for element in &mut self.elements {
            element.resolve(ctx)?;
        }
        Ok(())
    }

    pub fn generate(&mut self, _ctx: &mut Context) -> PhaseResult {
        // elements are stored by materialisation, straight into the target
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}

pub struct SymbolRefNode {
    pub base: Base,
    pub name: String,
}

impl SymbolRefNode {
    pub fn collate(&mut self, _ctx: &mut Context, _registry: &mut Registry) -> PhaseResult {
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        let candidates = ctx.symbols.find(&self.name);
        if candidates.is_empty() {
            ctx.messages.add(Message::error(
                self.base.loc.copy(),
                format!("unknown symbol '{}'", self.name),
            ));
            return Err(Failed);
        }

        let type_id = if candidates.len() == 1 {
            ctx.symbols.get(candidates[0]).type_id
        } else {
            types::UNIT
        };
        self.base.value = Some(Value::symbol_ref(self.name.clone(), candidates, type_id));
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        let hint = self.base.type_hint;
        let loc = self.base.loc.clone();
        let value = self
            .base
            .value
            .as_mut()
            .expect("symbol reference was not processed");
        resolve_symbol_ref(ctx, value, hint, &loc)
    }

    pub fn generate(&mut self, _ctx: &mut Context) -> PhaseResult {
        // parents materialise the symbol when they need its rvalue
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}

pub struct UnaryNode {
    pub base: Base,
    pub symbol: String,
    pub operand: Box<Node>,
    pub op: Option<OperatorId>,
}

impl UnaryNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        self.operand.collate_registry(ctx, registry)
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        if let Some(hint) = self.base.type_hint {
            self.operand.set_type_hint(hint);
        }
        self.operand.process(ctx)?;
        self.operand.resolve(ctx)?;

        let arg_types = [self.operand.value().type_id];
        let op = operators::select_candidate(
            &ctx.ops,
            &ctx.types,
            &self.symbol,
            &arg_types,
            &self.base.loc,
            &mut ctx.messages,
        )?;
        self.op = Some(op);

        let (_, ret) = ctx
            .types
            .function_parts(ctx.ops.get(op).type_id)
            .map(|(p, r)| (p.to_vec(), r))
            .expect("operator signature is not a function type");
        self.base.value = Some(Value::of(ret));
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        self.operand.resolve(ctx)
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let op = self.op.expect("operator was not resolved");
        let index = ctx.program.current().len();
        let mut value = self.base.value.take().expect("operator was not processed");
        let handled = builtins::invoke_operator(
            ctx,
            op,
            std::slice::from_mut(&mut *self.operand),
            &mut value,
            self.base.cond,
            &self.base.loc,
        )?;
        self.base.cond_handled = handled;
        self.base.value = Some(value);
        ctx.program.update_line_origins(&self.base.loc, index, false);
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}

pub struct BinaryNode {
    pub base: Base,
    pub symbol: String,
    /// Exactly two operands.
    pub args: Vec<Node>,
    pub op: Option<OperatorId>,
    /// `ptr + int` / `ptr - int`, handled by the pointer-arithmetic
    /// primitive instead of the registry.
    pub pointer_op: bool,
}

impl BinaryNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        for arg in &mut self.args {
            arg.collate_registry(ctx, registry)?;
        }
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        // pointer arithmetic: lhs decides before the overload hunt
        if self.symbol == "+" || self.symbol == "-" {
            self.args[0].process(ctx)?;
            self.args[0].resolve(ctx)?;
            let lhs_type = self.args[0].value().type_id;

            if ctx.types.wrapped_inner(lhs_type).is_some() && !ctx.types.is_function(lhs_type) {
                self.args[1].set_type_hint(types::U64);
                self.args[1].process(ctx)?;
                self.args[1].resolve(ctx)?;

                let rhs_type = self.args[1].value().type_id;
                if !ctx.types.is_subtype(rhs_type, types::U64) {
                    error_type_mismatch(ctx, self.args[1].loc(), rhs_type, types::U64);
                    return Err(Failed);
                }

                self.pointer_op = true;
                self.base.value = Some(Value::of(lhs_type));
                return Ok(());
            }

            // fall through into ordinary resolution; lhs is processed
            if let Some(hint) = self.base.type_hint {
                self.args[1].set_type_hint(hint);
            }
            self.args[1].process(ctx)?;
            self.args[1].resolve(ctx)?;
        } else {
            for arg in &mut self.args {
                if let Some(hint) = self.base.type_hint {
                    arg.set_type_hint(hint);
                }
                arg.process(ctx)?;
                arg.resolve(ctx)?;
            }
        }

        let arg_types = [self.args[0].value().type_id, self.args[1].value().type_id];
        let op = operators::select_candidate(
            &ctx.ops,
            &ctx.types,
            &self.symbol,
            &arg_types,
            &self.base.loc,
            &mut ctx.messages,
        )?;
        self.op = Some(op);

        let (_, ret) = ctx
            .types
            .function_parts(ctx.ops.get(op).type_id)
            .map(|(p, r)| (p.to_vec(), r))
            .expect("operator signature is not a function type");
        self.base.value = Some(Value::of(ret));
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        for arg in &mut self.args {
            arg.resolve(ctx)?;
        }
        Ok(())
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let index = ctx.program.current().len();

        if self.pointer_op {
            for arg in &mut self.args {
                arg.generate_code(ctx)?;
                let loc = arg.loc().clone();
                let value = arg.base_mut().value.as_mut().expect("operand not processed");
                builtins::materialise(ctx, value, None, &loc)?;
                let value = arg.value().clone();
                expect_rvalue(ctx, &value, &loc)?;
            }

            let lhs = self.args[0].value().clone();
            let rhs = self.args[1].value().clone();
            let result =
                builtins::pointer_arithmetic(ctx, &lhs, &rhs, self.symbol == "-", true);
            let value = self.base.value.as_mut().expect("operator not processed");
            value.rvalue = Some(result);
            ctx.program.update_line_origins(&self.base.loc, index, false);
            return Ok(());
        }

        let op = self.op.expect("operator was not resolved");
        let mut value = self.base.value.take().expect("operator was not processed");
        let handled = builtins::invoke_operator(
            ctx,
            op,
            &mut self.args,
            &mut value,
            self.base.cond,
            &self.base.loc,
        )?;
        self.base.cond_handled = handled;
        self.base.value = Some(value);
        ctx.program.update_line_origins(&self.base.loc, index, false);
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}

pub struct AssignNode {
    pub base: Base,
    /// lhs, rhs.
    pub args: Vec<Node>,
}

impl AssignNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        for arg in &mut self.args {
            arg.collate_registry(ctx, registry)?;
        }
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        self.args[0].process(ctx)?;
        self.args[0].resolve(ctx)?;
        let lhs_type = self.args[0].value().type_id;

        // constants cannot be reassigned
        if let Some(id) = self.args[0].value().symbol() {
            if ctx.symbols.get(id).constant {
                ctx.messages.add(Message::error(
                    self.base.loc.copy(),
                    "unable to assign to constant symbol".to_string(),
                ));
                let symbol_loc = ctx.symbols.get(id).loc.clone();
                ctx.messages.add(Message::note(
                    symbol_loc,
                    format!("symbol '{}' defined here", ctx.symbols.full_name(id)),
                ));
                return Err(Failed);
            }
        }

        self.args[1].set_type_hint(lhs_type);
        self.args[1].process(ctx)?;
        self.args[1].resolve(ctx)?;

        let rhs_type = self.args[1].value().type_id;
        if !ctx.types.is_subtype(rhs_type, lhs_type) {
            let loc = self.base.loc.clone();
            error_type_mismatch(ctx, &loc, rhs_type, lhs_type);
            if ctx.types.pointer_inner(lhs_type).is_some() {
                ctx.messages.add(Message::new(
                    util::Level::Note,
                    "use the dereference operator to update the value stored at the pointer"
                        .to_string(),
                ));
            }
            return Err(Failed);
        }

        self.base.value = Some(Value::of(lhs_type));
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        for arg in &mut self.args {
            arg.resolve(ctx)?;
        }
        Ok(())
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let index = ctx.program.current().len();

        // rvalue first
        self.args[1].generate_code(ctx)?;
        let rhs_loc = self.args[1].loc().clone();
        {
            let value = self.args[1].base_mut().value.as_mut().expect("not processed");
            builtins::materialise(ctx, value, None, &rhs_loc)?;
        }
        let rhs = self.args[1].value().clone();
        expect_rvalue(ctx, &rhs, &rhs_loc)?;

        // then the destination
        self.args[0].generate_code(ctx)?;
        let lhs = self.args[0].value().clone();
        expect_lvalue(ctx, &lhs, self.args[0].loc())?;

        let value = self.base.value.as_mut().expect("not processed");
        value.lvalue = lhs.lvalue.clone();
        let lhs_type = lhs.type_id;

        if ctx.types.size(lhs_type) == 0 {
            return Ok(());
        }

        let coerced = {
            let (regs, mut em) = ctx.regs_emit();
            regs.guarantee_datatype(rhs.reference(), lhs_type, &mut em)
        };
        self.base.value.as_mut().unwrap().rvalue = Some(coerced);

        if ctx.types.reference_as_ptr(lhs_type) {
            let size = ctx.types.size(lhs_type);
            let describe = ctx.types.name(lhs_type);
            let dest = match lhs.symbol() {
                Some(id) => CopyDest::Symbol(id),
                None => CopyDest::Ref(lhs.lvalue_ref().expect("assignment target vanished")),
            };
            builtins::mem_copy(ctx, coerced, dest, size, &describe)?;
        } else if let Some(id) = lhs.symbol() {
            {
                let (symbols, program, types) = (&ctx.symbols, &mut ctx.program, &ctx.types);
                symbols.assign_symbol(id, coerced.register(), program, types);
            }
            // cached copies of the symbol are stale now
            ctx.regs.evict_symbol(id);
        } else {
            let target = lhs.lvalue_ref().expect("assignment target vanished");
            ctx.program.add(create::store(
                coerced.register(),
                AsmArg::RegisterIndirect {
                    reg: target.register(),
                    offset: 0,
                },
            ));
        }

        ctx.program.update_line_origins(&self.base.loc, index, false);
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}

pub struct DotNode {
    pub base: Base,
    pub lhs: Box<Node>,
    pub property: String,
}

impl DotNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        self.lhs.collate_registry(ctx, registry)
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        self.lhs.process(ctx)?;

        // namespace member access composes a qualified name
        if let Some((_, candidates)) = self.lhs.value().symbol_ref_parts() {
            let single_namespace = candidates.len() == 1
                && ctx.symbols.get(candidates[0]).category == Category::Namespace;
            if single_namespace {
                let full = format!("{}.{}", ctx.symbols.full_name(candidates[0]), self.property);
                let found = ctx.symbols.find(&full);
                if found.is_empty() {
                    ctx.messages.add(Message::error(
                        self.base.loc.copy(),
                        format!("unknown symbol '{}'", full),
                    ));
                    return Err(Failed);
                }
                let type_id = if found.len() == 1 {
                    ctx.symbols.get(found[0]).type_id
                } else {
                    types::UNIT
                };
                self.base.value = Some(Value::symbol_ref(full, found, type_id));
                return Ok(());
            }
        }

        self.lhs.resolve(ctx)?;
        let lhs_type = self.lhs.value().type_id;

        match ctx.types.property_type(lhs_type, &self.property) {
            Some(property_type) => {
                self.base.value = Some(Value::of(property_type));
                Ok(())
            }
            None => {
                ctx.messages.add(Message::error(
                    self.base.loc.copy(),
                    format!(
                        "type {} has no property '{}'",
                        ctx.types.name(lhs_type),
                        self.property
                    ),
                ));
                ctx.messages.add(Message::note(
                    self.lhs.loc().copy(),
                    format!(
                        "subject of type {} appeared here",
                        ctx.types.name(lhs_type)
                    ),
                ));
                Err(Failed)
            }
        }
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        let hint = self.base.type_hint;
        let loc = self.base.loc.clone();
        if let Some(value) = self.base.value.as_mut() {
            if value.is_symbol_ref() {
                return resolve_symbol_ref(ctx, value, hint, &loc);
            }
        }
        self.lhs.resolve(ctx)
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let value = self.base.value.as_mut().expect("not processed");
        if value.symbol().is_some() {
            // a resolved namespace member behaves like a plain symbol
            return Ok(());
        }

        // property access; the only registered property is a constant fold
        self.lhs.generate_code(ctx)?;
        let lhs_type = self.lhs.value().type_id;
        match ctx.types.property_constant(lhs_type, &self.property) {
            Some(constant) => {
                let value = self.base.value.as_mut().unwrap();
                value.kind = ValueKind::Literal(Literal::new(
                    value.type_id,
                    constant,
                    format!(".{}", self.property),
                ));
                Ok(())
            }
            None => {
                ctx.messages.add(Message::error(
                    self.base.loc.copy(),
                    format!("property '{}' cannot be evaluated", self.property),
                ));
                Err(Failed)
            }
        }
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}

pub struct AddressOfNode {
    pub base: Base,
    pub operand: Box<Node>,
}

impl AddressOfNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        self.operand.collate_registry(ctx, registry)
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        if let Some(hint) = self.base.type_hint {
            if let Some(inner) = ctx.types.pointer_inner(hint) {
                self.operand.set_type_hint(inner);
            }
        }
        self.operand.process(ctx)?;
        self.operand.resolve(ctx)?;

        let value = self.operand.value();
        let operand_type = value.type_id;
        if value.is_lvalue() || ctx.types.reference_as_ptr(operand_type) {
            let pointer = ctx.types.pointer_to(operand_type);
            self.base.value = Some(Value::of(pointer));
            return Ok(());
        }

        ctx.messages.add(Message::error(
            self.operand.loc().copy(),
            format!("expected lvalue, got {}", ctx.types.name(operand_type)),
        ));
        ctx.messages.add(Message::note(
            self.base.loc.copy(),
            "while evaluating unary operator &".to_string(),
        ));
        Err(Failed)
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        self.operand.resolve(ctx)
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let index = ctx.program.current().len();

        if let Some(id) = self.operand.value().symbol() {
            let mut value = self.base.value.take().expect("not processed");
            if !builtins::address_of(ctx, id, &mut value) {
                ctx.messages.add(Message::error(
                    self.operand.loc().copy(),
                    format!(
                        "symbol of type {} does not have an address",
                        ctx.types.name(ctx.symbols.get(id).type_id)
                    ),
                ));
                let symbol_loc = ctx.symbols.get(id).loc.clone();
                ctx.messages
                    .add(Message::note(symbol_loc, "symbol defined here".to_string()));
                return Err(Failed);
            }
            let comment = format!(
                "&{}: {}",
                ctx.symbols.full_name(id),
                ctx.types.name(value.type_id)
            );
            ctx.program.current_mut().back_mut().append_comment(&comment);
            self.base.value = Some(value);
            ctx.program.update_line_origins(&self.base.loc, index, false);
            return Ok(());
        }

        // otherwise take the reference the operand already lives behind
        self.operand.generate_code(ctx)?;
        let operand_loc = self.operand.loc().clone();
        {
            let value = self.operand.base_mut().value.as_mut().expect("not processed");
            builtins::materialise(ctx, value, None, &operand_loc)?;
        }
        let operand_value = self.operand.value().clone();
        let reference = match operand_value.lvalue_ref() {
            Some(reference) => reference,
            None => {
                expect_rvalue(ctx, &operand_value, &operand_loc)?;
                operand_value.reference()
            }
        };

        let value = self.base.value.as_mut().unwrap();
        value.rvalue = Some(reference);
        let pointer_type = value.type_id;
        ctx.regs.update(
            reference,
            Object::new(Value::rvalue_of(pointer_type, reference)),
        );
        ctx.program.update_line_origins(&self.base.loc, index, false);
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}

pub struct DerefNode {
    pub base: Base,
    pub operand: Box<Node>,
}

impl DerefNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        self.operand.collate_registry(ctx, registry)
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        self.operand.process(ctx)?;
        self.operand.resolve(ctx)?;

        let operand_type = self.operand.value().type_id;
        match ctx.types.wrapped_inner(operand_type) {
            Some(inner) if !ctx.types.is_function(operand_type) => {
                self.base.value = Some(Value::of(inner));
                Ok(())
            }
            _ => {
                ctx.messages.add(Message::error(
                    self.operand.loc().copy(),
                    format!(
                        "expected pointer or array type, got {}",
                        ctx.types.name(operand_type)
                    ),
                ));
                ctx.messages.add(Message::note(
                    self.base.loc.copy(),
                    "cannot dereference a non-pointer value".to_string(),
                ));
                Err(Failed)
            }
        }
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        self.operand.resolve(ctx)
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let index = ctx.program.current().len();

        self.operand.generate_code(ctx)?;
        let operand_loc = self.operand.loc().clone();
        {
            let value = self.operand.base_mut().value.as_mut().expect("not processed");
            builtins::materialise(ctx, value, None, &operand_loc)?;
        }
        let pointer = self.operand.value().clone();
        expect_rvalue(ctx, &pointer, &operand_loc)?;

        let mut value = self.base.value.take().expect("not processed");
        builtins::dereference(ctx, &pointer, &mut value, true);
        self.base.value = Some(value);

        ctx.program.update_line_origins(&self.base.loc, index, false);
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}

pub struct SubscriptNode {
    pub base: Base,
    /// lhs, index.
    pub args: Vec<Node>,
    pub op: Option<OperatorId>,
}

impl SubscriptNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        for arg in &mut self.args {
            arg.collate_registry(ctx, registry)?;
        }
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        self.args[0].process(ctx)?;
        self.args[0].resolve(ctx)?;
        let lhs_type = self.args[0].value().type_id;

        let is_wrapper =
            ctx.types.wrapped_inner(lhs_type).is_some() && !ctx.types.is_function(lhs_type);
        if is_wrapper {
            self.args[1].set_type_hint(types::U64);
        }
        self.args[1].process(ctx)?;
        self.args[1].resolve(ctx)?;

        if is_wrapper && ctx.types.is_int(self.args[1].value().type_id) {
            let inner = ctx.types.wrapped_inner(lhs_type).unwrap();
            self.base.value = Some(Value::of(inner));
            return Ok(());
        }

        let arg_types = [lhs_type, self.args[1].value().type_id];
        let op = operators::select_candidate(
            &ctx.ops,
            &ctx.types,
            "[]",
            &arg_types,
            &self.base.loc,
            &mut ctx.messages,
        )?;
        self.op = Some(op);
        let (_, ret) = ctx
            .types
            .function_parts(ctx.ops.get(op).type_id)
            .map(|(p, r)| (p.to_vec(), r))
            .expect("operator signature is not a function type");
        self.base.value = Some(Value::of(ret));
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        for arg in &mut self.args {
            arg.resolve(ctx)?;
        }
        Ok(())
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        if let Some(op) = self.op {
            let mut value = self.base.value.take().expect("not processed");
            builtins::invoke_operator(
                ctx,
                op,
                &mut self.args,
                &mut value,
                self.base.cond,
                &self.base.loc,
            )?;
            self.base.value = Some(value);
            return Ok(());
        }

        let index = ctx.program.current().len();
        for arg in &mut self.args {
            arg.generate_code(ctx)?;
            let loc = arg.loc().clone();
            let value = arg.base_mut().value.as_mut().expect("not processed");
            builtins::materialise(ctx, value, None, &loc)?;
            let value = arg.value().clone();
            expect_rvalue(ctx, &value, &loc)?;
        }

        let lhs = self.args[0].value().clone();
        let rhs = self.args[1].value().clone();
        let src = builtins::pointer_arithmetic(ctx, &lhs, &rhs, false, false);

        let mut value = self.base.value.take().expect("not processed");
        let pointer = Value::rvalue_of(lhs.type_id, src);
        builtins::dereference(ctx, &pointer, &mut value, false);
        self.base.value = Some(value);

        let comment = format!(
            "operator[]({}, {})",
            ctx.types.name(lhs.type_id),
            ctx.types.name(rhs.type_id)
        );
        let block = ctx.program.current_mut();
        if index < block.lines.len() {
            block.lines[index].append_comment(&comment);
        }
        ctx.program.update_line_origins(&self.base.loc, index, false);
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}

pub struct CastNode {
    pub base: Base,
    pub operand: Box<Node>,
    pub spec: TypeExpr,
    pub target: Option<TypeId>,
    /// An unchecked cast skips the pointer/function legality rules.
    pub sudo: bool,
}

impl CastNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        self.operand.collate_registry(ctx, registry)
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        let spec = self.spec.clone();
        let target = resolve_type(ctx, &spec)?;
        if ctx.types.size(target) == 0 {
            ctx.messages.add(Message::error(
                self.base.loc.copy(),
                format!(
                    "attempted cast to zero-sized type {}",
                    ctx.types.name(target)
                ),
            ));
            return Err(Failed);
        }
        self.target = Some(target);

        self.operand.set_type_hint(target);
        self.operand.process(ctx)?;
        self.operand.resolve(ctx)?;

        self.base.value = Some(Value::of(target));
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        self.operand.resolve(ctx)
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let index = ctx.program.current().len();

        self.operand.generate_code(ctx)?;
        let operand_loc = self.operand.loc().clone();
        {
            let value = self.operand.base_mut().value.as_mut().expect("not processed");
            builtins::materialise(ctx, value, None, &operand_loc)?;
        }
        let value = self.operand.value().clone();
        expect_rvalue(ctx, &value, &operand_loc)?;

        let source = value.type_id;
        let target = self.target.expect("cast was not processed");

        if !self.sudo {
            let target_func = ctx.types.is_function(target);
            let source_ptrish = ctx.types.pointer_inner(source).is_some()
                || ctx.types.array_inner(source).is_some();
            let bad_function_cast = target_func
                && !(ctx.types.pointer_inner(source).is_some()
                    || (ctx.types.is_function(source) && source == target));
            let bad_pointer_cast =
                ctx.types.pointer_inner(target).is_some() && !source_ptrish;
            if bad_function_cast || bad_pointer_cast {
                error_type_mismatch(ctx, &self.base.loc, source, target);
                return Err(Failed);
            }
        }

        let coerced = {
            let (regs, mut em) = ctx.regs_emit();
            regs.guarantee_datatype(value.reference(), target, &mut em)
        };
        self.base.value.as_mut().unwrap().rvalue = Some(coerced);

        ctx.program.update_line_origins(&self.base.loc, index, false);
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}

pub struct CallNode {
    pub base: Base,
    pub subject: Box<Node>,
    pub args: Vec<Node>,
    pub signature: Option<TypeId>,
    pub symbol: Option<crate::symbols::SymbolId>,
}

impl CallNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        self.subject.collate_registry(ctx, registry)?;
        for arg in &mut self.args {
            arg.collate_registry(ctx, registry)?;
        }
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        self.subject.process(ctx)?;

        // a named callee resolves against its overload set
        let named_candidates = self
            .subject
            .value()
            .symbol_ref_parts()
            .map(|(name, candidates)| (name.to_string(), candidates.to_vec()));

        if let Some((name, candidates)) = named_candidates {
            let functions: Vec<_> = candidates
                .iter()
                .copied()
                .filter(|id| ctx.types.is_function(ctx.symbols.get(*id).type_id))
                .collect();

            if !functions.is_empty() {
                return self.process_named(ctx, &name, &functions);
            }
        }

        // otherwise the subject must evaluate to a function value
        self.subject.resolve(ctx)?;
        let subject_type = self.subject.value().type_id;
        let parts = ctx
            .types
            .function_parts(subject_type)
            .map(|(p, r)| (p.to_vec(), r));
        match parts {
            Some((params, ret)) => {
                if params.len() != self.args.len() {
                    ctx.messages.add(Message::error(
                        self.base.loc.copy(),
                        format!("expected {} arguments, got {}", params.len(), self.args.len()),
                    ));
                    return Err(Failed);
                }
                for (arg, param) in self.args.iter_mut().zip(params.iter()) {
                    arg.set_type_hint(*param);
                    arg.process(ctx)?;
                    arg.resolve(ctx)?;
                    let found = arg.value().type_id;
                    if !ctx.types.is_subtype(found, *param) {
                        error_type_mismatch(ctx, arg.loc(), found, *param);
                        return Err(Failed);
                    }
                }
                self.signature = Some(subject_type);
                self.base.value = Some(Value::of(ret));
                Ok(())
            }
            None => {
                ctx.messages.add(Message::error(
                    self.subject.loc().copy(),
                    format!("type {} is not callable", ctx.types.name(subject_type)),
                ));
                Err(Failed)
            }
        }
    }

    fn process_named(
        &mut self,
        ctx: &mut Context,
        name: &str,
        functions: &[crate::symbols::SymbolId],
    ) -> PhaseResult {
        // single overload: hint arguments from the signature directly
        if functions.len() == 1 {
            let id = functions[0];
            let signature = ctx.symbols.get(id).type_id;
            let (params, ret) = ctx
                .types
                .function_parts(signature)
                .map(|(p, r)| (p.to_vec(), r))
                .unwrap();

            if params.len() != self.args.len() {
                ctx.messages.add(Message::error(
                    self.base.loc.copy(),
                    format!(
                        "expected {} argument{}, got {}",
                        params.len(),
                        if params.len() == 1 { "" } else { "s" },
                        self.args.len()
                    ),
                ));
                let decl_loc = ctx.symbols.get(id).loc.clone();
                ctx.messages.add(Message::note(
                    decl_loc,
                    format!("function '{}' defined here", ctx.symbols.full_name(id)),
                ));
                return Err(Failed);
            }

            for (arg, param) in self.args.iter_mut().zip(params.iter()) {
                arg.set_type_hint(*param);
                arg.process(ctx)?;
                arg.resolve(ctx)?;
                let found = arg.value().type_id;
                if !ctx.types.is_subtype(found, *param) {
                    error_type_mismatch(ctx, arg.loc(), found, *param);
                    let decl_loc = ctx.symbols.get(id).loc.clone();
                    ctx.messages.add(Message::note(
                        decl_loc,
                        format!(
                            "function {}: {} defined here",
                            ctx.symbols.full_name(id),
                            ctx.types.name(signature)
                        ),
                    ));
                    return Err(Failed);
                }
            }

            self.signature = Some(signature);
            self.symbol = Some(id);
            self.base.value = Some(Value::of(ret));
            return Ok(());
        }

        // several overloads: resolve argument types first, then score
        for arg in &mut self.args {
            arg.process(ctx)?;
            arg.resolve(ctx)?;
        }
        let arg_types: Vec<TypeId> = self.args.iter().map(|a| a.value().type_id).collect();
        let candidate_types: Vec<TypeId> = functions
            .iter()
            .map(|id| ctx.symbols.get(*id).type_id)
            .collect();

        match operators::select_overload(&ctx.types, &arg_types, &candidate_types) {
            operators::Selection::Selected(index) => {
                let id = functions[index];
                let signature = ctx.symbols.get(id).type_id;
                let (_, ret) = ctx
                    .types
                    .function_parts(signature)
                    .map(|(p, r)| (p.to_vec(), r))
                    .unwrap();
                self.signature = Some(signature);
                self.symbol = Some(id);
                self.base.value = Some(Value::of(ret));
                Ok(())
            }
            _ => {
                let spelled: Vec<String> =
                    arg_types.iter().map(|t| ctx.types.name(*t)).collect();
                ctx.messages.add(Message::error(
                    self.base.loc.copy(),
                    format!(
                        "unable to resolve a suitable overload for {}({})",
                        name,
                        spelled.join(", ")
                    ),
                ));
                for id in functions {
                    let note = format!(
                        "candidate: {}: {}",
                        ctx.symbols.full_name(*id),
                        ctx.types.name(ctx.symbols.get(*id).type_id)
                    );
                    let loc = ctx.symbols.get(*id).loc.clone();
                    ctx.messages.add(Message::note(loc, note));
                }
                Err(Failed)
            }
        }
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        for arg in &mut self.args {
            arg.resolve(ctx)?;
        }
        Ok(())
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let index = ctx.program.current().len();
        let signature = self.signature.expect("call was not processed");

        let (function, name, ignored) = match self.symbol {
            Some(id) => {
                let symbol = ctx.symbols.get(id).clone();
                if symbol.category == Category::Function {
                    (
                        AsmArg::label(ctx.symbols.block_label(id)),
                        ctx.symbols.full_name(id),
                        ctx.symbols.ignored_params(id),
                    )
                } else {
                    // a function-pointer variable: call through its value
                    let reference = {
                        let (regs, mut em) = ctx.regs_emit();
                        regs.find_or_insert_symbol(id, &mut em)
                    };
                    ctx.regs.mark_free(reference);
                    (
                        AsmArg::reg(reference.register()),
                        ctx.symbols.full_name(id),
                        Vec::new(),
                    )
                }
            }
            None => {
                self.subject.generate_code(ctx)?;
                let subject_loc = self.subject.loc().clone();
                {
                    let value = self.subject.base_mut().value.as_mut().expect("no value");
                    builtins::materialise(ctx, value, None, &subject_loc)?;
                }
                let value = self.subject.value().clone();
                expect_rvalue(ctx, &value, &subject_loc)?;
                let reference = {
                    let (regs, mut em) = ctx.regs_emit();
                    regs.guarantee_register(value.reference(), &mut em)
                };
                (
                    AsmArg::reg(reference.register()),
                    "<expr>".to_string(),
                    Vec::new(),
                )
            }
        };

        let ignored: HashSet<usize> = ignored.into_iter().collect();
        let mut value = self.base.value.take().expect("call was not processed");
        builtins::call_function(
            ctx,
            function,
            &name,
            signature,
            &mut self.args,
            &ignored,
            &mut value,
            self.base.target.as_ref(),
        )?;
        self.base.value = Some(value);

        ctx.program.update_line_origins(&self.base.loc, index, false);
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}

pub struct SizeOfNode {
    pub base: Base,
    pub operand: Box<Node>,
}

impl SizeOfNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        self.operand.collate_registry(ctx, registry)
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        self.operand.process(ctx)?;
        self.base.value = Some(Value::of(types::U64));
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        self.operand.resolve(ctx)
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        self.operand.resolve(ctx)?;
        let operand_type = self.operand.value().type_id;
        let size = ctx.types.size(operand_type);

        // folds to a constant; no code is emitted
        let value = self.base.value.as_mut().expect("not processed");
        value.kind = ValueKind::Literal(Literal::new(
            types::U64,
            size,
            format!("sizeof({})", ctx.types.name(operand_type)),
        ));
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}

pub struct LazyNode {
    pub base: Base,
    pub and: bool,
    /// lhs, rhs.
    pub args: Vec<Node>,
    pub id: u32,
}

impl LazyNode {
    fn symbol(&self) -> &'static str {
        if self.and {
            "&&"
        } else {
            "||"
        }
    }

    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        for arg in &mut self.args {
            arg.collate_registry(ctx, registry)?;
        }
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        self.id = ctx.next_block_id();
        for arg in &mut self.args {
            arg.process(ctx)?;
            arg.resolve(ctx)?;
            let found = arg.value().type_id;
            if !ctx.types.is_subtype(found, types::BOOL) {
                error_type_mismatch(ctx, arg.loc(), found, types::BOOL);
                return Err(Failed);
            }
        }
        self.base.value = Some(Value::of(types::BOOL));
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        for arg in &mut self.args {
            arg.resolve(ctx)?;
        }
        Ok(())
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let origin = ctx.program.current_id();
        let rhs_id = ctx.program.insert(
            Position::After,
            BasicBlock::labelled(format!("rhs_{}", self.id)),
        );

        match self.base.cond {
            Some(parent) => {
                // fuse with the surrounding conditional
                let lhs_cond = if self.and {
                    ConditionalContext {
                        if_true: Some(rhs_id),
                        if_false: parent.if_false,
                        inverse: false,
                    }
                } else {
                    ConditionalContext {
                        if_true: parent.if_true,
                        if_false: Some(rhs_id),
                        inverse: false,
                    }
                };

                ctx.program.select_id(origin);
                self.generate_side(ctx, 0, lhs_cond)?;
                ctx.program.select_id(rhs_id);
                self.generate_side(ctx, 1, parent)?;
                self.base.cond_handled = true;
                self.base.value = Some(Value::of(types::BOOL));
                Ok(())
            }
            None => {
                // materialise 0/1 through the true/false blocks
                let true_id = ctx.program.insert(
                    Position::After,
                    BasicBlock::labelled(format!("true_{}", self.id)),
                );
                let false_id = ctx.program.insert(
                    Position::After,
                    BasicBlock::labelled(format!("false_{}", self.id)),
                );
                let end_id = ctx.program.insert(
                    Position::After,
                    BasicBlock::labelled(format!("end_{}", self.id)),
                );

                let lhs_cond = if self.and {
                    ConditionalContext::new(rhs_id, false_id)
                } else {
                    ConditionalContext::new(true_id, rhs_id)
                };
                let rhs_cond = ConditionalContext::new(true_id, false_id);

                ctx.program.select_id(origin);
                self.generate_side(ctx, 0, lhs_cond)?;
                ctx.program.select_id(rhs_id);
                self.generate_side(ctx, 1, rhs_cond)?;

                ctx.program.select_id(true_id);
                ctx.program
                    .add(create::load(Register::Ret.index(), AsmArg::imm(1)));
                let end_label = ctx.program.block_label(end_id).to_string();
                ctx.program.add(create::branch(AsmArg::label(end_label)));

                ctx.program.select_id(false_id);
                ctx.program
                    .add(create::load(Register::Ret.index(), AsmArg::imm(0)));

                ctx.program.select_id(end_id);
                ctx.regs.evict_all();
                let value = Value::rvalue_of(types::BOOL, Ref::reg(Register::Ret.index()));
                ctx.regs.update_ret(Object::new(value.clone()));
                self.base.value = Some(value);
                Ok(())
            }
        }
    }

    fn generate_side(
        &mut self,
        ctx: &mut Context,
        index: usize,
        cond: ConditionalContext,
    ) -> PhaseResult {
        if index > 0 {
            // the right-hand block is a fresh runtime entry point
            ctx.regs.evict_all();
        }
        let arg = &mut self.args[index];
        arg.set_conditional(cond);
        arg.generate_code(ctx)?;
        if !arg.conditional_handled() {
            let loc = arg.loc().clone();
            {
                let value = arg.base_mut().value.as_mut().expect("not processed");
                builtins::materialise(ctx, value, None, &loc)?;
            }
            let value = arg.value().clone();
            builtins::generate_branches_for_value(ctx, &cond, &value, &loc)?;
        }
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}
