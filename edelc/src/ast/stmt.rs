//! Statement nodes: blocks, declarations, control flow.

use super::{error_type_mismatch, expect_rvalue, resolve_type, Base, Node, TypeExpr};
use crate::assembly::{AsmArg, BasicBlock, Position};
use crate::builtins;
use crate::context::{ConditionalContext, Context, LoopContext};
use crate::create;
use crate::regalloc::Object;
use crate::symbols::{Category, Registry, Symbol};
use crate::types::{self, TypeId};
use crate::value::{LValue, Ref, Value};
use eisa::Register;
use util::{Failed, Message, PhaseResult};

pub struct BlockNode {
    pub base: Base,
    pub stmts: Vec<Node>,
}

impl BlockNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        for stmt in &mut self.stmts {
            stmt.collate_registry(ctx, registry)?;
        }
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        ctx.symbols.push();

        if let Some(hint) = self.base.type_hint {
            if let Some(last) = self.stmts.last_mut() {
                last.set_type_hint(hint);
            }
        }

        let mut result = Ok(());
        for stmt in &mut self.stmts {
            result = stmt.process(ctx);
            if result.is_err() {
                break;
            }
        }
        ctx.symbols.pop();
        result?;

        // blocks are statement sequences; their own value is unit
        self.base.value = Some(Value::unit());
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        for stmt in &mut self.stmts {
            stmt.resolve(ctx)?;
        }
        Ok(())
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        for (i, stmt) in self.stmts.iter_mut().enumerate() {
            if i > 0 {
                // the previous statement's values are dead now
                ctx.regs.mark_all_free();
            }
            ctx.program.add_location(stmt.loc().clone());
            let result = stmt.generate_code(ctx);
            ctx.program.remove_location();
            result?;
        }
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        self.stmts.iter().any(Node::always_returns)
    }
}

pub struct LetNode {
    pub base: Base,
    pub name: String,
    pub declared: Option<TypeExpr>,
    pub init: Option<Box<Node>>,
    pub constant: bool,
    pub declared_type: Option<TypeId>,
    pub id: Option<crate::symbols::SymbolId>,
}

impl LetNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        match &mut self.init {
            Some(init) => init.collate_registry(ctx, registry),
            None => Ok(()),
        }
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        // the discard name evaluates its initialiser and drops the result
        if self.name == "_" {
            if self.declared.is_some() {
                ctx.messages.add(Message::error(
                    self.base.loc.copy(),
                    "special discard symbol cannot have a type annotation".to_string(),
                ));
                return Err(Failed);
            }
            let init = match &mut self.init {
                Some(init) => init,
                None => {
                    ctx.messages.add(Message::error(
                        self.base.loc.copy(),
                        "special discard symbol must be assigned".to_string(),
                    ));
                    return Err(Failed);
                }
            };
            init.process(ctx)?;
            init.resolve(ctx)?;
            self.base.value = Some(Value::unit());
            return Ok(());
        }

        if let Some(spec) = &self.declared {
            let spec = spec.clone();
            self.declared_type = Some(resolve_type(ctx, &spec)?);
        }

        if self.constant && self.init.is_none() {
            ctx.messages.add(Message::error(
                self.base.loc.copy(),
                "constant symbol must be initialised".to_string(),
            ));
            return Err(Failed);
        }

        if self.declared_type.is_none() && self.init.is_none() {
            ctx.messages.add(Message::error(
                self.base.loc.copy(),
                "cannot deduce type - expected explicit type or initialiser".to_string(),
            ));
            return Err(Failed);
        }

        if let Some(init) = &mut self.init {
            if let Some(declared) = self.declared_type {
                init.set_type_hint(declared);
            }
            init.process(ctx)?;
            init.resolve(ctx)?;

            let found = init.value().type_id;
            if found == types::NAMESPACE {
                ctx.messages.add(Message::error(
                    init.loc().copy(),
                    "a namespace is not assignable".to_string(),
                ));
                return Err(Failed);
            }
            if let Some(declared) = self.declared_type {
                if !ctx.types.is_subtype(found, declared) {
                    error_type_mismatch(ctx, init.loc(), found, declared);
                    return Err(Failed);
                }
            } else {
                self.declared_type = Some(found);
            }
        }

        let type_id = self.declared_type.expect("symbol type was not deduced");

        // shadowing rules
        for other in ctx.symbols.find(&self.name) {
            let other_type = ctx.symbols.get(other).type_id;
            let other_loc = ctx.symbols.get(other).loc.clone();
            if other_type == types::NAMESPACE {
                ctx.messages.add(Message::error(
                    self.base.loc.copy(),
                    "name is bound to a namespace which cannot be shadowed".to_string(),
                ));
                ctx.messages
                    .add(Message::note(other_loc, "previously defined here".to_string()));
                return Err(Failed);
            }
            if ctx.types.is_function(other_type) && !ctx.types.is_function(type_id) {
                ctx.messages.add(Message::error(
                    self.base.loc.copy(),
                    format!(
                        "name is bound to a function which cannot be shadowed by type {}",
                        ctx.types.name(type_id)
                    ),
                ));
                ctx.messages
                    .add(Message::note(other_loc, "previously defined here".to_string()));
                return Err(Failed);
            }
            break;
        }

        let category = if ctx.symbols.in_global_scope() {
            Category::Global
        } else {
            Category::StackBased
        };
        let id = ctx.symbols.new_id();
        ctx.symbols.insert(Symbol {
            id,
            name: self.name.clone(),
            loc: self.base.loc.clone(),
            category,
            type_id,
            parent: None,
            constant: self.constant,
        });
        self.id = Some(id);

        let mut value = Value::of(type_id);
        value.lvalue = Some(LValue::Symbol(id));
        self.base.value = Some(value);
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        match &mut self.init {
            Some(init) => init.resolve(ctx),
            None => Ok(()),
        }
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let mut location = None;
        if self.name != "_" {
            let id = self.id.expect("symbol was not processed");
            ctx.program.add_location(self.base.loc.clone());
            {
                let (symbols, program, stack, types) = (
                    &mut ctx.symbols,
                    &mut ctx.program,
                    &mut ctx.stack,
                    &ctx.types,
                );
                symbols.allocate(id, program, stack, types);
            }
            ctx.program.remove_location();
            location = ctx.symbols.locate(id).cloned();
        }

        let init = match &mut self.init {
            Some(init) => init,
            None => return Ok(()),
        };

        if let Some(location) = &location {
            init.set_target(location.clone());
        }
        init.generate_code(ctx)?;

        if self.name == "_" {
            return Ok(());
        }

        let type_id = self.declared_type.expect("symbol type was not deduced");
        if ctx.types.size(type_id) == 0 {
            return Ok(());
        }

        let init_loc = init.loc().clone();
        let did_store = {
            let value = init.value_mut();
            builtins::materialise(ctx, value, location.as_ref(), &init_loc)?
        };

        let id = self.id.expect("symbol was not processed");
        if did_store {
            return Ok(());
        }

        let value = init.value().clone();
        expect_rvalue(ctx, &value, &init_loc)?;

        let coerced = {
            let (regs, mut em) = ctx.regs_emit();
            regs.guarantee_datatype(value.reference(), type_id, &mut em)
        };

        if ctx.types.reference_as_ptr(type_id) {
            let size = ctx.types.size(type_id);
            let describe = ctx.types.name(type_id);
            builtins::mem_copy(
                ctx,
                coerced,
                builtins::CopyDest::Symbol(id),
                size,
                &describe,
            )?;
        } else {
            let (symbols, program, types) = (&ctx.symbols, &mut ctx.program, &ctx.types);
            symbols.assign_symbol(id, coerced.register(), program, types);
        }

        // the register now caches the fresh symbol value
        let mut cached = Value::of(type_id);
        cached.lvalue = Some(LValue::Symbol(id));
        cached.rvalue = Some(coerced);
        ctx.regs.update(coerced, Object::new(cached));
        ctx.regs.mark_free(coerced);

        ctx.program.update_line_origins(&self.base.loc, 0, false);
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}

pub struct IfNode {
    pub base: Base,
    pub guard: Box<Node>,
    pub then_branch: Box<Node>,
    pub else_branch: Option<Box<Node>>,
    pub id: u32,
}

impl IfNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        self.guard.collate_registry(ctx, registry)?;
        self.then_branch.collate_registry(ctx, registry)?;
        if let Some(else_branch) = &mut self.else_branch {
            else_branch.collate_registry(ctx, registry)?;
        }
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        self.id = ctx.next_block_id();

        self.guard.process(ctx)?;
        if let Some(hint) = self.base.type_hint {
            self.then_branch.set_type_hint(hint);
            if let Some(else_branch) = &mut self.else_branch {
                else_branch.set_type_hint(hint);
            }
        }
        self.then_branch.process(ctx)?;
        if let Some(else_branch) = &mut self.else_branch {
            else_branch.process(ctx)?;
        }

        self.guard.resolve(ctx)?;
        let guard_type = self.guard.value().type_id;
        if !ctx.types.is_subtype(guard_type, types::BOOL) {
            error_type_mismatch(ctx, self.guard.loc(), guard_type, types::BOOL);
            return Err(Failed);
        }

        self.then_branch.resolve(ctx)?;
        let then_type = self.then_branch.value().type_id;

        self.base.value = Some(match &mut self.else_branch {
            Some(else_branch) => {
                else_branch.resolve(ctx)?;
                let else_type = else_branch.value().type_id;
                let then_returns = self.then_branch.always_returns();
                let else_returns = else_branch.always_returns();

                if then_returns && else_returns {
                    Value::unit()
                } else if then_returns {
                    Value::of(else_type)
                } else if else_returns {
                    Value::of(then_type)
                } else if then_type != else_type {
                    ctx.messages.add(Message::error(
                        self.base.loc.copy(),
                        format!(
                            "if branches disagree: {} vs {}",
                            ctx.types.name(then_type),
                            ctx.types.name(else_type)
                        ),
                    ));
                    return Err(Failed);
                } else {
                    Value::of(then_type)
                }
            }
            None => {
                // a missing else implicitly produces (), so the then
                // branch must as well
                if then_type != types::UNIT && !self.then_branch.always_returns() {
                    error_type_mismatch(ctx, self.then_branch.loc(), then_type, types::UNIT);
                    return Err(Failed);
                }
                Value::unit()
            }
        });
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        self.guard.resolve(ctx)?;
        self.then_branch.resolve(ctx)?;
        if let Some(else_branch) = &mut self.else_branch {
            else_branch.resolve(ctx)?;
        }
        Ok(())
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let origin = ctx.program.current_id();

        let then_id = ctx
            .program
            .insert(Position::After, BasicBlock::labelled(format!("then_{}", self.id)));
        let else_id = self.else_branch.as_ref().map(|_| {
            ctx.program
                .insert(Position::After, BasicBlock::labelled(format!("else_{}", self.id)))
        });
        let after_id = ctx
            .program
            .insert(Position::After, BasicBlock::labelled(format!("after_{}", self.id)));

        // guard, with branch targets attached
        ctx.program.select_id(origin);
        let cond = ConditionalContext::new(then_id, else_id.unwrap_or(after_id));
        self.guard.set_conditional(cond);
        self.guard.generate_code(ctx)?;
        if !self.guard.conditional_handled() {
            let mut value = self.guard.value().clone();
            let guard_loc = self.guard.loc().clone();
            builtins::materialise(ctx, &mut value, None, &guard_loc)?;
            builtins::generate_branches_for_value(ctx, &cond, &value, &guard_loc)?;
        }

        let join_type = self.base.value.as_ref().map(|v| v.type_id).unwrap_or(types::UNIT);

        // then branch; the branch body is one of several runtime paths, so
        // it may not rely on the guard's cached registers mutating
        ctx.program.select_id(then_id);
        ctx.regs.evict_all();
        self.then_branch.generate_code(ctx)?;
        if !self.then_branch.always_returns() {
            move_branch_result(ctx, &mut self.then_branch, join_type)?;
            let after_label = ctx.program.block_label(after_id).to_string();
            ctx.program.add(create::branch(AsmArg::label(after_label)));
        }

        // else branch falls through into the after block
        if let (Some(else_branch), Some(else_id)) = (&mut self.else_branch, else_id) {
            ctx.program.select_id(else_id);
            ctx.regs.evict_all();
            else_branch.generate_code(ctx)?;
            if !else_branch.always_returns() {
                move_branch_result(ctx, else_branch, join_type)?;
            }
        }

        let join = Value::rvalue_of(join_type, Ref::reg(Register::Ret.index()));
        ctx.regs.update_ret(Object::new(join.clone()));
        self.base.value = Some(join);

        ctx.program.select_id(after_id);
        ctx.regs.evict_all();
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        self.then_branch.always_returns()
            && self
                .else_branch
                .as_ref()
                .map_or(false, |else_branch| else_branch.always_returns())
    }
}

/// Coerce a branch's non-unit result into `$ret` so the join point sees a
/// single home for the if-expression's value.
fn move_branch_result(ctx: &mut Context, branch: &mut Node, join_type: TypeId) -> PhaseResult {
    if ctx.types.size(join_type) == 0 {
        return Ok(());
    }
    let branch_loc = branch.loc().clone();
    let value = branch.value_mut();
    builtins::materialise(ctx, value, None, &branch_loc)?;
    if !value.is_rvalue() {
        return Ok(());
    }
    let reference = value.reference();
    let (regs, mut em) = ctx.regs_emit();
    let coerced = regs.guarantee_datatype(reference, join_type, &mut em);
    let arg = regs.resolve_ref(coerced, true);
    ctx.program
        .add(create::load(Register::Ret.index(), arg));
    Ok(())
}

pub struct WhileNode {
    pub base: Base,
    pub guard: Box<Node>,
    pub body: Box<Node>,
    pub id: u32,
}

impl WhileNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        self.guard.collate_registry(ctx, registry)?;
        self.body.collate_registry(ctx, registry)
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        self.id = ctx.next_block_id();

        self.guard.process(ctx)?;
        ctx.loop_depth += 1;
        let body_result = self.body.process(ctx);
        ctx.loop_depth -= 1;
        body_result?;

        self.guard.resolve(ctx)?;
        let guard_type = self.guard.value().type_id;
        if !ctx.types.is_subtype(guard_type, types::BOOL) {
            error_type_mismatch(ctx, self.guard.loc(), guard_type, types::BOOL);
            return Err(Failed);
        }

        let body_type = self.body.value().type_id;
        if body_type != types::UNIT && !self.body.always_returns() {
            error_type_mismatch(ctx, self.body.loc(), body_type, types::UNIT);
            return Err(Failed);
        }

        self.base.value = Some(Value::unit());
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        self.guard.resolve(ctx)?;
        self.body.resolve(ctx)
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let guard_id = ctx.program.insert(
            Position::After,
            BasicBlock::labelled(format!("whileguard_{}", self.id)),
        );
        let body_id = ctx.program.insert(
            Position::After,
            BasicBlock::labelled(format!("whilebody_{}", self.id)),
        );
        let end_id = ctx.program.insert(
            Position::After,
            BasicBlock::labelled(format!("endwhile_{}", self.id)),
        );

        // the guard re-runs on every iteration; cached registers from the
        // preceding straight-line code are not valid here
        ctx.program.select_id(guard_id);
        ctx.regs.evict_all();
        let cond = ConditionalContext::new(body_id, end_id);
        self.guard.set_conditional(cond);
        self.guard.generate_code(ctx)?;
        if !self.guard.conditional_handled() {
            let mut value = self.guard.value().clone();
            let guard_loc = self.guard.loc().clone();
            builtins::materialise(ctx, &mut value, None, &guard_loc)?;
            builtins::generate_branches_for_value(ctx, &cond, &value, &guard_loc)?;
        }

        ctx.program.select_id(body_id);
        ctx.regs.evict_all();
        let body = &mut self.body;
        super::with_loop(
            ctx,
            LoopContext {
                start: guard_id,
                end: end_id,
            },
            |ctx| body.generate_code(ctx),
        )?;
        let guard_label = ctx.program.block_label(guard_id).to_string();
        ctx.program.add(create::branch(AsmArg::label(guard_label)));

        ctx.program.select_id(end_id);
        ctx.regs.evict_all();
        self.base.value = Some(Value::unit());
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        self.guard.always_returns() || self.body.always_returns()
    }
}

pub struct LoopNode {
    pub base: Base,
    pub body: Box<Node>,
    pub id: u32,
}

impl LoopNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        self.body.collate_registry(ctx, registry)
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        self.id = ctx.next_block_id();
        ctx.loop_depth += 1;
        let result = self.body.process(ctx);
        ctx.loop_depth -= 1;
        result?;

        let body_type = self.body.value().type_id;
        if body_type != types::UNIT && !self.body.always_returns() {
            error_type_mismatch(ctx, self.body.loc(), body_type, types::UNIT);
            return Err(Failed);
        }

        self.base.value = Some(Value::unit());
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        self.body.resolve(ctx)
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let body_id = ctx.program.insert(
            Position::After,
            BasicBlock::labelled(format!("loopbody_{}", self.id)),
        );
        let end_id = ctx.program.insert(
            Position::After,
            BasicBlock::labelled(format!("endloop_{}", self.id)),
        );

        ctx.program.select_id(body_id);
        ctx.regs.evict_all();
        let body = &mut self.body;
        super::with_loop(
            ctx,
            LoopContext {
                start: body_id,
                end: end_id,
            },
            |ctx| body.generate_code(ctx),
        )?;
        let body_label = ctx.program.block_label(body_id).to_string();
        ctx.program.add(create::branch(AsmArg::label(body_label)));

        ctx.program.select_id(end_id);
        ctx.regs.evict_all();
        self.base.value = Some(Value::unit());
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        self.body.always_returns()
    }
}

pub struct LoopControlNode {
    pub base: Base,
    pub is_break: bool,
}

impl LoopControlNode {
    fn keyword(&self) -> &'static str {
        if self.is_break {
            "break"
        } else {
            "continue"
        }
    }

    pub fn collate(&mut self, _ctx: &mut Context, _registry: &mut Registry) -> PhaseResult {
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        if ctx.loop_depth == 0 {
            ctx.messages.add(Message::error(
                self.base.loc.copy(),
                format!("'{}' statement must be inside a loop", self.keyword()),
            ));
            return Err(Failed);
        }
        self.base.value = Some(Value::unit());
        Ok(())
    }

    pub fn resolve(&mut self, _ctx: &mut Context) -> PhaseResult {
        Ok(())
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let target = match ctx.loops.last() {
            Some(loop_ctx) => {
                if self.is_break {
                    loop_ctx.end
                } else {
                    loop_ctx.start
                }
            }
            None => {
                ctx.messages.add(Message::error(
                    self.base.loc.copy(),
                    format!("'{}' statement must be inside a loop", self.keyword()),
                ));
                return Err(Failed);
            }
        };

        let label = ctx.program.block_label(target).to_string();
        let mut line = create::branch(AsmArg::label(label));
        line.set_comment(self.keyword().to_string());
        ctx.program.add(line);
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}

pub struct ReturnNode {
    pub base: Base,
    pub expr: Option<Box<Node>>,
    /// Enclosing function's return type, captured during process.
    pub return_type: Option<TypeId>,
}

impl ReturnNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        match &mut self.expr {
            Some(expr) => expr.collate_registry(ctx, registry),
            None => Ok(()),
        }
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        let function = match ctx.symbols.current_function() {
            Some(function) => function,
            None => {
                ctx.messages.add(Message::error(
                    self.base.loc.copy(),
                    "'return' outside of a function".to_string(),
                ));
                return Err(Failed);
            }
        };
        let (_, return_type) = ctx
            .types
            .function_parts(ctx.symbols.get(function).type_id)
            .map(|(p, r)| (p.to_vec(), r))
            .expect("function symbol has a non-function type");
        self.return_type = Some(return_type);

        let found = match &mut self.expr {
            Some(expr) => {
                expr.set_type_hint(return_type);
                expr.process(ctx)?;
                expr.resolve(ctx)?;
                expr.value().type_id
            }
            None => types::UNIT,
        };

        if !ctx.types.is_subtype(found, return_type) {
            let loc = self
                .expr
                .as_ref()
                .map(|e| e.loc().clone())
                .unwrap_or_else(|| self.base.loc.clone());
            error_type_mismatch(ctx, &loc, found, return_type);
            let function_loc = ctx.symbols.get(function).loc.clone();
            ctx.messages.add(Message::note(
                function_loc,
                "enclosing function defined here".to_string(),
            ));
            return Err(Failed);
        }

        self.base.value = Some(Value::unit());
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        match &mut self.expr {
            Some(expr) => expr.resolve(ctx),
            None => Ok(()),
        }
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let expr = match &mut self.expr {
            Some(expr) => expr,
            None => {
                ctx.program.add(create::ret());
                return Ok(());
            }
        };

        expr.generate_code(ctx)?;
        let expr_loc = expr.loc().clone();
        {
            let value = expr.value_mut();
            builtins::materialise(ctx, value, None, &expr_loc)?;
        }
        let value = expr.value().clone();
        expect_rvalue(ctx, &value, &expr_loc)?;

        let return_type = self.return_type.expect("return was not processed");
        let reg = {
            let (regs, mut em) = ctx.regs_emit();
            let coerced = regs.guarantee_datatype(value.reference(), return_type, &mut em);
            regs.guarantee_register(coerced, &mut em).register()
        };
        ctx.program.add(create::ret_value(AsmArg::reg(reg)));
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        true
    }
}

pub struct NamespaceNode {
    pub base: Base,
    pub name: String,
    pub stmts: Vec<Node>,
    pub id: Option<crate::symbols::SymbolId>,
}

impl NamespaceNode {
    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        let id = ctx.symbols.new_id();
        registry.register(Symbol {
            id,
            name: self.name.clone(),
            loc: self.base.loc.clone(),
            category: Category::Namespace,
            type_id: types::NAMESPACE,
            parent: None,
            constant: false,
        });
        self.id = Some(id);
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        let id = match self.id {
            Some(id) => id,
            None => {
                // nested namespaces register here, under the current path
                let id = ctx.symbols.new_id();
                ctx.symbols.insert(Symbol {
                    id,
                    name: self.name.clone(),
                    loc: self.base.loc.clone(),
                    category: Category::Namespace,
                    type_id: types::NAMESPACE,
                    parent: None,
                    constant: false,
                });
                self.id = Some(id);
                id
            }
        };

        ctx.symbols.push_path(id);
        let mut result = Ok(());
        for stmt in &mut self.stmts {
            result = stmt.process(ctx);
            if result.is_err() {
                break;
            }
        }
        ctx.symbols.pop_path();
        result?;

        self.base.value = Some(Value::of(types::NAMESPACE));
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        for stmt in &mut self.stmts {
            stmt.resolve(ctx)?;
        }
        Ok(())
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        let id = self.id.expect("namespace was not processed");
        ctx.symbols.push_path(id);
        let mut result = Ok(());
        for stmt in &mut self.stmts {
            result = stmt.generate_code(ctx);
            if result.is_err() {
                break;
            }
        }
        ctx.symbols.pop_path();
        result
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}
