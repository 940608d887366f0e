//! Function declarations and definitions.

use super::{resolve_type, Base, Node, TypeExpr};
use crate::assembly::AsmArg;
use crate::context::Context;
use crate::create;
use crate::regalloc::Object;
use crate::symbols::{Category, Registry, StorageLocation, Symbol, SymbolId};
use crate::types::{self, TypeId};
use crate::value::{Ref, Value};
use eisa::Register;
use util::{Failed, Location, Message, PhaseResult};

pub struct Param {
    pub name: String,
    pub loc: Location,
    pub spec: TypeExpr,
    pub type_id: Option<TypeId>,
}

pub struct FunctionNode {
    pub base: Base,
    pub name: String,
    pub name_loc: Location,
    pub params: Vec<Param>,
    pub ret_spec: Option<TypeExpr>,
    pub body: Option<Box<Node>>,
    pub type_id: Option<TypeId>,
    pub id: Option<SymbolId>,
    /// Cleared when a declaration is satisfied by an existing definition.
    pub generate: bool,
}

impl FunctionNode {
    pub fn is_implemented(&self) -> bool {
        self.body.is_some()
    }

    fn validate_params(&self, ctx: &mut Context) -> PhaseResult {
        for (i, param) in self.params.iter().enumerate() {
            if param.name == "_" {
                continue;
            }
            if let Some(previous) = self.params[..i].iter().find(|p| p.name == param.name) {
                ctx.messages.add(Message::error(
                    param.loc.copy(),
                    format!("duplicate parameter name {}", param.name),
                ));
                ctx.messages.add(Message::note(
                    previous.loc.copy(),
                    "parameter first found here".to_string(),
                ));
                return Err(Failed);
            }
        }
        Ok(())
    }

    fn resolve_signature(&mut self, ctx: &mut Context) -> PhaseResult<TypeId> {
        if let Some(existing) = self.type_id {
            return Ok(existing);
        }
        let mut param_ids = Vec::with_capacity(self.params.len());
        for param in &mut self.params {
            let spec = param.spec.clone();
            let id = resolve_type(ctx, &spec)?;
            param.type_id = Some(id);
            param_ids.push(id);
        }
        let ret = match &self.ret_spec {
            Some(spec) => {
                let spec = spec.clone();
                resolve_type(ctx, &spec)?
            }
            None => types::UNIT,
        };
        let type_id = ctx.types.function_of(param_ids, ret);
        self.type_id = Some(type_id);
        Ok(type_id)
    }

    pub fn collate(&mut self, ctx: &mut Context, registry: &mut Registry) -> PhaseResult {
        if self.name == "_" {
            ctx.messages.add(Message::error(
                self.name_loc.copy(),
                "the discard symbol cannot name a function".to_string(),
            ));
            return Err(Failed);
        }

        self.validate_params(ctx)?;
        let type_id = self.resolve_signature(ctx)?;

        if let Some(existing) = registry.get(&self.name, type_id) {
            if self.is_implemented() {
                // two bodies with an identical signature
                ctx.messages.add(Message::error(
                    self.name_loc.copy(),
                    format!(
                        "re-definition of function '{}' with identical signature",
                        self.name
                    ),
                ));
                ctx.messages.add(Message::note(
                    existing.loc.copy(),
                    "previously declared here".to_string(),
                ));
                return Err(Failed);
            }
            // a declaration satisfied by an existing registration
            self.generate = false;
            self.id = Some(existing.id);
            return Ok(());
        }

        let id = ctx.symbols.new_id();
        registry.register(Symbol {
            id,
            name: self.name.clone(),
            loc: self.name_loc.clone(),
            category: Category::Function,
            type_id,
            parent: None,
            constant: false,
        });
        self.id = Some(id);
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut Context) -> PhaseResult {
        let type_id = self.resolve_signature(ctx)?;

        // namespace members were not collated at the top level; register
        // them now under the active path
        let id = match self.id {
            Some(id) => id,
            None => {
                self.validate_params(ctx)?;
                let id = ctx.symbols.new_id();
                ctx.symbols.insert(Symbol {
                    id,
                    name: self.name.clone(),
                    loc: self.name_loc.clone(),
                    category: Category::Function,
                    type_id,
                    parent: None,
                    constant: false,
                });
                self.id = Some(id);
                id
            }
        };

        // a bodyless declaration with placeholders disabled must be
        // satisfied elsewhere
        if !self.is_implemented() && !ctx.config.function_placeholder {
            let qualified = ctx.symbols.path_name(&self.name);
            if ctx.symbols.find_with_type(&qualified, type_id).is_none() {
                ctx.messages.add(Message::error(
                    self.name_loc.copy(),
                    "function was declared but does not exist".to_string(),
                ));
                ctx.messages.add(Message::new(
                    util::Level::Note,
                    format!("function signature: {}", ctx.types.name(type_id)),
                ));
                ctx.messages.add(Message::new(
                    util::Level::Note,
                    "function declarations enforce the existence of a function, did you forget to include a library?"
                        .to_string(),
                ));
                return Err(Failed);
            }
            self.generate = false;
        }

        let body = match &mut self.body {
            Some(body) => body,
            None => {
                self.base.value = Some(Value::unit());
                return Ok(());
            }
        };

        ctx.symbols.enter_function(id);
        ctx.symbols.push();

        // place parameters at cumulative positive offsets below the frame
        // pointer, in declaration order
        let mut offset = 0u64;
        let mut ignored = Vec::new();
        for (i, param) in self.params.iter().enumerate() {
            let param_type = param.type_id.expect("parameter type unresolved");
            offset += ctx.types.size(param_type);

            if param.name == "_" {
                ignored.push(i);
                continue;
            }

            let param_id = ctx.symbols.new_id();
            ctx.symbols.insert(Symbol {
                id: param_id,
                name: param.name.clone(),
                loc: param.loc.clone(),
                category: Category::Argument,
                type_id: param_type,
                parent: None,
                constant: false,
            });
            ctx.symbols
                .allocate_at(param_id, StorageLocation::stack(offset));
        }
        ctx.symbols.set_ignored_params(id, ignored);

        let result = body.process(ctx);
        ctx.symbols.pop();
        ctx.symbols.exit_function();
        result?;

        // non-unit functions must return on every path
        let (_, ret) = ctx
            .types
            .function_parts(type_id)
            .map(|(p, r)| (p.to_vec(), r))
            .unwrap();
        if ret != types::UNIT && !body.always_returns() {
            ctx.messages.add(Message::error(
                self.base.loc.copy(),
                format!(
                    "missing return statement in function returning type {}",
                    ctx.types.name(ret)
                ),
            ));
            ctx.messages.add(Message::note(
                self.name_loc.copy(),
                "enclosing function defined here".to_string(),
            ));
            return Err(Failed);
        }

        self.base.value = Some(Value::unit());
        Ok(())
    }

    pub fn resolve(&mut self, ctx: &mut Context) -> PhaseResult {
        match &mut self.body {
            Some(body) => body.resolve(ctx),
            None => Ok(()),
        }
    }

    pub fn generate(&mut self, ctx: &mut Context) -> PhaseResult {
        if !self.generate {
            return Ok(());
        }
        let id = self.id.expect("function was not processed");
        let type_id = self.type_id.expect("function signature unresolved");
        let (params, ret) = ctx
            .types
            .function_parts(type_id)
            .map(|(p, r)| (p.to_vec(), r))
            .unwrap();

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

        let previous = ctx.program.current_id();
        let label = ctx.symbols.block_label(id);
        if !ctx.program.select_label(&label) {
            // allocate just inserted the block, so this cannot fail
            return Err(Failed);
        }

        // a bodyless stub keeps linkage expectations intact
        let body = match &mut self.body {
            Some(body) => body,
            None => {
                if ctx.types.size(ret) == 0 {
                    ctx.program.add(create::ret());
                } else {
                    ctx.program.add(create::ret_value(AsmArg::imm(0)));
                }
                ctx.regs.update_ret(Object::new(Value::rvalue_of(
                    ret,
                    Ref::reg(Register::Ret.index()),
                )));
                ctx.program.update_line_origins(&self.base.loc, 0, false);
                ctx.program.select_id(previous);
                return Ok(());
            }
        };

        // registers are only saved in the emitted code around calls; the
        // callee starts from a clean store, and may not trust any cached
        // register contents from its (many possible) callers
        {
            let (regs, mut em) = ctx.regs_emit();
            regs.save_store(false, &mut em);
        }
        ctx.regs.evict_all();
        let args_bytes: u64 = params.iter().map(|p| ctx.types.size(*p)).sum();
        ctx.stack.push_frame(args_bytes, false, &mut ctx.program);

        let result = body.generate_code(ctx);

        ctx.stack.pop_frame(false, &mut ctx.program);
        result?;

        ctx.regs.propagate_ret();
        {
            let (regs, mut em) = ctx.regs_emit();
            regs.destroy_store(false, &mut em);
        }

        if !body.always_returns() {
            // the return type is unit here; process checked the rest
            let mut line = create::ret();
            line.origin = Some(self.base.loc.clone());
            ctx.program.add(line);
            ctx.regs.update_ret(Object::new(Value::rvalue_of(
                types::UNIT,
                Ref::reg(Register::Ret.index()),
            )));
        }

        ctx.program.select_id(previous);
        self.base.value = Some(Value::unit());
        Ok(())
    }

    pub fn always_returns(&self) -> bool {
        false
    }
}
