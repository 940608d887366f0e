//! Built-in operator registration and the shared code-generation
//! primitives: operator invocation, the calling convention, `mem_copy`,
//! pointer arithmetic, dereferencing, address-of and value
//! materialisation.

use crate::assembly::AsmArg;
use crate::ast::Node;
use crate::context::{ConditionalContext, Context};
use crate::create;
use crate::operators::{ArithOp, BitOp, OperatorId, OperatorKind, OperatorRegistry};
use crate::regalloc::Object;
use crate::symbols::{StorageLocation, SymbolId};
use crate::types::{self, TypeGraph, TypeId};
use crate::value::{Ref, Value, ValueKind};
use eisa::registers::GENERAL_START;
use eisa::{ConditionFlag, DataType, Register};
use std::collections::HashSet;
use util::{Failed, Location, Message, PhaseResult};

/// Register every built-in operator. Ordering is part of the resolution
/// contract: candidates are considered in registration order.
pub fn init_builtins(registry: &mut OperatorRegistry, types: &mut TypeGraph) {
    let arith_types = [
        types::I32,
        types::U32,
        types::I64,
        types::U64,
        types::F32,
        types::F64,
    ];
    let arith_ops = [
        ("+", ArithOp::Add),
        ("-", ArithOp::Sub),
        ("*", ArithOp::Mul),
        ("/", ArithOp::Div),
    ];
    for (symbol, op) in &arith_ops {
        for operand in &arith_types {
            let sig = types.function_of(vec![*operand, *operand], *operand);
            registry.register(
                *symbol,
                sig,
                OperatorKind::Arith {
                    op: *op,
                    operand: *operand,
                },
            );
        }
    }

    // shifts and masks work on full words
    for operand in &[types::U64, types::I64] {
        for (symbol, op) in &[("<<", BitOp::Shl), (">>", BitOp::Shr)] {
            let sig = types.function_of(vec![*operand, *operand], *operand);
            registry.register(*symbol, sig, OperatorKind::Bitwise { op: *op });
        }
        for (symbol, op) in &[("&", BitOp::And), ("|", BitOp::Or), ("^", BitOp::Xor)] {
            let sig = types.function_of(vec![*operand, *operand], *operand);
            registry.register(*symbol, sig, OperatorKind::Bitwise { op: *op });
        }
    }

    let modulo = types.function_of(vec![types::U64, types::I32], types::I64);
    registry.register("%", modulo, OperatorKind::Bitwise { op: BitOp::Mod });

    let relational = [
        ("==", ConditionFlag::Eq),
        ("!=", ConditionFlag::Ne),
        ("<", ConditionFlag::Lt),
        ("<=", ConditionFlag::Le),
        (">", ConditionFlag::Gt),
        (">=", ConditionFlag::Ge),
    ];
    for (symbol, flag) in &relational {
        for operand in &types::NUMERIC {
            let sig = types.function_of(vec![*operand, *operand], types::BOOL);
            registry.register(
                *symbol,
                sig,
                OperatorKind::Relational {
                    operand: *operand,
                    flag: *flag,
                },
            );
        }
    }

    let bool_pair = types.function_of(vec![types::BOOL, types::BOOL], types::BOOL);
    registry.register("==", bool_pair, OperatorKind::BoolEq { negate: false });
    registry.register("!=", bool_pair, OperatorKind::BoolEq { negate: true });

    for operand in &[types::I32, types::I64, types::F32, types::F64] {
        let sig = types.function_of(vec![*operand], *operand);
        registry.register("-", sig, OperatorKind::Negate { operand: *operand });
    }

    let bool_unary = types.function_of(vec![types::BOOL], types::BOOL);
    registry.register("!", bool_unary, OperatorKind::BooleanNot);

    for operand in &[types::U64, types::I64] {
        let sig = types.function_of(vec![*operand], *operand);
        registry.register("~", sig, OperatorKind::BitwiseNot);
    }

    registry.register("&&", bool_pair, OperatorKind::Lazy { and: true });
    registry.register("||", bool_pair, OperatorKind::Lazy { and: false });
}

/// The first syscall-argument register used by `mem_copy` (three
/// consecutive general registers).
fn syscall_reg(n: u8) -> u8 {
    GENERAL_START + n
}

/// Emit the branch pair a guard's conditional context asks for.
pub fn generate_branches(ctx: &mut Context, cond: &ConditionalContext, flag: ConditionFlag) {
    let guard = if cond.inverse { flag.inverse() } else { flag };

    if let Some(block) = cond.if_true {
        let label = ctx.program.block_label(block).to_string();
        ctx.program.add(create::branch_if(guard, AsmArg::label(label)));
    }
    if let Some(block) = cond.if_false {
        let label = ctx.program.block_label(block).to_string();
        ctx.program
            .add(create::branch_if(guard.inverse(), AsmArg::label(label)));
    }
}

/// Zero-compare fallback when a guard produced a plain Boolean value.
pub fn generate_branches_for_value(
    ctx: &mut Context,
    cond: &ConditionalContext,
    value: &Value,
    loc: &Location,
) -> PhaseResult {
    if !value.is_rvalue() {
        ctx.messages.add(Message::error(
            loc.copy(),
            format!("expected rvalue, got {}", ctx.types.name(value.type_id)),
        ));
        return Err(Failed);
    }

    let (regs, mut em) = ctx.regs_emit();
    let reference = regs.guarantee_register(value.reference(), &mut em);
    let reg = reference.register();
    ctx.program
        .add(create::comparison(DataType::U64, reg, AsmArg::imm(0)));
    generate_branches(ctx, cond, ConditionFlag::Nz);
    Ok(())
}

/// Fetch the two most recent placements as (register, other-operand),
/// coercing both to `cast_to` when given. One side is guaranteed to be a
/// register; the other is released.
fn fetch_argument_pair(ctx: &mut Context, cast_to: Option<TypeId>) -> (u8, AsmArg) {
    let (regs, mut em) = ctx.regs_emit();
    let mut lhs = regs.get_recent(1).expect("missing lhs operand");
    let mut rhs = regs.get_recent(0).expect("missing rhs operand");

    if let Some(target) = cast_to {
        lhs = regs.guarantee_datatype(lhs, target, &mut em);
        rhs = regs.guarantee_datatype(rhs, target, &mut em);
    }

    let lhs = regs.guarantee_register(lhs, &mut em);
    let other = regs.resolve_ref(rhs, true);
    (lhs.register(), other)
}

fn fetch_sole_argument(ctx: &mut Context, cast_to: Option<TypeId>) -> u8 {
    let (regs, mut em) = ctx.regs_emit();
    let mut arg = regs.get_recent(0).expect("missing operand");
    if let Some(target) = cast_to {
        arg = regs.guarantee_datatype(arg, target, &mut em);
    }
    regs.guarantee_register(arg, &mut em).register()
}

/// Rebind the register's object to a plain rvalue of `type_id`; the old
/// occupant's value no longer matches the machine state.
fn spoil(ctx: &mut Context, reg: u8, type_id: TypeId) {
    let reference = Ref::reg(reg);
    let object = Object::new(Value::rvalue_of(type_id, reference));
    ctx.regs.update(reference, object);
}

/// Generate an operator application. Children are generated and
/// materialised left to right; the result's rvalue lands in
/// `return_value`. Returns whether a conditional context was consumed by
/// emitted branches.
pub fn invoke_operator(
    ctx: &mut Context,
    op_id: OperatorId,
    args: &mut [Node],
    return_value: &mut Value,
    cond: Option<ConditionalContext>,
    loc: &Location,
) -> PhaseResult<bool> {
    let op = ctx.ops.get(op_id);
    let kind = op.kind;
    let symbol = op.symbol.clone();
    let (_, ret_type) = ctx
        .types
        .function_parts(ctx.ops.get(op_id).type_id)
        .map(|(p, r)| (p.to_vec(), r))
        .expect("operator signature is not a function type");

    // Boolean negation may push the whole job into its child
    if let OperatorKind::BooleanNot = kind {
        if let Some(cond) = cond {
            let inverted = cond.inverse();
            args[0].set_conditional(inverted);
            args[0].generate_code(ctx)?;
            if args[0].conditional_handled() {
                return Ok(true);
            }

            // the child produced a plain Boolean; compare and branch with
            // the inverted sense
            let value = args[0]
                .base_mut()
                .value
                .as_mut()
                .expect("operand was not processed");
            materialise(ctx, value, None, loc)?;
            let value = args[0].value().clone();
            generate_branches_for_value(ctx, &inverted, &value, loc)?;
            return Ok(true);
        }
    }

    if let OperatorKind::UserDefined(symbol_id) = kind {
        let function = AsmArg::label(ctx.symbols.block_label(symbol_id));
        let name = ctx.symbols.full_name(symbol_id);
        let signature = ctx.symbols.get(symbol_id).type_id;
        call_function(
            ctx,
            function,
            &name,
            signature,
            args,
            &HashSet::new(),
            return_value,
            None,
        )?;
        return Ok(false);
    }

    // generate and materialise every argument
    for arg in args.iter_mut() {
        arg.generate_code(ctx)?;
        let loc = arg.loc().clone();
        let value = arg
            .base_mut()
            .value
            .as_mut()
            .expect("operand was not processed");
        materialise(ctx, value, None, &loc)?;
        if !value.is_rvalue() {
            let type_id = value.type_id;
            ctx.messages.add(Message::error(
                loc,
                format!("expected rvalue, got {}", ctx.types.name(type_id)),
            ));
            return Err(Failed);
        }
    }

    let mut handled = false;
    let result_reg = match kind {
        OperatorKind::Arith { op, operand } => {
            let dt = ctx.types.asm_datatype(operand);
            let (reg, other) = fetch_argument_pair(ctx, Some(operand));
            let line = match op {
                ArithOp::Add => create::add(dt, reg, reg, other),
                ArithOp::Sub => create::sub(dt, reg, reg, other),
                ArithOp::Mul => create::mul(dt, reg, reg, other),
                ArithOp::Div => create::div(dt, reg, reg, other),
            };
            ctx.program.add(line);
            reg
        }
        OperatorKind::Bitwise { op } => {
            let (reg, other) = fetch_argument_pair(ctx, None);
            let line = match op {
                BitOp::And => create::and(reg, reg, other),
                BitOp::Or => create::or(reg, reg, other),
                BitOp::Xor => create::xor(reg, reg, other),
                BitOp::Shl => create::shift_left(reg, reg, other),
                BitOp::Shr => create::shift_right(reg, reg, other),
                BitOp::Mod => create::modulo(reg, reg, other),
            };
            ctx.program.add(line);
            reg
        }
        OperatorKind::Relational { operand, flag } => {
            let dt = ctx.types.asm_datatype(operand);
            let (reg, other) = fetch_argument_pair(ctx, Some(operand));
            ctx.program.add(create::comparison(dt, reg, other));

            match cond {
                Some(cond) => {
                    generate_branches(ctx, &cond, flag);
                    handled = true;
                    reg
                }
                None => {
                    // materialise the Boolean
                    ctx.program.add(create::zero(reg));
                    ctx.program
                        .add(create::load(reg, AsmArg::imm(1)).with_cond(flag));
                    reg
                }
            }
        }
        OperatorKind::BoolEq { negate } => {
            let (reg, other) = fetch_argument_pair(ctx, None);
            ctx.program.add(create::xor(reg, reg, other));
            if !negate {
                ctx.program.add(create::xor(reg, reg, AsmArg::imm(1)));
            }
            reg
        }
        OperatorKind::Negate { operand } => {
            let dt = ctx.types.asm_datatype(operand);
            let reg = fetch_sole_argument(ctx, Some(operand));
            let (regs, mut em) = ctx.regs_emit();
            let temp = regs
                .insert(Object::new(Value::of(operand)), &mut em)
                .register();
            ctx.program.add(create::load(temp, AsmArg::imm(0)));
            ctx.program
                .add(create::sub(dt, temp, temp, AsmArg::reg(reg)));
            ctx.regs.mark_free(Ref::reg(reg));
            temp
        }
        OperatorKind::BooleanNot => {
            let reg = fetch_sole_argument(ctx, None);
            ctx.program.add(create::xor(reg, reg, AsmArg::imm(1)));
            reg
        }
        OperatorKind::BitwiseNot => {
            let reg = fetch_sole_argument(ctx, None);
            ctx.program.add(create::not(reg, reg));
            reg
        }
        OperatorKind::Lazy { and } => {
            // eager fallback over already-evaluated Booleans
            let (reg, other) = fetch_argument_pair(ctx, None);
            let line = if and {
                create::and(reg, reg, other)
            } else {
                create::or(reg, reg, other)
            };
            ctx.program.add(line);
            reg
        }
        OperatorKind::UserDefined(_) => unreachable!(),
    };

    ctx.program.current_mut().back_mut().append_comment(&format!(
        "operator{}{}",
        symbol,
        ctx.types.name(ctx.ops.get(op_id).type_id)
    ));

    return_value.rvalue = Some(Ref::reg(result_reg));
    spoil(ctx, result_reg, ret_type);
    Ok(handled)
}

/// Destination of a `mem_copy`.
pub enum CopyDest {
    /// A symbol; its storage address is computed.
    Symbol(SymbolId),
    /// A register already holding the destination address.
    Ref(Ref),
    /// `$fp - offset` in the current frame.
    FpOffset(u64),
}

/// Copy `bytes` bytes from the address in `src` to `dest` via the copy
/// syscall. The three syscall argument registers are saved around the
/// call and restored in reverse order.
pub fn mem_copy(
    ctx: &mut Context,
    src: Ref,
    dest: CopyDest,
    bytes: u64,
    describe: &str,
) -> PhaseResult {
    let r1 = syscall_reg(0);
    let r2 = syscall_reg(1);
    let r3 = syscall_reg(2);
    let src_reg = src.register();

    // source address
    let mut old_r1 = None;
    if src_reg != r1 {
        let (regs, mut em) = ctx.regs_emit();
        old_r1 = regs.save_register(r1, &mut em);
        ctx.program.add(create::load(r1, AsmArg::reg(src_reg)));
    }

    // destination address
    let old_r2 = {
        let (regs, mut em) = ctx.regs_emit();
        regs.save_register(r2, &mut em)
    };
    let mut dest_comment = String::new();
    match dest {
        CopyDest::Symbol(id) => {
            dest_comment = ctx.symbols.full_name(id);
            let location = ctx
                .symbols
                .locate(id)
                .expect("mem_copy destination has no storage")
                .clone();
            match location {
                StorageLocation::Block { label, offset } => {
                    // a bare label resolves to the block's address
                    ctx.program.add(create::load(r2, AsmArg::label(label)));
                    if offset != 0 {
                        ctx.program
                            .add(create::add(DataType::U64, r2, r2, AsmArg::imm(offset)));
                    }
                }
                StorageLocation::Stack {
                    frame_offset,
                    offset,
                } => {
                    ctx.program.add(create::sub(
                        DataType::U64,
                        r2,
                        Register::Fp.index(),
                        AsmArg::imm(frame_offset - offset),
                    ));
                }
            }
        }
        CopyDest::Ref(reference) => {
            let reg = reference.register();
            dest_comment = format!("${}", Register::name(reg));
            if reg != r2 {
                ctx.program.add(create::load(r2, AsmArg::reg(reg)));
            }
        }
        CopyDest::FpOffset(offset) => {
            ctx.program.add(create::sub(
                DataType::U64,
                r2,
                Register::Fp.index(),
                AsmArg::imm(offset),
            ));
        }
    }

    // length
    let old_r3;
    {
        let (regs, mut em) = ctx.regs_emit();
        old_r3 = regs.save_register(r3, &mut em);
    }
    ctx.program.add(create::load(r3, AsmArg::imm(bytes)));

    ctx.program.add(create::system_call(AsmArg::imm(
        eisa::Syscall::CopyMem.code(),
    )));
    let comment = if dest_comment.is_empty() {
        format!("mem_copy: {}", describe)
    } else {
        format!("mem_copy into {}: {}", dest_comment, describe)
    };
    ctx.program.current_mut().back_mut().set_comment(comment);

    // restore in reverse order
    if let Some(object) = old_r3 {
        let (regs, mut em) = ctx.regs_emit();
        regs.restore_register(r3, object, &mut em);
    }
    if let Some(object) = old_r2 {
        let (regs, mut em) = ctx.regs_emit();
        regs.restore_register(r2, object, &mut em);
    }
    if let Some(object) = old_r1 {
        let (regs, mut em) = ctx.regs_emit();
        regs.restore_register(r1, object, &mut em);
    }
    Ok(())
}

/// `ptr ± offset * sizeof(T)`. Scales with a multiply when the element is
/// wider than two bytes, with a doubled addition at exactly two. Returns
/// the register holding the resulting pointer.
pub fn pointer_arithmetic(
    ctx: &mut Context,
    pointer: &Value,
    offset: &Value,
    subtract: bool,
    add_comment: bool,
) -> Ref {
    let elem = ctx
        .types
        .wrapped_inner(pointer.type_id)
        .map(|inner| ctx.types.size(inner))
        .unwrap_or(1);

    let (regs, mut em) = ctx.regs_emit();
    let ptr_ref = regs.guarantee_register(pointer.reference(), &mut em);
    let off_ref = regs.guarantee_register(offset.reference(), &mut em);
    let ptr = ptr_ref.register();
    let off = off_ref.register();

    let index = ctx.program.current().len();

    if elem > 2 {
        ctx.program
            .add(create::mul(DataType::U64, off, off, AsmArg::imm(elem)));
    }

    let step = |subtract: bool, ptr: u8, off: u8| {
        if subtract {
            create::sub(DataType::U64, ptr, ptr, AsmArg::reg(off))
        } else {
            create::add(DataType::U64, ptr, ptr, AsmArg::reg(off))
        }
    };
    if elem == 2 {
        ctx.program.add(step(subtract, ptr, off));
    }
    ctx.program.add(step(subtract, ptr, off));

    if add_comment {
        let text = format!(
            "operator{}({}, {})",
            if subtract { "-" } else { "+" },
            ctx.types.name(pointer.type_id),
            ctx.types.name(offset.type_id)
        );
        ctx.program.current_mut().lines[index].append_comment(&text);
    }

    spoil(ctx, ptr, pointer.type_id);
    if elem > 2 {
        spoil(ctx, off, types::U64);
    }
    ctx.regs.mark_free(off_ref);

    ptr_ref
}

/// Load through a pointer. When the wrapped type is itself
/// reference-as-ptr no further load is emitted; the pointer already is the
/// canonical value.
pub fn dereference(ctx: &mut Context, pointer: &Value, result: &mut Value, add_comment: bool) {
    let inner = ctx
        .types
        .wrapped_inner(pointer.type_id)
        .expect("dereference of a non-pointer");

    let (regs, mut em) = ctx.regs_emit();
    let src = regs.guarantee_register(pointer.reference(), &mut em);
    result.lvalue = Some(crate::value::LValue::Ref(src));

    let dest = if ctx.types.reference_as_ptr(inner) {
        src
    } else {
        let (regs, mut em) = ctx.regs_emit();
        let dest = regs.insert(Object::new(Value::of(inner)), &mut em);
        let dest = regs.guarantee_register(dest, &mut em);
        ctx.program.add(create::load(
            dest.register(),
            AsmArg::RegisterIndirect {
                reg: src.register(),
                offset: 0,
            },
        ));
        if add_comment {
            let text = format!("deref {}", ctx.types.name(pointer.type_id));
            ctx.program.current_mut().back_mut().append_comment(&text);
        }
        dest
    };

    spoil(ctx, dest.register(), inner);
    result.rvalue = Some(dest);
}

/// Load the address of a symbol's storage. Fails (quietly) when the
/// symbol has no storage; the caller reports.
pub fn address_of(ctx: &mut Context, id: SymbolId, result: &mut Value) -> bool {
    let location = match ctx.symbols.locate(id) {
        Some(location) => location.clone(),
        None => return false,
    };

    let (regs, mut em) = ctx.regs_emit();
    let reference = regs.insert(Object::new(Value::of(result.type_id)), &mut em);
    let reg = reference.register();

    match location {
        StorageLocation::Block { label, offset } => {
            ctx.program.add(create::load(reg, AsmArg::label(label)));
            if offset != 0 {
                ctx.program
                    .add(create::add(DataType::U64, reg, reg, AsmArg::imm(offset)));
            }
        }
        StorageLocation::Stack {
            frame_offset,
            offset,
        } => {
            let delta = frame_offset - offset;
            if delta == 0 {
                ctx.program
                    .add(create::load(reg, AsmArg::reg(Register::Fp.index())));
            } else {
                ctx.program.add(create::sub(
                    DataType::U64,
                    reg,
                    Register::Fp.index(),
                    AsmArg::imm(delta),
                ));
            }
        }
    }

    spoil(ctx, reg, result.type_id);
    result.rvalue = Some(reference);
    true
}

/// Load a value's rvalue into a register, optionally storing straight into
/// a target location. Returns whether materialisation itself performed
/// the store.
pub fn materialise(
    ctx: &mut Context,
    value: &mut Value,
    target: Option<&StorageLocation>,
    loc: &Location,
) -> PhaseResult<bool> {
    if value.is_rvalue() {
        return Ok(false);
    }

    match value.kind.clone() {
        ValueKind::Literal(literal) => {
            let (regs, mut em) = ctx.regs_emit();
            let reference = regs.find_or_insert_literal(literal, &mut em);
            value.rvalue = Some(reference);
            Ok(false)
        }
        ValueKind::Plain => {
            if let Some(id) = value.symbol() {
                let (regs, mut em) = ctx.regs_emit();
                let reference = regs.find_or_insert_symbol(id, &mut em);
                value.rvalue = Some(reference);
                return Ok(false);
            }
            if let Some(reference) = value.lvalue_ref() {
                // load through the reference
                let inner = value.type_id;
                let (regs, mut em) = ctx.regs_emit();
                let dest = regs.insert(Object::new(Value::of(inner)), &mut em);
                ctx.program.add(create::load(
                    dest.register(),
                    AsmArg::RegisterIndirect {
                        reg: reference.register(),
                        offset: 0,
                    },
                ));
                spoil(ctx, dest.register(), inner);
                value.rvalue = Some(dest);
                return Ok(false);
            }
            // zero-sized values have nothing to load
            Ok(false)
        }
        ValueKind::Contiguous { mut elements, .. } => {
            let elem_type = ctx
                .types
                .wrapped_inner(value.type_id)
                .expect("contiguous literal is not an array");
            let elem_size = ctx.types.size(elem_type);

            let (location, stored_into_target) = match target {
                Some(location) => (location.clone(), true),
                None => {
                    // reserve scratch space on the stack
                    let total = ctx.types.size(value.type_id);
                    ctx.stack.push(total, &mut ctx.program);
                    ctx.program
                        .current_mut()
                        .back_mut()
                        .set_comment(format!("array literal: {}", ctx.types.name(value.type_id)));
                    (StorageLocation::stack(ctx.stack.offset()), false)
                }
            };

            for (index, element) in elements.iter_mut().enumerate() {
                materialise(ctx, element, None, loc)?;
                if !element.is_rvalue() {
                    ctx.messages.add(Message::error(
                        loc.copy(),
                        "array literal element has no value".to_string(),
                    ));
                    return Err(Failed);
                }
                let (regs, mut em) = ctx.regs_emit();
                let coerced = regs.guarantee_datatype(element.reference(), elem_type, &mut em);
                let reg = coerced.register();
                let dest = ctx
                    .symbols
                    .resolve_location(&location, index as u64 * elem_size);
                ctx.program.add(create::store(reg, dest));
                ctx.regs.mark_free(coerced);
            }

            if !stored_into_target {
                // the canonical value of an array is its address
                let (regs, mut em) = ctx.regs_emit();
                let reference = regs.insert(Object::new(Value::of(value.type_id)), &mut em);
                let reg = reference.register();
                if let StorageLocation::Stack { frame_offset, .. } = location {
                    ctx.program.add(create::sub(
                        DataType::U64,
                        reg,
                        Register::Fp.index(),
                        AsmArg::imm(frame_offset),
                    ));
                }
                spoil(ctx, reg, value.type_id);
                value.rvalue = Some(reference);
            }
            Ok(stored_into_target)
        }
        ValueKind::SymbolRef { name, .. } => {
            ctx.messages.add(Message::error(
                loc.copy(),
                format!("unresolved symbol '{}'", name),
            ));
            Err(Failed)
        }
    }
}

/// The calling convention. See the emitted comments for the stack layout:
/// saved registers, then `$rpc`, then `$fp`, then the callee frame with
/// its arguments pushed in source order.
pub fn call_function(
    ctx: &mut Context,
    function: AsmArg,
    name: &str,
    signature: TypeId,
    args: &mut [Node],
    args_to_ignore: &HashSet<usize>,
    return_value: &mut Value,
    target: Option<&StorageLocation>,
) -> PhaseResult {
    let (params, ret_type) = match ctx.types.function_parts(signature) {
        Some((params, ret)) => (params.to_vec(), ret),
        None => {
            ctx.messages.add(Message::new(
                util::Level::Error,
                format!("'{}' is not callable", name),
            ));
            return Err(Failed);
        }
    };
    let ret_size = ctx.types.size(ret_type);
    let ret_by_ptr = ctx.types.reference_as_ptr(ret_type);

    // reserve a return buffer when the callee hands back a pointer and the
    // caller gave us nowhere to put the pointee
    let mut return_buffer = None;
    if ret_by_ptr && target.is_none() {
        ctx.stack.push(ret_size, &mut ctx.program);
        ctx.program
            .current_mut()
            .back_mut()
            .set_comment(format!("return buffer: {}", ctx.types.name(ret_type)));
        return_buffer = Some(ctx.stack.offset());
    }

    let start_offset = ctx.stack.offset();

    {
        let (regs, mut em) = ctx.regs_emit();
        regs.save_store(true, &mut em);
    }

    // save $rpc and $fp
    ctx.stack.push(8, &mut ctx.program);
    ctx.program.add(create::store(
        Register::Rpc.index(),
        AsmArg::reg_indirect(Register::Sp, 0),
    ));
    ctx.program
        .current_mut()
        .back_mut()
        .set_comment("save $rpc".to_string());

    ctx.stack.push(8, &mut ctx.program);
    ctx.program.add(create::store(
        Register::Fp.index(),
        AsmArg::reg_indirect(Register::Sp, 0),
    ));
    ctx.program
        .current_mut()
        .back_mut()
        .set_comment("save $fp".to_string());

    ctx.stack.push_frame(0, true, &mut ctx.program);

    // arguments, in source order
    for (i, arg) in args.iter_mut().enumerate() {
        arg.set_type_hint(params[i]);
        arg.generate_code(ctx)?;

        let arg_loc = arg.loc().clone();
        let value = arg
            .base_mut()
            .value
            .as_mut()
            .expect("argument was not processed");
        materialise(ctx, value, None, &arg_loc)?;
        let value = value.clone();

        if !value.is_rvalue() && ctx.types.size(value.type_id) != 0 {
            let type_name = ctx.types.name(value.type_id);
            ctx.messages.add(Message::error(
                arg_loc,
                format!("expected rvalue, got {}", type_name),
            ));
            return Err(Failed);
        }

        let bytes = ctx.types.size(value.type_id);
        if bytes == 0 || args_to_ignore.contains(&i) {
            continue;
        }

        ctx.stack.push(bytes, &mut ctx.program);
        ctx.program.current_mut().back_mut().set_comment(format!(
            "arg #{}: {}",
            i + 1,
            ctx.types.name(value.type_id)
        ));
        let slot_offset = ctx.stack.offset();

        if ctx.types.reference_as_ptr(value.type_id) {
            let type_name = ctx.types.name(value.type_id);
            mem_copy(
                ctx,
                value.reference(),
                CopyDest::FpOffset(slot_offset),
                bytes,
                &type_name,
            )?;
        } else {
            let (regs, mut em) = ctx.regs_emit();
            let coerced = regs.guarantee_datatype(value.reference(), params[i], &mut em);
            let reg = coerced.register();
            ctx.program.add(create::store(
                reg,
                AsmArg::reg_indirect(Register::Sp, 0),
            ));
        }
        ctx.regs.mark_free(value.reference());
    }

    // the call itself
    let mut call = create::jump_and_link(function);
    call.set_comment(format!("call {}: {}", name, ctx.types.name(signature)));
    ctx.program.add(call);

    return_value.rvalue = Some(Ref::reg(Register::Ret.index()));

    // unwind: frame, then $rpc/$fp, then cached registers
    ctx.stack.pop_frame(true, &mut ctx.program);

    let mut restore = create::load(Register::Rpc.index(), AsmArg::reg_indirect(Register::Sp, 8));
    restore.set_comment("restore $rpc".to_string());
    ctx.program.add(restore);

    let mut restore = create::load(Register::Fp.index(), AsmArg::reg_indirect(Register::Sp, 0));
    restore.set_comment("restore $fp".to_string());
    ctx.program.add(restore);

    {
        let (regs, mut em) = ctx.regs_emit();
        regs.destroy_store(true, &mut em);
    }

    ctx.regs.update_ret(Object::new(Value::rvalue_of(
        ret_type,
        Ref::reg(Register::Ret.index()),
    )));

    // net-clean the stack
    let delta = ctx.stack.offset() - start_offset;
    if delta != 0 {
        ctx.stack.pop(delta, &mut ctx.program);
        ctx.program
            .current_mut()
            .back_mut()
            .set_comment("stack clean-up".to_string());
    }

    // copy the returned pointee into the reserved buffer
    if let Some(buffer_offset) = return_buffer {
        mem_copy(
            ctx,
            Ref::reg(Register::Ret.index()),
            CopyDest::FpOffset(buffer_offset),
            ret_size,
            "copy return value into buffer",
        )?;
    }

    Ok(())
}
