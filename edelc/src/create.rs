//! Construction helpers for emitted instructions, one per mnemonic family.
//! Two-register ALU forms collapse to the two-argument spelling when both
//! registers coincide.

use crate::assembly::{AsmArg, Line};
use eisa::{ConditionFlag, DataType, Register};

fn reg_value(mnemonic: &str, reg: u8, value: AsmArg) -> Line {
    Line::instruction(mnemonic)
        .with_arg(AsmArg::reg(reg))
        .with_arg(value)
}

fn reg_reg_value(mnemonic: &str, dst: u8, src: u8, value: AsmArg) -> Line {
    let line = Line::instruction(mnemonic).with_arg(AsmArg::reg(dst));
    let line = if dst != src {
        line.with_arg(AsmArg::reg(src))
    } else {
        line
    };
    line.with_arg(value)
}

pub fn add(dt: DataType, dst: u8, src: u8, value: AsmArg) -> Line {
    reg_reg_value("add", dst, src, value).with_datatype(dt)
}

pub fn sub(dt: DataType, dst: u8, src: u8, value: AsmArg) -> Line {
    reg_reg_value("sub", dst, src, value).with_datatype(dt)
}

pub fn mul(dt: DataType, dst: u8, src: u8, value: AsmArg) -> Line {
    reg_reg_value("mul", dst, src, value).with_datatype(dt)
}

pub fn div(dt: DataType, dst: u8, src: u8, value: AsmArg) -> Line {
    reg_reg_value("div", dst, src, value).with_datatype(dt)
}

pub fn modulo(dst: u8, src: u8, value: AsmArg) -> Line {
    reg_reg_value("mod", dst, src, value)
}

pub fn and(dst: u8, src: u8, value: AsmArg) -> Line {
    reg_reg_value("and", dst, src, value)
}

pub fn or(dst: u8, src: u8, value: AsmArg) -> Line {
    reg_reg_value("or", dst, src, value)
}

pub fn xor(dst: u8, src: u8, value: AsmArg) -> Line {
    reg_reg_value("xor", dst, src, value)
}

pub fn shift_left(dst: u8, src: u8, value: AsmArg) -> Line {
    reg_reg_value("shl", dst, src, value)
}

pub fn shift_right(dst: u8, src: u8, value: AsmArg) -> Line {
    reg_reg_value("shr", dst, src, value)
}

pub fn not(dst: u8, src: u8) -> Line {
    Line::instruction("not")
        .with_arg(AsmArg::reg(dst))
        .with_arg(AsmArg::reg(src))
}

pub fn load(reg: u8, value: AsmArg) -> Line {
    reg_value("load", reg, value)
}

/// Load a 64-bit immediate; the assembler splits this into `load`/`loadu`.
pub fn load_long(reg: u8, imm: u64) -> Line {
    reg_value("loadw", reg, AsmArg::imm(imm))
}

pub fn store(reg: u8, address: AsmArg) -> Line {
    reg_value("store", reg, address)
}

/// Load `bytes` bytes and clear the remainder of the register.
pub fn load_sized(reg: u8, value: AsmArg, bytes: u64, is_signed: bool) -> Vec<Line> {
    let mut lines = vec![load(reg, value)];
    if bytes < 8 {
        lines.push(extend(
            is_signed,
            reg,
            AsmArg::reg(reg),
            (8 - bytes) as u32 * 8,
        ));
    }
    lines
}

pub fn extend(is_signed: bool, dst: u8, value: AsmArg, bits: u32) -> Line {
    Line::instruction(if is_signed { "sext" } else { "zext" })
        .with_arg(AsmArg::reg(dst))
        .with_arg(value)
        .with_arg(AsmArg::imm(u64::from(bits)))
}

pub fn comparison(dt: DataType, lhs: u8, value: AsmArg) -> Line {
    reg_value("cmp", lhs, value).with_datatype(dt)
}

pub fn conversion(from: DataType, from_reg: u8, to: DataType, to_reg: u8) -> Line {
    Line::instruction("cvt")
        .with_datatype(from)
        .with_datatype(to)
        .with_arg(AsmArg::reg(to_reg))
        .with_arg(AsmArg::reg(from_reg))
}

pub fn branch(to: AsmArg) -> Line {
    Line::instruction("jmp").with_arg(to)
}

pub fn branch_if(guard: ConditionFlag, to: AsmArg) -> Line {
    Line::instruction("b").with_cond(guard).with_arg(to)
}

pub fn jump_and_link(target: AsmArg) -> Line {
    Line::instruction("jal").with_arg(target)
}

pub fn system_call(value: AsmArg) -> Line {
    Line::instruction("syscall").with_arg(value)
}

pub fn ret() -> Line {
    Line::instruction("ret")
}

pub fn ret_value(value: AsmArg) -> Line {
    Line::instruction("ret").with_arg(value)
}

pub fn exit() -> Line {
    Line::instruction("exit")
}

pub fn zero(reg: u8) -> Line {
    Line::instruction("zero").with_arg(AsmArg::reg(reg))
}

/// Grow the stack: `sub $sp, bytes`.
pub fn stack_push(bytes: u64) -> Line {
    Line::instruction("sub")
        .with_arg(AsmArg::reg(Register::Sp.index()))
        .with_arg(AsmArg::imm(bytes))
}

/// Shrink the stack: `add $sp, bytes`.
pub fn stack_pop(bytes: u64) -> Line {
    Line::instruction("add")
        .with_arg(AsmArg::reg(Register::Sp.index()))
        .with_arg(AsmArg::imm(bytes))
}
