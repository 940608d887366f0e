//! The instruction model: signatures, overload matching, pseudo-instruction
//! expansion and the bit-exact encoder.
//!
//! A [`Signature`](struct.Signature.html) describes one mnemonic: its
//! opcode, whether it accepts conditional-test and datatype suffixes, the
//! accepted argument shapes (overloads), and two optional hooks. The
//! `parse` hook consumes extra option characters (only `cvt` uses it); the
//! `intercept` hook may rewrite a parsed instruction into several
//! lower-level instructions (`exit`, `loadw`, `b`, ...).

use crate::args::{Argument, ArgumentType};
use eisa::constants::FLAG_IN_INTERRUPT;
use eisa::{ConditionFlag, DataType, InstructionBuilder, Opcode, Register, Syscall};
use std::fmt;
use util::{Failed, Location, Message, MessageList, PhaseResult};

/// Rewrites a matched instruction into zero or more output instructions.
pub type Intercept = fn(Instruction, &mut Vec<Instruction>);

/// Consumes custom option characters after the mnemonic, before the
/// conditional/datatype suffixes are parsed.
pub type CustomParser =
    fn(&mut Instruction, &mut String, &Location, &mut MessageList) -> PhaseResult;

pub struct Signature {
    pub mnemonic: &'static str,
    pub opcode: Opcode,
    pub expect_test: bool,
    pub expect_datatype: bool,
    pub overloads: &'static [&'static [ArgumentType]],
    /// Immediates keep all 64 bits until an intercept splits them.
    pub wide_immediates: bool,
    pub parse: Option<CustomParser>,
    pub intercept: Option<Intercept>,
}

const NO_ARGS: &[ArgumentType] = &[];
const VAL: &[ArgumentType] = &[ArgumentType::Value];
const REG: &[ArgumentType] = &[ArgumentType::Register];
const ADDR: &[ArgumentType] = &[ArgumentType::Address];
const REG_VAL: &[ArgumentType] = &[ArgumentType::Register, ArgumentType::Value];
const REG_REG: &[ArgumentType] = &[ArgumentType::Register, ArgumentType::Register];
const REG_REG_VAL: &[ArgumentType] = &[
    ArgumentType::Register,
    ArgumentType::Register,
    ArgumentType::Value,
];
const REG_ADDR: &[ArgumentType] = &[ArgumentType::Register, ArgumentType::Address];
const REG_VAL_BYTE: &[ArgumentType] = &[
    ArgumentType::Register,
    ArgumentType::Value,
    ArgumentType::Byte,
];

/// The signature table. Lookup takes the first entry whose mnemonic is a
/// prefix of the parsed token, so longer names are listed before the names
/// they extend (`loadw` before `loadu` before `load`, `pushw` before
/// `push`, `nop` before `not`).
pub static SIGNATURES: &[Signature] = &[
    Signature {
        mnemonic: "add",
        opcode: Opcode::Add,
        expect_test: true,
        expect_datatype: true,
        overloads: &[REG_VAL, REG_REG_VAL],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::duplicate_reg),
    },
    Signature {
        mnemonic: "and",
        opcode: Opcode::And,
        expect_test: true,
        expect_datatype: false,
        overloads: &[REG_VAL, REG_REG_VAL],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::duplicate_reg),
    },
    Signature {
        mnemonic: "call",
        opcode: Opcode::Call,
        expect_test: true,
        expect_datatype: false,
        overloads: &[ADDR],
        wide_immediates: false,
        parse: None,
        intercept: None,
    },
    Signature {
        mnemonic: "cmp",
        opcode: Opcode::Cmp,
        expect_test: true,
        expect_datatype: true,
        overloads: &[REG_VAL, REG_REG_VAL],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::duplicate_reg),
    },
    Signature {
        mnemonic: "cvt",
        opcode: Opcode::Cvt,
        expect_test: false,
        expect_datatype: false,
        overloads: &[REG_REG, REG],
        wide_immediates: false,
        parse: Some(parse::convert),
        intercept: Some(intercept::duplicate_reg_unary),
    },
    Signature {
        mnemonic: "div",
        opcode: Opcode::Div,
        expect_test: true,
        expect_datatype: true,
        overloads: &[REG_VAL, REG_REG_VAL],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::duplicate_reg),
    },
    Signature {
        mnemonic: "exit",
        opcode: Opcode::Nop,
        expect_test: true,
        expect_datatype: false,
        overloads: &[NO_ARGS, VAL],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::exit),
    },
    Signature {
        mnemonic: "int",
        opcode: Opcode::Nop,
        expect_test: true,
        expect_datatype: false,
        overloads: &[VAL],
        wide_immediates: true,
        parse: None,
        intercept: Some(intercept::interrupt),
    },
    Signature {
        mnemonic: "jal",
        opcode: Opcode::Jal,
        expect_test: true,
        expect_datatype: false,
        overloads: &[VAL],
        wide_immediates: false,
        parse: None,
        intercept: None,
    },
    Signature {
        mnemonic: "jmp",
        opcode: Opcode::Nop,
        expect_test: false,
        expect_datatype: false,
        overloads: &[VAL],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::branch),
    },
    Signature {
        mnemonic: "loadw",
        opcode: Opcode::Nop,
        expect_test: true,
        expect_datatype: false,
        overloads: &[REG_VAL],
        wide_immediates: true,
        parse: None,
        intercept: Some(intercept::loadw),
    },
    Signature {
        mnemonic: "loadu",
        opcode: Opcode::Loadu,
        expect_test: true,
        expect_datatype: false,
        overloads: &[REG_VAL],
        wide_immediates: false,
        parse: None,
        intercept: None,
    },
    Signature {
        mnemonic: "load",
        opcode: Opcode::Load,
        expect_test: true,
        expect_datatype: false,
        overloads: &[REG_VAL],
        wide_immediates: false,
        parse: None,
        intercept: None,
    },
    Signature {
        mnemonic: "mod",
        opcode: Opcode::Mod,
        expect_test: true,
        expect_datatype: false,
        overloads: &[REG_VAL, REG_REG_VAL],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::duplicate_reg),
    },
    Signature {
        mnemonic: "mul",
        opcode: Opcode::Mul,
        expect_test: true,
        expect_datatype: true,
        overloads: &[REG_VAL, REG_REG_VAL],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::duplicate_reg),
    },
    Signature {
        mnemonic: "nop",
        opcode: Opcode::Nop,
        expect_test: false,
        expect_datatype: false,
        overloads: &[NO_ARGS],
        wide_immediates: false,
        parse: None,
        intercept: None,
    },
    Signature {
        mnemonic: "not",
        opcode: Opcode::Not,
        expect_test: true,
        expect_datatype: false,
        overloads: &[REG, REG_REG],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::duplicate_reg_unary),
    },
    Signature {
        mnemonic: "or",
        opcode: Opcode::Or,
        expect_test: true,
        expect_datatype: false,
        overloads: &[REG_VAL, REG_REG_VAL],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::duplicate_reg),
    },
    Signature {
        mnemonic: "pushw",
        opcode: Opcode::Nop,
        expect_test: true,
        expect_datatype: false,
        overloads: &[VAL],
        wide_immediates: true,
        parse: None,
        intercept: Some(intercept::pushw),
    },
    Signature {
        mnemonic: "push",
        opcode: Opcode::Push,
        expect_test: true,
        expect_datatype: false,
        overloads: &[VAL],
        wide_immediates: false,
        parse: None,
        intercept: None,
    },
    Signature {
        mnemonic: "ret",
        opcode: Opcode::Ret,
        expect_test: true,
        expect_datatype: false,
        overloads: &[NO_ARGS, VAL],
        wide_immediates: false,
        parse: None,
        intercept: None,
    },
    Signature {
        mnemonic: "rti",
        opcode: Opcode::Nop,
        expect_test: false,
        expect_datatype: false,
        overloads: &[NO_ARGS],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::interrupt_return),
    },
    Signature {
        mnemonic: "sext",
        opcode: Opcode::Sext,
        expect_test: true,
        expect_datatype: false,
        overloads: &[REG_VAL_BYTE],
        wide_immediates: false,
        parse: None,
        intercept: None,
    },
    Signature {
        mnemonic: "shl",
        opcode: Opcode::Shl,
        expect_test: true,
        expect_datatype: false,
        overloads: &[REG_VAL, REG_REG_VAL],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::duplicate_reg),
    },
    Signature {
        mnemonic: "shr",
        opcode: Opcode::Shr,
        expect_test: true,
        expect_datatype: false,
        overloads: &[REG_VAL, REG_REG_VAL],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::duplicate_reg),
    },
    Signature {
        mnemonic: "store",
        opcode: Opcode::Store,
        expect_test: true,
        expect_datatype: false,
        overloads: &[REG_ADDR],
        wide_immediates: false,
        parse: None,
        intercept: None,
    },
    Signature {
        mnemonic: "sub",
        opcode: Opcode::Sub,
        expect_test: true,
        expect_datatype: true,
        overloads: &[REG_VAL, REG_REG_VAL],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::duplicate_reg),
    },
    Signature {
        mnemonic: "syscall",
        opcode: Opcode::Syscall,
        expect_test: true,
        expect_datatype: false,
        overloads: &[VAL],
        wide_immediates: false,
        parse: None,
        intercept: None,
    },
    Signature {
        mnemonic: "xor",
        opcode: Opcode::Xor,
        expect_test: true,
        expect_datatype: false,
        overloads: &[REG_VAL, REG_REG_VAL],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::duplicate_reg),
    },
    Signature {
        mnemonic: "zero",
        opcode: Opcode::Nop,
        expect_test: true,
        expect_datatype: false,
        overloads: &[REG],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::zero),
    },
    Signature {
        mnemonic: "zext",
        opcode: Opcode::Zext,
        expect_test: true,
        expect_datatype: false,
        overloads: &[REG_VAL_BYTE],
        wide_immediates: false,
        parse: None,
        intercept: None,
    },
    Signature {
        mnemonic: "b",
        opcode: Opcode::Nop,
        expect_test: true,
        expect_datatype: false,
        overloads: &[VAL],
        wide_immediates: false,
        parse: None,
        intercept: Some(intercept::branch),
    },
];

/// Look up the signature whose mnemonic prefixes `token`; the remainder of
/// the token is the option string (conditional test and datatype suffixes).
pub fn find_signature(token: &str) -> Option<(&'static Signature, String)> {
    SIGNATURES
        .iter()
        .find(|sig| token.starts_with(sig.mnemonic))
        .map(|sig| (sig, token[sig.mnemonic.len()..].to_string()))
}

/// Look up a signature by its exact mnemonic. Panics on unknown names, so
/// only used with table-known mnemonics from intercepts.
pub fn signature(mnemonic: &str) -> &'static Signature {
    SIGNATURES
        .iter()
        .find(|sig| sig.mnemonic == mnemonic)
        .unwrap_or_else(|| panic!("unknown signature {}", mnemonic))
}

/// A parsed instruction bound to a signature and a matched overload.
#[derive(Clone)]
pub struct Instruction {
    pub signature: &'static Signature,
    pub overload: usize,
    pub args: Vec<Argument>,
    pub test: Option<ConditionFlag>,
    pub datatypes: Vec<DataType>,
}

impl Instruction {
    pub fn new(signature: &'static Signature, args: Vec<Argument>) -> Instruction {
        Instruction {
            signature,
            overload: 0,
            args,
            test: None,
            datatypes: Vec::new(),
        }
    }

    pub fn set_conditional_test(&mut self, flag: ConditionFlag) {
        self.test = Some(flag);
    }

    pub fn add_datatype(&mut self, dt: DataType) {
        self.datatypes.push(dt);
    }

    fn slots(&self) -> &'static [ArgumentType] {
        self.signature.overloads[self.overload]
    }

    /// Names of labels still unresolved in this instruction.
    pub fn referenced_labels(&self) -> Vec<String> {
        self.args
            .iter()
            .filter_map(|arg| arg.label_name().map(str::to_string))
            .collect()
    }

    pub fn first_label(&self) -> Option<&str> {
        self.args.iter().find_map(|arg| arg.label_name())
    }

    /// Replace every reference to `label` with its resolved address. The
    /// matched slot's type decides between Address and Immediate.
    pub fn replace_label(&mut self, label: &str, address: u64) {
        let slots = self.slots();
        for (i, arg) in self.args.iter_mut().enumerate() {
            let slot = slots.get(i).copied().unwrap_or(ArgumentType::Value);
            arg.resolve_label(label, address, slot);
        }
    }

    /// Pack into the 64-bit instruction word.
    pub fn compile(&self) -> u64 {
        let mut builder = InstructionBuilder::new();
        builder.opcode(self.signature.opcode.code());

        if self.signature.expect_test {
            match self.test {
                Some(flag) => builder.conditional_test(flag),
                None => builder.no_conditional_test(),
            }
        }

        for dt in &self.datatypes {
            builder.data_type(*dt);
        }
        if self.signature.expect_datatype && self.datatypes.is_empty() {
            builder.default_data_type();
        }

        let slots = self.slots();
        for (i, arg) in self.args.iter().enumerate() {
            let slot = slots.get(i).copied().unwrap_or(ArgumentType::Value);
            match slot {
                ArgumentType::Address => builder.next_as_address(),
                ArgumentType::Value => builder.next_as_value(),
                _ => {}
            }

            match arg {
                Argument::Address(addr) => builder.arg_addr(*addr as u32),
                Argument::Byte(value) => builder.arg_byte(*value),
                Argument::Immediate(value) => {
                    if slot == ArgumentType::Byte {
                        builder.arg_byte(*value as u8);
                    } else {
                        builder.arg_imm(*value as u32);
                    }
                }
                Argument::DecimalImmediate(bits) => {
                    if self.signature.wide_immediates {
                        builder.arg_imm(*bits as u32);
                    } else {
                        let narrowed = f64::from_bits(*bits) as f32;
                        builder.arg_imm(narrowed.to_bits());
                    }
                }
                Argument::Register(reg) => builder.arg_reg(*reg),
                Argument::RegisterIndirect { reg, offset } => {
                    builder.arg_reg_indirect(*reg, *offset as i16)
                }
                Argument::Label { .. } => {
                    debug_assert!(false, "label must be resolved before encoding");
                }
            }
        }

        builder.get()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.signature.mnemonic)?;

        if let Some(flag) = self.test {
            write!(f, "{}", flag.suffix())?;
        }

        if self.signature.mnemonic == "cvt" && self.datatypes.len() == 2 {
            write!(f, "{}2{}", self.datatypes[0], self.datatypes[1])?;
        } else {
            for dt in &self.datatypes {
                write!(f, ".{}", dt)?;
            }
        }

        for (i, arg) in self.args.iter().enumerate() {
            if i == 0 {
                write!(f, " {}", arg)?;
            } else {
                write!(f, ", {}", arg)?;
            }
        }
        Ok(())
    }
}

mod parse {
    use super::*;

    /// `cvt` options are `<dt>2<dt>` with no dot separator.
    pub fn convert(
        instruction: &mut Instruction,
        options: &mut String,
        loc: &Location,
        messages: &mut MessageList,
    ) -> PhaseResult {
        for i in 0..2 {
            let (dt, len) = match DataType::from_prefix(options) {
                Some(found) => found,
                None => {
                    messages.add(Message::error(
                        loc.copy(),
                        "cvt: expected datatype. Syntax: cvt(d1)2(d2)".to_string(),
                    ));
                    return Err(Failed);
                }
            };
            instruction.add_datatype(dt);
            options.drain(..len);

            if i == 0 {
                if options.starts_with('2') {
                    options.drain(..1);
                } else {
                    let got = options.chars().next().map_or("eol".to_string(), |c| {
                        format!("'{}'", c)
                    });
                    messages.add(Message::error(
                        loc.copy(),
                        format!("cvt: expected '2' after first datatype, got {}", got),
                    ));
                    return Err(Failed);
                }
            }
        }
        Ok(())
    }
}

mod intercept {
    use super::*;

    fn retarget_overload(instruction: &mut Instruction) {
        if let Some(index) = instruction
            .signature
            .overloads
            .iter()
            .position(|slots| slots.len() == instruction.args.len())
        {
            instruction.overload = index;
        }
    }

    /// Two-argument arithmetic duplicates the destination register:
    /// `add $r1, 5` becomes `add $r1, $r1, 5`.
    pub fn duplicate_reg(mut instruction: Instruction, out: &mut Vec<Instruction>) {
        if instruction.args.len() == 2 {
            let dst = instruction.args[0].clone();
            instruction.args.insert(0, dst);
            retarget_overload(&mut instruction);
        }
        out.push(instruction);
    }

    /// One-argument unary forms duplicate the sole register:
    /// `not $r1` becomes `not $r1, $r1`.
    pub fn duplicate_reg_unary(mut instruction: Instruction, out: &mut Vec<Instruction>) {
        if instruction.args.len() == 1 {
            let dst = instruction.args[0].clone();
            instruction.args.push(dst);
            retarget_overload(&mut instruction);
        }
        out.push(instruction);
    }

    /// `b <target>` / `jmp <target>` load the target into `$ip`.
    pub fn branch(mut instruction: Instruction, out: &mut Vec<Instruction>) {
        instruction.signature = signature("load");
        instruction
            .args
            .insert(0, Argument::Register(Register::Ip.index()));
        instruction.overload = 0;
        out.push(instruction);
    }

    /// `exit [code]` loads the code into `$ret` and issues the exit
    /// syscall.
    pub fn exit(mut instruction: Instruction, out: &mut Vec<Instruction>) {
        let code = if instruction.overload == 1 {
            instruction.args.pop()
        } else {
            None
        };

        if let Some(code) = code {
            let mut load = instruction.clone();
            load.signature = signature("load");
            load.overload = 0;
            load.args = vec![Argument::Register(Register::Ret.index()), code];
            out.push(load);
        }

        instruction.signature = signature("syscall");
        instruction.overload = 0;
        instruction.args = vec![Argument::Immediate(Syscall::Exit.code())];
        out.push(instruction);
    }

    /// `loadw $r, imm` splits a 64-bit immediate into `load` + `loadu`.
    pub fn loadw(mut instruction: Instruction, out: &mut Vec<Instruction>) {
        let bits = match instruction.args.get(1) {
            Some(Argument::Immediate(v)) => Some(*v),
            Some(Argument::DecimalImmediate(v)) => Some(*v),
            _ => None,
        };

        match bits {
            Some(bits) => {
                let mut low = instruction.clone();
                low.signature = signature("load");
                low.overload = 0;
                low.args[1] = Argument::Immediate(bits & 0xffff_ffff);
                out.push(low);

                instruction.signature = signature("loadu");
                instruction.overload = 0;
                instruction.args[1] = Argument::Immediate(bits >> 32);
                out.push(instruction);
            }
            None => {
                // not an immediate, a plain load carries the full register
                instruction.signature = signature("load");
                instruction.overload = 0;
                out.push(instruction);
            }
        }
    }

    /// `pushw imm` pushes the two 32-bit halves.
    pub fn pushw(mut instruction: Instruction, out: &mut Vec<Instruction>) {
        let bits = match instruction.args.get(0) {
            Some(Argument::Immediate(v)) => Some(*v),
            Some(Argument::DecimalImmediate(v)) => Some(*v),
            _ => None,
        };

        instruction.signature = signature("push");
        instruction.overload = 0;

        match bits {
            Some(bits) => {
                let mut low = instruction.clone();
                low.args[0] = Argument::Immediate(bits & 0xffff_ffff);
                out.push(low);

                instruction.args[0] = Argument::Immediate(bits >> 32);
                out.push(instruction);
            }
            None => out.push(instruction),
        }
    }

    /// `zero $r` is `load $r, 0`.
    pub fn zero(mut instruction: Instruction, out: &mut Vec<Instruction>) {
        instruction.signature = signature("load");
        instruction.overload = 0;
        instruction.args.push(Argument::Immediate(0));
        out.push(instruction);
    }

    /// `int v` merges the mask into `$isr` via the kernel scratch register.
    pub fn interrupt(mut instruction: Instruction, out: &mut Vec<Instruction>) {
        let k1 = Register::K1.index();
        let isr = Register::Isr.index();

        let bits = match instruction.args.get(0) {
            Some(Argument::Immediate(v)) => Some(*v),
            _ => None,
        };

        match bits {
            Some(bits) => {
                let mut low = instruction.clone();
                low.signature = signature("load");
                low.overload = 0;
                low.args = vec![Argument::Register(k1), Argument::Immediate(bits & 0xffff_ffff)];
                out.push(low);

                let mut high = instruction.clone();
                high.signature = signature("loadu");
                high.overload = 0;
                high.args = vec![Argument::Register(k1), Argument::Immediate(bits >> 32)];
                out.push(high);
            }
            None => {
                let mut load = instruction.clone();
                load.signature = signature("load");
                load.overload = 0;
                let value = instruction.args[0].clone();
                load.args = vec![Argument::Register(k1), value];
                out.push(load);
            }
        }

        instruction.signature = signature("or");
        instruction.overload = 1;
        instruction.args = vec![
            Argument::Register(isr),
            Argument::Register(isr),
            Argument::Register(k1),
        ];
        out.push(instruction);
    }

    /// `rti` restores `$ip` and clears the in-interrupt flag.
    pub fn interrupt_return(instruction: Instruction, out: &mut Vec<Instruction>) {
        let mut restore = instruction.clone();
        restore.signature = signature("load");
        restore.overload = 0;
        restore.args = vec![
            Argument::Register(Register::Ip.index()),
            Argument::Register(Register::Iip.index()),
        ];
        out.push(restore);

        let mut clear = instruction;
        clear.signature = signature("xor");
        clear.overload = 1;
        clear.args = vec![
            Argument::Register(Register::Flag.index()),
            Argument::Register(Register::Flag.index()),
            Argument::Immediate(FLAG_IN_INTERRUPT),
        ];
        out.push(clear);
    }
}
