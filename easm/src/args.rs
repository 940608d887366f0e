//! Instruction arguments and the slot-acceptance rules used during overload
//! matching.

use eisa::Register;
use std::fmt;

/// Slot types appearing in instruction signatures. `Value` is the wildcard
/// slot accepting most concrete argument forms; `Label` never appears in a
/// signature, only as a parsed placeholder.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArgumentType {
    Immediate,
    Byte,
    DecimalImmediate,
    Address,
    Register,
    RegisterIndirect,
    Value,
    Label,
}

impl ArgumentType {
    pub fn describe(self) -> &'static str {
        match self {
            ArgumentType::Immediate | ArgumentType::DecimalImmediate => "<imm>",
            ArgumentType::Byte => "<imm: 8>",
            ArgumentType::Address => "<addr>",
            ArgumentType::Label => "<addr: label>",
            ArgumentType::Value => "<value>",
            ArgumentType::Register => "<reg>",
            ArgumentType::RegisterIndirect => "<addr: reg>",
        }
    }
}

/// A parsed instruction argument. A `Label` is a placeholder which is
/// replaced by a concrete `Address`/`Immediate` exactly once, when the
/// label's address becomes known.
#[derive(Clone, Debug, PartialEq)]
pub enum Argument {
    /// 64-bit integer immediate (narrowed to 32 bits when encoded).
    Immediate(u64),
    /// Bit pattern of an `f64`; narrowed to `f32` unless the signature
    /// declares wide immediates.
    DecimalImmediate(u64),
    Byte(u8),
    /// Absolute address.
    Address(u64),
    /// Register index.
    Register(u8),
    RegisterIndirect {
        reg: u8,
        offset: i32,
    },
    Label {
        name: String,
        offset: i64,
        is_addr: bool,
    },
}

impl Argument {
    pub fn kind(&self) -> ArgumentType {
        match self {
            Argument::Immediate(_) => ArgumentType::Immediate,
            Argument::DecimalImmediate(_) => ArgumentType::DecimalImmediate,
            Argument::Byte(_) => ArgumentType::Byte,
            Argument::Address(_) => ArgumentType::Address,
            Argument::Register(_) => ArgumentType::Register,
            Argument::RegisterIndirect { .. } => ArgumentType::RegisterIndirect,
            Argument::Label { .. } => ArgumentType::Label,
        }
    }

    /// Whether a slot of type `slot` accepts this argument.
    pub fn matches_slot(&self, slot: ArgumentType) -> bool {
        let kind = self.kind();
        if kind == slot {
            return true;
        }

        match kind {
            ArgumentType::Address => slot == ArgumentType::Value,
            ArgumentType::Immediate => matches!(
                slot,
                ArgumentType::Value | ArgumentType::DecimalImmediate | ArgumentType::Byte
            ),
            ArgumentType::DecimalImmediate => slot == ArgumentType::Value,
            ArgumentType::Register => slot == ArgumentType::Value,
            ArgumentType::RegisterIndirect | ArgumentType::Label => {
                slot == ArgumentType::Address || slot == ArgumentType::Value
            }
            _ => false,
        }
    }

    pub fn is_label(&self) -> bool {
        matches!(self, Argument::Label { .. })
    }

    pub fn label_name(&self) -> Option<&str> {
        match self {
            Argument::Label { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Resolve a label placeholder in a slot of type `slot`. The slot type
    /// dominates: an `Address` slot always produces an Address argument;
    /// elsewhere the label's own address flag decides.
    pub fn resolve_label(&mut self, label: &str, address: u64, slot: ArgumentType) {
        if let Argument::Label {
            name,
            offset,
            is_addr,
        } = self
        {
            if name == label {
                let resolved = (address as i64 + *offset) as u64;
                *self = if slot == ArgumentType::Address || *is_addr {
                    Argument::Address(resolved)
                } else {
                    Argument::Immediate(resolved)
                };
            }
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Argument::Immediate(value) => write!(f, "0x{:x}", value),
            Argument::Byte(value) => write!(f, "0x{:x}", value),
            Argument::DecimalImmediate(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Argument::Address(addr) => write!(f, "(0x{:x})", addr),
            Argument::Register(reg) => write!(f, "${}", Register::name(*reg)),
            Argument::RegisterIndirect { reg, offset } => {
                write!(f, "{}(${})", offset, Register::name(*reg))
            }
            Argument::Label {
                name,
                offset,
                is_addr,
            } => {
                if *is_addr {
                    write!(f, "(")?;
                }
                write!(f, "{}", name)?;
                if *offset != 0 {
                    write!(f, "{:+}", offset)?;
                }
                if *is_addr {
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn value_slot_accepts_most_forms() {
        let args = [
            Argument::Immediate(1),
            Argument::DecimalImmediate(0),
            Argument::Address(4),
            Argument::Register(13),
            Argument::RegisterIndirect { reg: 2, offset: 0 },
            Argument::Label {
                name: "x".into(),
                offset: 0,
                is_addr: false,
            },
        ];
        for arg in &args {
            assert!(arg.matches_slot(ArgumentType::Value), "{:?}", arg);
        }
        assert!(!Argument::Byte(0).matches_slot(ArgumentType::Value));
    }

    #[test]
    fn address_slot_accepts_label_and_indirect() {
        assert!(Argument::Label {
            name: "x".into(),
            offset: 0,
            is_addr: false
        }
        .matches_slot(ArgumentType::Address));
        assert!(Argument::RegisterIndirect { reg: 2, offset: 4 }.matches_slot(ArgumentType::Address));
        assert!(!Argument::Immediate(1).matches_slot(ArgumentType::Address));
        assert!(!Argument::Register(13).matches_slot(ArgumentType::Address));
    }

    #[test]
    fn label_resolution_respects_slot_type() {
        let mut arg = Argument::Label {
            name: "x".into(),
            offset: 8,
            is_addr: false,
        };
        let mut copy = arg.clone();

        arg.resolve_label("x", 0x20, ArgumentType::Address);
        assert_eq!(arg, Argument::Address(0x28));

        copy.resolve_label("x", 0x20, ArgumentType::Value);
        assert_eq!(copy, Argument::Immediate(0x28));
    }
}
