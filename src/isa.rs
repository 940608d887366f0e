use num_traits::ToPrimitive;
use util::EnumVariantNames;
use util_derive::{EnumFromStr, EnumVariantNames};

// Opcodes
//
//  Mnemonic | Effect
// ----------+----------------------------------------------------------
//  nop      | Does nothing
//  load     | dst = value (lower word for 32-bit immediates)
//  loadu    | dst[32..] = value
//  store    | MEM[addr] = reg
//  push     | MEM[$sp] = value; $sp -= 8
//  call     | $rpc = $ip; $ip = addr
//  ret      | $ip = $rpc, optionally $ret = value
//  jal      | $rpc = $ip; $ip = value
//  syscall  | invoke system function <value>
//  cmp      | set $flag comparison bits from (reg - value)
//  cvt      | convert register between datatypes
//  sext     | sign-extend: dst = value extended by <imm> bits
//  zext     | zero-extend: dst = value extended by <imm> bits
//  not..mod | ALU, dst = op(lhs, rhs)

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr, EnumVariantNames,
)]
pub enum Opcode {
    Nop = 0x00,
    Load = 0x01,
    Loadu = 0x02,
    Store = 0x03,
    Push = 0x04,
    Call = 0x05,
    Ret = 0x06,
    Jal = 0x07,
    Syscall = 0x08,
    Cmp = 0x09,
    Cvt = 0x0a,
    Sext = 0x0b,
    Zext = 0x0c,
    Not = 0x0d,
    And = 0x0e,
    Or = 0x0f,
    Xor = 0x10,
    Shl = 0x11,
    Shr = 0x12,
    Add = 0x13,
    Sub = 0x14,
    Mul = 0x15,
    Div = 0x16,
    Mod = 0x17,
}

impl Opcode {
    pub fn code(self) -> u8 {
        self.to_u8().unwrap()
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.variant_name())
    }
}

/// Conditional-test flags, 4 bits in the encoding. `None` is the sentinel
/// written when a signature expects a test but the suffix was omitted.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive)]
pub enum ConditionFlag {
    None = 0x0,
    Z = 0x1,
    Nz = 0x2,
    Eq = 0x3,
    Ne = 0x4,
    Lt = 0x5,
    Le = 0x6,
    Gt = 0x7,
    Ge = 0x8,
}

/// Suffix spellings in longest-first order, so prefix extraction never
/// stops at `ne` when the source says `neq`.
const CONDITION_SUFFIXES: [(&str, ConditionFlag); 11] = [
    ("neq", ConditionFlag::Ne),
    ("lte", ConditionFlag::Le),
    ("gte", ConditionFlag::Ge),
    ("nz", ConditionFlag::Nz),
    ("eq", ConditionFlag::Eq),
    ("ne", ConditionFlag::Ne),
    ("lt", ConditionFlag::Lt),
    ("le", ConditionFlag::Le),
    ("gt", ConditionFlag::Gt),
    ("ge", ConditionFlag::Ge),
    ("z", ConditionFlag::Z),
];

impl ConditionFlag {
    pub fn bits(self) -> u8 {
        self.to_u8().unwrap()
    }

    /// Match a conditional suffix at the start of `s`; returns the flag and
    /// the number of characters consumed.
    pub fn from_prefix(s: &str) -> Option<(ConditionFlag, usize)> {
        CONDITION_SUFFIXES
            .iter()
            .find(|(text, _)| s.starts_with(text))
            .map(|(text, flag)| (*flag, text.len()))
    }

    /// Parse a whole suffix string; fails on trailing characters.
    pub fn from_suffix(s: &str) -> Option<ConditionFlag> {
        match ConditionFlag::from_prefix(s) {
            Some((flag, len)) if len == s.len() => Some(flag),
            _ => None,
        }
    }

    /// The logical inverse, used when a guard falls through to its false
    /// branch.
    pub fn inverse(self) -> ConditionFlag {
        match self {
            ConditionFlag::None => ConditionFlag::None,
            ConditionFlag::Z => ConditionFlag::Nz,
            ConditionFlag::Nz => ConditionFlag::Z,
            ConditionFlag::Eq => ConditionFlag::Ne,
            ConditionFlag::Ne => ConditionFlag::Eq,
            ConditionFlag::Lt => ConditionFlag::Ge,
            ConditionFlag::Ge => ConditionFlag::Lt,
            ConditionFlag::Le => ConditionFlag::Gt,
            ConditionFlag::Gt => ConditionFlag::Le,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            ConditionFlag::None => "",
            ConditionFlag::Z => "z",
            ConditionFlag::Nz => "nz",
            ConditionFlag::Eq => "eq",
            ConditionFlag::Ne => "ne",
            ConditionFlag::Lt => "lt",
            ConditionFlag::Le => "le",
            ConditionFlag::Gt => "gt",
            ConditionFlag::Ge => "ge",
        }
    }
}

impl std::fmt::Display for ConditionFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// Operand datatype codes, 3 bits in the encoding. `U64` doubles as the
/// default written when a datatype is expected but not spelled out.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive)]
pub enum DataType {
    U64 = 0x0,
    U32 = 0x1,
    S32 = 0x2,
    S64 = 0x3,
    F32 = 0x4,
    F64 = 0x5,
}

const DATATYPE_SUFFIXES: [(&str, DataType); 6] = [
    ("hu", DataType::U32),
    ("hi", DataType::S32),
    ("u", DataType::U64),
    ("i", DataType::S64),
    ("f", DataType::F32),
    ("d", DataType::F64),
];

impl DataType {
    pub fn bits(self) -> u8 {
        self.to_u8().unwrap()
    }

    /// Match a datatype suffix at the start of `s`; returns the datatype
    /// and the number of characters consumed. Used by the `cvt` parser
    /// which reads two suffixes separated by `2`.
    pub fn from_prefix(s: &str) -> Option<(DataType, usize)> {
        DATATYPE_SUFFIXES
            .iter()
            .find(|(text, _)| s.starts_with(text))
            .map(|(text, dt)| (*dt, text.len()))
    }

    pub fn from_suffix(s: &str) -> Option<DataType> {
        match DataType::from_prefix(s) {
            Some((dt, len)) if len == s.len() => Some(dt),
            _ => None,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            DataType::U64 => "u",
            DataType::U32 => "hu",
            DataType::S32 => "hi",
            DataType::S64 => "i",
            DataType::F32 => "f",
            DataType::F64 => "d",
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, DataType::S32 | DataType::S64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// System call numbers, passed as the `syscall` operand.
#[derive(
    Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr, EnumVariantNames,
)]
pub enum Syscall {
    Exit = 0x0,
    PrintChar = 0x1,
    PrintInt = 0x2,
    PrintFloat = 0x3,
    ReadChar = 0x4,
    ReadInt = 0x5,
    CopyMem = 0x6,
}

impl Syscall {
    pub fn code(self) -> u64 {
        self.to_u64().unwrap()
    }
}

impl std::fmt::Display for Syscall {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.variant_name())
    }
}
