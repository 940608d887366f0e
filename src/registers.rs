use num_traits::{FromPrimitive, ToPrimitive};
use util::{EnumFromStr, EnumVariantNames};
use util_derive::{EnumFromStr, EnumVariantNames};

// Register file
//
//  Index | Name  | Purpose
// -------+-------+--------------------------------------------------------
//      0 | $ip   | Instruction pointer
//      1 | $rpc  | Return program counter (saved around calls)
//      2 | $sp   | Stack pointer (stack grows downwards)
//      3 | $fp   | Frame pointer
//      4 | $ret  | Return value
//      5 | $flag | Status flags (see constants::FLAG_*)
//      6 | $isr  | Interrupt service request mask
//      7 | $iip  | Interrupted instruction pointer
//    8-9 | $k1.. | Kernel scratch
//  10-12 | $s1.. | Syscall arguments
//  13-24 | $r1.. | General purpose (allocatable)

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr, EnumVariantNames,
)]
pub enum Register {
    Ip,
    Rpc,
    Sp,
    Fp,
    Ret,
    Flag,
    Isr,
    Iip,
    K1,
    K2,
    S1,
    S2,
    S3,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
}

/// Number of allocatable general-purpose registers (`$r1..`).
pub const GENERAL_COUNT: u8 = 12;

/// Index of the first general-purpose register.
pub const GENERAL_START: u8 = Register::R1 as u8;

/// Index of the first syscall argument register (`$s1`); `mem_copy` uses
/// three consecutive registers starting here.
pub const SYSCALL_START: u8 = Register::S1 as u8;

impl Register {
    pub fn index(self) -> u8 {
        self.to_u8().unwrap()
    }

    pub fn from_index(index: u8) -> Option<Register> {
        Register::from_u8(index)
    }

    /// Name of the register at `index`, or `"?"` for an invalid index.
    pub fn name(index: u8) -> &'static str {
        match Register::from_index(index) {
            Some(reg) => reg.variant_name(),
            None => "?",
        }
    }

    /// Parse a register name (without the `$` sigil), e.g. `"sp"`, `"r12"`.
    pub fn parse(name: &str) -> Option<Register> {
        <Register as EnumFromStr>::from_str(name).ok()
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.variant_name())
    }
}
