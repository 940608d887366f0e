//! Instruction set model for the edel toolchain.
//!
//! This crate is the single authority on the machine's encoding: the
//! register file, opcodes, conditional-test flags, datatype codes, syscall
//! numbers, the binary image header, and the bit-level
//! [`InstructionBuilder`](encoding/struct.InstructionBuilder.html) that the
//! assembler uses to pack a parsed instruction into its 64-bit word.
//!
//! # Instruction layout
//!
//! A word is packed LSB-first at a running bit offset:
//!
//! ```text
//! | opcode (6) | test (4)? | datatype (3)* | arguments ... | zeroes |
//! ```
//!
//! The test field is present when the instruction's signature accepts a
//! conditional suffix; one datatype field is written per expected datatype
//! (zero when the suffix was omitted). Arguments follow in declaration
//! order, each preceded by a tag whose width depends on the slot type (see
//! [`encoding`](encoding/index.html)).

extern crate num_traits;
#[macro_use]
extern crate num_derive;

pub mod constants;
pub mod encoding;
pub mod isa;
pub mod registers;

#[cfg(test)]
mod test;

pub use encoding::InstructionBuilder;
pub use isa::{ConditionFlag, DataType, Opcode, Syscall};
pub use registers::Register;
