//! Bit-level packing of a single instruction word.
//!
//! The builder writes fields LSB-first at a running bit offset. Argument
//! tags depend on the *slot* type of the matched signature overload, not on
//! the argument alone, so the caller announces the slot with
//! [`next_as_value`](struct.InstructionBuilder.html#method.next_as_value) or
//! [`next_as_address`](struct.InstructionBuilder.html#method.next_as_address)
//! before pushing the argument payload.
//!
//! Tag values (stable):
//!
//! ```text
//! Address slot (2 bits): mem = 0b00, reg-indirect = 0b01
//! Value slot   (2 bits): imm = 0b00, mem = 0b01, reg-indirect = 0b10, reg = 0b11
//! Register slot: no tag, 8-bit payload
//! ```

use crate::constants::*;
use crate::isa::{ConditionFlag, DataType};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum NextArgument {
    None,
    AsValue,
    AsAddress,
}

mod tag {
    pub mod value {
        pub const IMM: u64 = 0b00;
        pub const MEM: u64 = 0b01;
        pub const REG_INDIRECT: u64 = 0b10;
        pub const REG: u64 = 0b11;
    }

    pub mod addr {
        pub const MEM: u64 = 0b00;
        pub const REG_INDIRECT: u64 = 0b01;
    }
}

pub struct InstructionBuilder {
    word: u64,
    pos: u8,
    next: NextArgument,
}

impl Default for InstructionBuilder {
    fn default() -> Self {
        InstructionBuilder::new()
    }
}

impl InstructionBuilder {
    pub fn new() -> InstructionBuilder {
        InstructionBuilder {
            word: 0,
            pos: 0,
            next: NextArgument::None,
        }
    }

    fn write(&mut self, length: u8, data: u64) {
        debug_assert!(
            self.pos + length <= 64,
            "instruction exceeds 64 bits at bit {}",
            self.pos
        );
        let mask = if length == 64 {
            u64::max_value()
        } else {
            (1u64 << length) - 1
        };
        self.word |= (data & mask) << self.pos;
        self.pos += length;
    }

    pub fn opcode(&mut self, opcode: u8) {
        self.write(OPCODE_BITS, u64::from(opcode) & OPCODE_MASK);
    }

    pub fn conditional_test(&mut self, flag: ConditionFlag) {
        self.write(TEST_BITS, u64::from(flag.bits()) & TEST_MASK);
    }

    pub fn no_conditional_test(&mut self) {
        self.write(TEST_BITS, u64::from(ConditionFlag::None.bits()));
    }

    pub fn data_type(&mut self, dt: DataType) {
        self.write(DATATYPE_BITS, u64::from(dt.bits()) & DATATYPE_MASK);
    }

    /// Write a zero datatype field for a signature that expects one when
    /// no suffix was supplied.
    pub fn default_data_type(&mut self) {
        self.write(DATATYPE_BITS, 0);
    }

    pub fn next_as_value(&mut self) {
        self.next = NextArgument::AsValue;
    }

    pub fn next_as_address(&mut self) {
        self.next = NextArgument::AsAddress;
    }

    pub fn arg_reg(&mut self, reg: u8) {
        match self.next {
            NextArgument::None => {
                self.write(REGISTER_BITS, u64::from(reg));
            }
            NextArgument::AsValue => {
                self.write(2, tag::value::REG);
                self.write(REGISTER_BITS, u64::from(reg));
            }
            // A bare register in an address slot addresses memory at the
            // register's value, i.e. reg-indirect with offset zero.
            NextArgument::AsAddress => {
                self.write(2, tag::addr::REG_INDIRECT);
                self.write(REGISTER_BITS, u64::from(reg));
                self.write(INDIRECT_OFFSET_BITS, 0);
            }
        }
        self.next = NextArgument::None;
    }

    pub fn arg_imm(&mut self, imm: u32) {
        self.write(2, tag::value::IMM);
        self.write(IMMEDIATE_BITS, u64::from(imm));
        self.next = NextArgument::None;
    }

    pub fn arg_byte(&mut self, byte: u8) {
        self.write(8, u64::from(byte));
        self.next = NextArgument::None;
    }

    pub fn arg_addr(&mut self, addr: u32) {
        match self.next {
            NextArgument::None => {
                debug_assert!(false, "address argument without a slot tag");
                return;
            }
            NextArgument::AsValue => self.write(2, tag::value::MEM),
            NextArgument::AsAddress => self.write(2, tag::addr::MEM),
        }
        self.write(IMMEDIATE_BITS, u64::from(addr));
        self.next = NextArgument::None;
    }

    pub fn arg_reg_indirect(&mut self, reg: u8, offset: i16) {
        match self.next {
            NextArgument::None => {
                debug_assert!(false, "register-indirect argument without a slot tag");
                return;
            }
            NextArgument::AsValue => self.write(2, tag::value::REG_INDIRECT),
            NextArgument::AsAddress => self.write(2, tag::addr::REG_INDIRECT),
        }
        self.write(REGISTER_BITS, u64::from(reg));
        self.write(INDIRECT_OFFSET_BITS, u64::from(offset as u16));
        self.next = NextArgument::None;
    }

    pub fn get(&self) -> u64 {
        self.word
    }
}
