//! Output units of the assembler. Each chunk records the byte offset it was
//! assembled at and the source line it came from, which later feeds the
//! reconstructed-assembly trace.

use crate::instructions::Instruction;
use byteorder::WriteBytesExt;
use eisa::constants::INSTRUCTION_BYTES;
use std::fmt;
use std::io::{self, Write};
use util::{Endian, Location};

pub enum ChunkPayload {
    /// One encoded instruction, always eight bytes.
    Instruction(Instruction),
    /// Raw bytes from a data directive.
    Data(Vec<u8>),
    /// `n` zero bytes from `.space`.
    Space(u64),
}

pub struct Chunk {
    pub offset: u64,
    pub source: Location,
    pub payload: ChunkPayload,
}

impl Chunk {
    pub fn instruction(source: Location, offset: u64, instruction: Instruction) -> Chunk {
        Chunk {
            offset,
            source,
            payload: ChunkPayload::Instruction(instruction),
        }
    }

    pub fn data(source: Location, offset: u64, bytes: Vec<u8>) -> Chunk {
        Chunk {
            offset,
            source,
            payload: ChunkPayload::Data(bytes),
        }
    }

    pub fn space(source: Location, offset: u64, size: u64) -> Chunk {
        Chunk {
            offset,
            source,
            payload: ChunkPayload::Space(size),
        }
    }

    pub fn size(&self) -> u64 {
        match &self.payload {
            ChunkPayload::Instruction(_) => INSTRUCTION_BYTES,
            ChunkPayload::Data(bytes) => bytes.len() as u64,
            ChunkPayload::Space(size) => *size,
        }
    }

    /// First unresolved label referenced by this chunk, if any.
    pub fn first_label(&self) -> Option<&str> {
        match &self.payload {
            ChunkPayload::Instruction(instruction) => instruction.first_label(),
            _ => None,
        }
    }

    pub fn replace_label(&mut self, label: &str, address: u64) {
        if let ChunkPayload::Instruction(instruction) = &mut self.payload {
            instruction.replace_label(label, address);
        }
    }

    /// Emit the chunk's bytes.
    pub fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match &self.payload {
            ChunkPayload::Instruction(instruction) => {
                out.write_u64::<Endian>(instruction.compile())
            }
            ChunkPayload::Data(bytes) => out.write_all(bytes),
            ChunkPayload::Space(size) => {
                for _ in 0..*size {
                    out.write_u8(0)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Chunk {
    /// The reconstructed textual form of the chunk, without trace comment.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.payload {
            ChunkPayload::Instruction(instruction) => write!(f, "{}", instruction),
            ChunkPayload::Data(bytes) => {
                write!(f, ".byte")?;
                for (i, byte) in bytes.iter().enumerate() {
                    if i == 0 {
                        write!(f, " 0x{:02x}", byte)?;
                    } else {
                        write!(f, ", 0x{:02x}", byte)?;
                    }
                }
                Ok(())
            }
            ChunkPayload::Space(size) => write!(f, ".space {}", size),
        }
    }
}
