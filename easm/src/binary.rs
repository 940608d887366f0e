//! Binary image emission.
//!
//! Layout: a `u64` entry point, a `u64` interrupt handler address, then the
//! chunk bytes laid out contiguously, zero-filling any gap up to each
//! chunk's recorded offset.

use crate::data::Data;
use byteorder::WriteBytesExt;
use eisa::constants::DEFAULT_INTERRUPT_ADDR;
use std::io::{self, Write};
use util::Endian;

pub fn write_binary<W: Write>(data: &Data, out: &mut W) -> io::Result<()> {
    out.write_u64::<Endian>(data.entry_point().unwrap_or(0))?;
    out.write_u64::<Endian>(
        data.interrupt_handler().unwrap_or(DEFAULT_INTERRUPT_ADDR),
    )?;

    let mut offset = 0u64;
    for chunk in &data.chunks {
        while offset < chunk.offset {
            out.write_u8(0)?;
            offset += 1;
        }
        chunk.write(out)?;
        offset = chunk.offset + chunk.size();
    }

    Ok(())
}
