//! Assembler state threaded through parsing: the pre-processed line list,
//! the chunk buffer, the label table and the running byte offset.

use crate::chunks::Chunk;
use crate::preprocess::{PreProcessorData, SourceLine};
use eisa::constants::{ENTRY_LABEL, HEADER_BYTES, INTERRUPT_LABEL};
use std::collections::HashMap;
use std::path::PathBuf;
use util::Location;

#[derive(Clone, Debug)]
pub struct LabelInfo {
    pub loc: Location,
    /// Runtime address: chunk offset plus the image header.
    pub addr: u64,
}

pub struct Data {
    pub file_path: PathBuf,
    pub lines: Vec<SourceLine>,
    pub chunks: Vec<Chunk>,
    pub labels: HashMap<String, LabelInfo>,
    /// Next chunk's byte offset, relative to the start of the chunk region.
    pub offset: u64,
}

impl Data {
    pub fn from_pre_processed(pre: PreProcessorData) -> Data {
        Data {
            file_path: pre.file_path,
            lines: pre.lines,
            chunks: Vec::new(),
            labels: HashMap::new(),
            offset: 0,
        }
    }

    /// Append a chunk and advance the offset by its size.
    pub fn add_chunk(&mut self, chunk: Chunk) {
        self.offset = chunk.offset + chunk.size();
        self.chunks.push(chunk);
    }

    /// Turn a chunk-region offset into a runtime address.
    pub fn runtime_address(offset: u64) -> u64 {
        HEADER_BYTES + offset
    }

    /// Resolve `label` in every chunk assembled so far.
    pub fn replace_label(&mut self, label: &str, address: u64) {
        for chunk in &mut self.chunks {
            chunk.replace_label(label, address);
        }
    }

    pub fn entry_point(&self) -> Option<u64> {
        self.labels.get(ENTRY_LABEL).map(|info| info.addr)
    }

    pub fn interrupt_handler(&self) -> Option<u64> {
        self.labels.get(INTERRUPT_LABEL).map(|info| info.addr)
    }
}
