//! Source-trace model for the edel toolchain's visualizer.
//!
//! The debugger correlates three abstraction levels of one program:
//!
//! * the high-level source (`.edel`),
//! * the assembly the compiler emitted (`.asm`), annotated per line with
//!   `; @<path>:<line>[:<col>]` origin comments,
//! * the reconstructed assembly (`.s`) the assembler wrote, one line per
//!   chunk, annotated with `; <path>:<line>+<byte-offset>`.
//!
//! [`sources::Sources`](sources/struct.Sources.html) reads all three and
//! builds a symmetric [trace graph](graph/struct.Graph.html) over
//! `(path, line)` keys, plus a program-counter index
//! (`pc -> PCLine`). The visualizer's tabs walk this graph to step
//! between levels; the emulator itself is external and reached through
//! the [`processor::Processor`](processor/trait.Processor.html) trait.

pub mod graph;
pub mod processor;
pub mod sources;
pub mod tabs;

#[cfg(test)]
mod test;
