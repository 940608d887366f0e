//! Assembler for the edel toolchain.
//!
//! The assembler runs in three stages, each of which reports into a shared
//! [`MessageList`](../util/messages/struct.MessageList.html) and aborts on
//! the first error:
//!
//! 1. [`pre_process`](preprocess/fn.pre_process.html) performs line-oriented
//!    textual expansion: `%define` constants, `%macro`/`%end` macros,
//!    `%include` (with circular-inclusion detection), `%rm` and `%stop`.
//!    Every surviving line keeps the location it came from, across file
//!    boundaries.
//! 2. [`parser::parse`](parser/fn.parse.html) turns the line list into an
//!    ordered [`Chunk`](chunks/enum.ChunkPayload.html) buffer: instructions
//!    (via the signature table in [`instructions`](instructions/index.html)),
//!    `.byte`/`.data`/`.word`/`.space`/`.org` directives, and label
//!    definitions which retroactively resolve earlier references.
//! 3. [`binary::write_binary`](binary/fn.write_binary.html) lays chunks out
//!    contiguously after the two-word image header, zero-filling gaps.
//!
//! # Source language
//!
//! A line is one of:
//!
//! ```text
//! label:                      ; define a label at the current offset
//! .byte 1, 'a', "text", 0x2A  ; data directives: .byte .data .word .space .org
//! mnemonic[cond][.dt] args    ; e.g. load $r1, 42   addeq.i $r1, $r2, 1
//! %define NAME VALUE          ; pre-processor directives
//! ```
//!
//! Comments start with `;` outside string literals. Numeric literals accept
//! the base prefixes `0b`, `0t`, `0o`, `0d`, `0x` and `_` separators; a
//! fractional part turns the literal into a double-precision immediate.
//!
//! Mnemonics carry an option suffix: a conditional test (`z`, `nz`, `eq`,
//! `neq`/`ne`, `lt`, `lte`/`le`, `gt`, `gte`/`ge`) followed by a dotted
//! datatype (`.hu`, `.u`, `.hi`, `.i`, `.f`, `.d`). `cvt` takes two
//! datatypes in the form `cvt<dt>2<dt>`.

pub mod args;
pub mod binary;
pub mod chunks;
pub mod data;
pub mod instructions;
pub mod numbers;
pub mod parser;
pub mod preprocess;

#[cfg(test)]
mod test;

use std::path::PathBuf;
use util::{Location, Message, MessageList, PhaseResult};

/// Assembly options shared by every stage; mirrors the command line.
#[derive(Clone, Debug)]
pub struct Options {
    pub debug: bool,
    pub lib_path: PathBuf,
    pub do_pre_process: bool,
    pub do_compile: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            debug: false,
            lib_path: PathBuf::from("lib"),
            do_pre_process: true,
            do_compile: true,
        }
    }
}

/// Read a source file into pre-processor lines, skipping empty lines but
/// keeping the original line numbers.
pub fn read_source_file(
    path: &std::path::Path,
    data: &mut preprocess::PreProcessorData,
    messages: &mut MessageList,
) -> PhaseResult {
    data.file_path = path.to_path_buf();

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            let loc = Location::new(path);
            messages.add(Message::error(
                loc.copy(),
                format!("cannot read file {}: {}", path.display(), err),
            ));
            if let Ok(cwd) = std::env::current_dir() {
                messages.add(Message::note(
                    loc,
                    format!("attempted to open file from {}", cwd.display()),
                ));
            }
            return Err(util::Failed);
        }
    };

    read_source_str(path, &content, data);
    Ok(())
}

/// Split already-loaded source text into pre-processor lines.
pub fn read_source_str(
    path: &std::path::Path,
    content: &str,
    data: &mut preprocess::PreProcessorData,
) {
    data.file_path = path.to_path_buf();
    for (i, line) in content.lines().enumerate() {
        if !line.is_empty() {
            data.lines.push(preprocess::SourceLine {
                loc: Location::at(path, i as i32),
                text: line.to_string(),
            });
        }
    }
}

/// Convenience driver used by tests and the binary: pre-process and parse
/// `source` as though it were the contents of `path`.
pub fn assemble_str(
    path: &str,
    source: &str,
    options: &Options,
    messages: &mut MessageList,
) -> PhaseResult<data::Data> {
    let mut pre_data = preprocess::PreProcessorData::new();
    read_source_str(std::path::Path::new(path), source, &mut pre_data);
    if options.do_pre_process {
        preprocess::pre_process(&mut pre_data, options, messages)?;
    }

    let mut data = data::Data::from_pre_processed(pre_data);
    parser::parse(&mut data, options, messages)?;
    Ok(data)
}
