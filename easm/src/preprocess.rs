//! Line-oriented textual pre-processing.
//!
//! The pre-processor walks the line list in place: it trims whitespace,
//! strips `;` comments (outside string literals), handles `%` directives,
//! substitutes `%define` constants, collects macro bodies and splices macro
//! expansions back into the list for re-scanning. Locations always point at
//! the original source, so later diagnostics and the trace model survive
//! expansion.

use crate::numbers::{is_valid_label_name, skip_non_whitespace, skip_whitespace};
use crate::Options;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use util::{Failed, Location, Message, MessageList, PhaseResult};

#[derive(Clone, Debug)]
pub struct SourceLine {
    pub loc: Location,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct Constant {
    pub loc: Location,
    pub value: String,
}

#[derive(Clone, Debug)]
pub struct Macro {
    pub loc: Location,
    pub params: Vec<String>,
    pub lines: Vec<String>,
}

/// Pre-processor scanning state: either passing lines through, or
/// collecting the body of the named macro.
enum State {
    Scanning,
    CollectingMacro(String),
}

#[derive(Default)]
pub struct PreProcessorData {
    pub file_path: PathBuf,
    pub lines: Vec<SourceLine>,
    pub constants: HashMap<String, Constant>,
    pub macros: HashMap<String, Macro>,
    /// Canonical paths already included, with the location of inclusion.
    pub included: HashMap<PathBuf, Location>,
}

impl PreProcessorData {
    pub fn new() -> PreProcessorData {
        PreProcessorData::default()
    }

    /// Splice another data object's lines in at `index`; constants and
    /// macros union, with the incoming file's definitions winning.
    pub fn merge(&mut self, other: PreProcessorData, index: usize) {
        let at = index.min(self.lines.len());
        self.lines.splice(at..at, other.lines);
        self.constants.extend(other.constants);
        self.macros.extend(other.macros);
        self.included.extend(other.included);
    }

    /// Write the post-processed line list.
    pub fn write_lines<W: std::io::Write>(&self, out: &mut W) -> std::io::Result<()> {
        for line in &self.lines {
            writeln!(out, "{}", line.text)?;
        }
        Ok(())
    }
}

/// Strip a `;` comment, honouring double-quoted strings. Returns whether a
/// comment was removed.
fn strip_comment(text: &mut String) -> bool {
    let mut in_string = false;
    let bytes = text.as_bytes();
    for i in 0..bytes.len() {
        match bytes[i] {
            b'"' => in_string = !in_string,
            b';' if !in_string => {
                text.truncate(i);
                return true;
            }
            _ => {}
        }
    }
    false
}

/// Unanchored textual substitution of every occurrence, repeated per
/// constant.
fn substitute(text: &mut String, name: &str, value: &str) {
    let mut index = 0;
    while let Some(found) = text[index..].find(name) {
        let at = index + found;
        text.replace_range(at..at + name.len(), value);
        index = at + value.len();
    }
}

pub fn pre_process(
    data: &mut PreProcessorData,
    options: &Options,
    messages: &mut MessageList,
) -> PhaseResult {
    let mut state = State::Scanning;
    let mut index = 0usize;

    while index < data.lines.len() {
        let mut text = std::mem::take(&mut data.lines[index].text);
        let loc = data.lines[index].loc.clone();

        text = text.trim().to_string();
        if text.is_empty() {
            data.lines.remove(index);
            continue;
        }

        if strip_comment(&mut text) {
            text.truncate(text.trim_end().len());
            if text.is_empty() {
                data.lines.remove(index);
                continue;
            }
        }

        // section headers are accepted and ignored
        if text.starts_with(".section") {
            data.lines[index].text = text;
            index += 1;
            continue;
        }

        if text.starts_with('%') {
            process_directive(data, options, index, &loc, &text, &mut state, messages)?;
            data.lines.remove(index);
            continue;
        }

        for (name, constant) in &data.constants {
            if options.debug && text.contains(name.as_str()) {
                println!("{} CONSTANT: substitute symbol {}", loc, name);
            }
            substitute(&mut text, name, &constant.value);
        }

        if let State::CollectingMacro(name) = &state {
            data.macros
                .get_mut(name)
                .expect("collecting an undefined macro")
                .lines
                .push(text);
            data.lines.remove(index);
            continue;
        }

        // does the first token name a macro?
        let mut i = 0;
        skip_non_whitespace(&text, &mut i);
        let mnemonic = text[..i].to_string();

        if let Some(makro) = data.macros.get(&mnemonic).cloned() {
            if options.debug {
                println!("{} CALL TO MACRO {}", loc, mnemonic);
            }

            // collect comma- or space-separated arguments
            let mut arguments: Vec<String> = Vec::new();
            loop {
                skip_whitespace(&text, &mut i);
                let start = i;
                while i < text.len() && !matches!(text.as_bytes()[i], b' ' | b'\t' | b',') {
                    i += 1;
                }
                if i == start {
                    break;
                }
                arguments.push(text[start..i].to_string());
                if i < text.len() && text.as_bytes()[i] == b',' {
                    i += 1;
                }
                if i >= text.len() {
                    break;
                }
            }

            if makro.params.len() != arguments.len() {
                messages.add(Message::error(
                    loc.copy().with_column(mnemonic.len() as i32),
                    format!(
                        "macro {} expects {} argument(s), received {}",
                        mnemonic,
                        makro.params.len(),
                        arguments.len()
                    ),
                ));
                messages.add(Message::note(
                    makro.loc.copy(),
                    format!("macro \"{}\" defined here", mnemonic),
                ));
                return Err(Failed);
            }

            // replace the call with the expanded body, then re-scan from it
            data.lines.remove(index);
            let mut insert_at = index;
            for body_line in &makro.lines {
                let mut expanded = body_line.clone();
                for (param, arg) in makro.params.iter().zip(&arguments) {
                    substitute(&mut expanded, param, arg);
                }
                data.lines.insert(
                    insert_at,
                    SourceLine {
                        loc: loc.clone(),
                        text: expanded,
                    },
                );
                insert_at += 1;
            }
            continue;
        }

        data.lines[index].text = text;
        index += 1;
    }

    Ok(())
}

fn process_directive(
    data: &mut PreProcessorData,
    options: &Options,
    line_idx: usize,
    loc: &Location,
    text: &str,
    state: &mut State,
    messages: &mut MessageList,
) -> PhaseResult {
    let mut i = 1usize;
    let start = i;
    while i < text.len() && text.as_bytes()[i].is_ascii_alphanumeric() {
        i += 1;
    }
    let directive = text[start..i].to_lowercase();

    if options.debug {
        println!("{} DIRECTIVE: '{}'", loc, directive);
    }

    // inside a macro body, only %end is legal
    if let State::CollectingMacro(name) = state {
        if directive == "end" {
            if options.debug {
                let body = &data.macros[name.as_str()].lines;
                println!("\tEnd definition of {} - {} lines", name, body.len());
            }
            *state = State::Scanning;
            return Ok(());
        }

        messages.add(Message::error(
            loc.copy(),
            format!("unknown/invalid directive in %macro body: %{}", directive),
        ));
        return Err(Failed);
    }

    match directive.as_str() {
        "define" => {
            skip_whitespace(text, &mut i);
            let name_start = i;
            skip_non_whitespace(text, &mut i);
            let name = text[name_start..i].to_string();

            skip_whitespace(text, &mut i);
            let value = text[i..].to_string();

            if let Some(existing) = data.constants.get_mut(&name) {
                messages.add(Message::warning(
                    loc.copy().with_column(name_start as i32),
                    format!(
                        "re-definition of constant {} (previously defined at {})",
                        name, existing.loc
                    ),
                ));
                existing.value = value;
                existing.loc = loc.copy().with_column(name_start as i32);
            } else {
                data.constants.insert(
                    name,
                    Constant {
                        loc: loc.copy().with_column(name_start as i32),
                        value,
                    },
                );
            }
            Ok(())
        }
        "include" => {
            skip_whitespace(text, &mut i);
            let file_path = text[i..].to_string();
            include_file(data, options, line_idx, loc, i, &file_path, messages)
        }
        "macro" => {
            skip_whitespace(text, &mut i);
            let name_start = i;
            skip_non_whitespace(text, &mut i);
            let name = text[name_start..i].to_string();

            if !is_valid_label_name(&name) {
                messages.add(Message::error(
                    loc.copy(),
                    format!("invalid macro name \"{}\"", name),
                ));
                return Err(Failed);
            }

            if let Some(existing) = data.macros.get(&name) {
                messages.add(Message::warning(
                    loc.copy().with_column(name_start as i32),
                    format!("re-definition of macro {}", name),
                ));
                messages.add(Message::note(
                    existing.loc.copy(),
                    "previously defined here".to_string(),
                ));
            }

            let mut params: Vec<String> = Vec::new();
            loop {
                skip_whitespace(text, &mut i);
                if i >= text.len() {
                    break;
                }
                let param_start = i;
                skip_non_whitespace(text, &mut i);
                let param = text[param_start..i].to_string();

                if !is_valid_label_name(&param) {
                    messages.add(Message::error(
                        loc.copy(),
                        format!("invalid parameter name \"{}\"", param),
                    ));
                    messages.add(Message::note(
                        loc.copy().with_column(name_start as i32),
                        format!("in definition of macro \"{}\"", name),
                    ));
                    return Err(Failed);
                }

                if params.contains(&param) {
                    messages.add(Message::error(
                        loc.copy().with_column(param_start as i32),
                        format!("duplicate parameter \"{}\"", param),
                    ));
                    messages.add(Message::note(
                        loc.copy().with_column(name_start as i32),
                        format!("in definition of macro \"{}\"", name),
                    ));
                    return Err(Failed);
                }

                params.push(param);
            }

            data.macros.insert(
                name.clone(),
                Macro {
                    loc: loc.copy().with_column(name_start as i32),
                    params,
                    lines: Vec::new(),
                },
            );
            *state = State::CollectingMacro(name);
            Ok(())
        }
        // %rm acts as a comment
        "rm" => Ok(()),
        "stop" => {
            data.lines.truncate(line_idx);
            // keep one placeholder so the caller's removal is well-defined
            data.lines.push(SourceLine {
                loc: loc.copy(),
                text: String::new(),
            });
            Ok(())
        }
        _ => {
            messages.add(Message::error(
                loc.copy(),
                format!("unknown directive %{}", directive),
            ));
            Err(Failed)
        }
    }
}

fn include_file(
    data: &mut PreProcessorData,
    options: &Options,
    line_idx: usize,
    loc: &Location,
    column: usize,
    file_path: &str,
    messages: &mut MessageList,
) -> PhaseResult {
    // lib:name resolves against the library path, anything else against the
    // including file's directory; both append the .asm extension
    let full_path = if let Some(stripped) = file_path.strip_prefix("lib:") {
        options.lib_path.join(format!("{}.asm", stripped))
    } else {
        let parent = data
            .file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        parent.join(format!("{}.asm", file_path))
    };

    if options.debug {
        println!("\tFull path {}", full_path.display());
    }

    let mut include_data = PreProcessorData::new();
    let mut include_messages = MessageList::new();

    if crate::read_source_file(&full_path, &mut include_data, &mut include_messages).is_err() {
        messages.merge(&mut include_messages);
        messages.add(Message::note(
            loc.copy().with_column(column as i32),
            "attempted to %include file here".to_string(),
        ));
        return Err(Failed);
    }

    let canonical = full_path.canonicalize().unwrap_or(full_path.clone());
    if let Some(previous) = data.included.get(&canonical) {
        messages.add(Message::error(
            loc.copy().with_column(column as i32),
            format!("circular %include: {}", full_path.display()),
        ));
        messages.add(Message::note(
            previous.copy(),
            format!("file {} previously included here", canonical.display()),
        ));
        return Err(Failed);
    }

    // the included file inherits the includer's inclusion set
    include_data.included.extend(data.included.clone());
    include_data
        .included
        .insert(canonical, loc.copy().with_column(column as i32));

    if pre_process(&mut include_data, options, &mut include_messages).is_err()
        || include_messages.has_error()
    {
        messages.merge(&mut include_messages);
        return Err(Failed);
    }
    messages.merge(&mut include_messages);

    data.merge(include_data, line_idx + 1);
    Ok(())
}
