//! Second pass: turn pre-processed lines into the chunk buffer.
//!
//! Each line is either a data/layout directive (`.byte`, `.data`, `.word`,
//! `.space`, `.org`), a label definition, or an instruction. Labels resolve
//! both backwards (replacing placeholders in earlier chunks) and forwards
//! (later definitions patch earlier references); any placeholder left at
//! end of input is an error.

use crate::args::{Argument, ArgumentType};
use crate::chunks::Chunk;
use crate::data::{Data, LabelInfo};
use crate::instructions::{find_signature, Instruction, Signature};
use crate::numbers::{
    decode_escape, is_valid_label_name, parse_number, skip_to_break, skip_whitespace,
};
use crate::Options;
use byteorder::ByteOrder;
use eisa::constants::{ENTRY_LABEL, INTERRUPT_LABEL};
use eisa::{ConditionFlag, DataType, Register};
use std::io::Write;
use util::{Endian, Failed, Location, Message, MessageList, PhaseResult};

fn describe_char(s: &str, i: usize) -> String {
    match s.as_bytes().get(i) {
        Some(b) => format!("'{}'", *b as char),
        None => "eol".to_string(),
    }
}

pub fn parse(data: &mut Data, options: &Options, messages: &mut MessageList) -> PhaseResult {
    data.offset = 0;

    for line_idx in 0..data.lines.len() {
        let text = data.lines[line_idx].text.clone();
        let loc = data.lines[line_idx].loc.clone();

        let mut i = 0usize;
        skip_whitespace(&text, &mut i);
        if i >= text.len() {
            continue;
        }
        let mut start = i;
        skip_to_break(&text, &mut i);

        // directive?
        if text.as_bytes()[start] == b'.' {
            let directive = text[start + 1..i].to_string();
            skip_whitespace(&text, &mut i);

            match parse_directive(data, options, &loc, &text, &directive, i, messages) {
                Ok(true) => continue,
                Ok(false) => {
                    messages.add(Message::error(
                        loc.copy().with_column(start as i32),
                        format!("unknown directive .{}", directive),
                    ));
                    return Err(Failed);
                }
                Err(_) => {
                    messages.add(Message::note(
                        loc.copy().with_column(start as i32),
                        format!("whilst parsing directive .{}", directive),
                    ));
                    return Err(Failed);
                }
            }
        }

        // label definition?
        if i > 0 && text.as_bytes()[i - 1] == b':' {
            let label_name = text[start..i - 1].to_string();

            if !is_valid_label_name(&label_name) {
                messages.add(Message::error(
                    loc.copy().with_column(start as i32),
                    format!("invalid label '{}'", label_name),
                ));
                return Err(Failed);
            }

            let address = Data::runtime_address(data.offset);
            if options.debug {
                println!("{} Label: {} = 0x{:x}", loc, label_name, address);
            }

            if let Some(existing) = data.labels.get_mut(&label_name) {
                let level = if label_name == ENTRY_LABEL || label_name == INTERRUPT_LABEL {
                    util::Level::Error
                } else {
                    util::Level::Warning
                };
                let previous_loc = existing.loc.clone();
                messages.add(
                    Message::new(level, format!("re-declaration of label {}", label_name))
                        .with_location(loc.copy().with_column(start as i32)),
                );
                messages.add(Message::note(
                    previous_loc,
                    "previously declared here".to_string(),
                ));
                if level == util::Level::Error {
                    return Err(Failed);
                }

                existing.loc = loc.clone();
                existing.addr = address;
            } else {
                data.labels.insert(
                    label_name.clone(),
                    LabelInfo {
                        loc: loc.clone(),
                        addr: address,
                    },
                );
            }

            // patch all earlier references
            data.replace_label(&label_name, address);

            if i == text.len() {
                continue;
            }
            skip_whitespace(&text, &mut i);
            start = i;
            skip_to_break(&text, &mut i);
        }

        // instruction mnemonic
        let mnemonic = text[start..i].to_string();
        if options.debug {
            println!("[{}:{}] Mnemonic {}", line_idx + 1, start, mnemonic);
        }

        let (sig, sig_options) = match find_signature(&mnemonic) {
            Some(found) => found,
            None => {
                messages.add(Message::error(
                    loc.copy().with_column(start as i32),
                    format!("unknown mnemonic '{}'", mnemonic),
                ));
                return Err(Failed);
            }
        };

        // arguments
        let mut arguments: Vec<Argument> = Vec::new();
        while i < text.len() {
            skip_whitespace(&text, &mut i);
            if i >= text.len() {
                break;
            }

            let argument = match parse_arg(&text, &mut i, &loc, messages) {
                Ok(argument) => argument,
                Err(_) => {
                    messages.add(Message::note(
                        loc.copy(),
                        format!(
                            "while parsing mnemonic {}, argument {}",
                            mnemonic,
                            arguments.len() + 1
                        ),
                    ));
                    return Err(Failed);
                }
            };

            if i < text.len() && !matches!(text.as_bytes()[i], b' ' | b'\t' | b',') {
                messages.add(Message::error(
                    loc.copy().with_column(i as i32),
                    format!("expected ' ' or ',', got {}", describe_char(&text, i)),
                ));
                return Err(Failed);
            }

            arguments.push(argument);
            if i < text.len() && text.as_bytes()[i] == b',' {
                i += 1;
            }
        }

        // bind to an overload, expanding pseudo-instructions
        let arg_loc = loc.copy().with_column(start as i32);
        let instructions =
            match parse_instruction(sig, sig_options, arguments, &arg_loc, options, messages) {
                Ok(instructions) => instructions,
                Err(_) => {
                    messages.add(Message::note(
                        arg_loc,
                        format!(
                            "while parsing mnemonic {} (opcode 0x{:02x})",
                            mnemonic,
                            sig.opcode.code()
                        ),
                    ));
                    return Err(Failed);
                }
            };

        for mut instruction in instructions {
            // resolve already-known labels
            for label in instruction.referenced_labels() {
                if let Some(info) = data.labels.get(&label) {
                    instruction.replace_label(&label, info.addr);
                }
            }

            let chunk = Chunk::instruction(loc.clone(), data.offset, instruction);
            data.add_chunk(chunk);
        }
    }

    // any unresolved references left?
    for chunk in &data.chunks {
        if let Some(label) = chunk.first_label() {
            messages.add(Message::error(
                chunk.source.clone(),
                format!("unresolved reference to label {}", label),
            ));
            return Err(Failed);
        }
    }

    Ok(())
}

/// Handle a `.` directive; `Ok(false)` means the name is unknown.
fn parse_directive(
    data: &mut Data,
    options: &Options,
    loc: &Location,
    text: &str,
    directive: &str,
    mut i: usize,
    messages: &mut MessageList,
) -> PhaseResult<bool> {
    if matches!(directive, "byte" | "data" | "word") {
        let size: usize = match directive {
            "byte" => 1,
            "data" => 4,
            _ => 8,
        };

        let mut bytes = parse_data(data, loc, text, i, size, messages)?;

        // an empty directive reserves a single zero element
        if bytes.is_empty() {
            bytes.resize(size, 0);
        }

        if options.debug {
            println!("{} .{}: size {} bytes", loc, directive, bytes.len());
        }

        let chunk = Chunk::data(loc.copy().with_column(0), data.offset, bytes);
        data.add_chunk(chunk);
        return Ok(true);
    }

    if matches!(directive, "space" | "org") {
        skip_whitespace(text, &mut i);
        let number = match parse_number(text, &mut i) {
            Some(number) => number,
            None => {
                messages.add(Message::error(
                    loc.copy().with_column(i as i32),
                    "expected number".to_string(),
                ));
                return Err(Failed);
            }
        };

        if number.is_decimal {
            messages.add(Message::error(
                loc.copy().with_column(i as i32),
                "number of bytes cannot be decimal!".to_string(),
            ));
            return Err(Failed);
        }

        if directive == "space" {
            if options.debug {
                println!("{} .space: insert {} null bytes", loc, number.value);
            }
            let chunk = Chunk::space(loc.copy().with_column(0), data.offset, number.value);
            data.add_chunk(chunk);
        } else {
            if number.value < data.offset {
                messages.add(Message::warning(
                    loc.copy().with_column(i as i32),
                    format!(
                        ".org: decreasing offset to 0x{:x} (was 0x{:x})",
                        number.value, data.offset
                    ),
                ));
            }
            data.offset = number.value;
        }
        return Ok(true);
    }

    Ok(false)
}

/// Parse the element list of a `.byte`/`.data`/`.word` directive.
fn parse_data(
    data: &Data,
    loc: &Location,
    text: &str,
    mut col: usize,
    size: usize,
    messages: &mut MessageList,
) -> PhaseResult<Vec<u8>> {
    let bytes_in = text.as_bytes();
    let mut out: Vec<u8> = Vec::new();
    let mut str_start: Option<usize> = None;

    skip_whitespace(text, &mut col);

    while col < bytes_in.len() {
        let mut value: u64;
        let mut is_decimal = false;

        if bytes_in[col] == b'"' {
            if str_start.is_none() {
                str_start = Some(col);
                col += 1;
                continue;
            }
            // closing quote terminates the string with a NUL byte
            value = 0;
            str_start = None;
            col += 1;
        } else if str_start.is_some() {
            if bytes_in[col] == b'\\' {
                col += 1;
                value = match decode_escape(text, &mut col) {
                    Some(value) => value,
                    None => {
                        let raw = u64::from(bytes_in[col]);
                        col += 1;
                        raw
                    }
                };
            } else {
                value = u64::from(bytes_in[col]);
                col += 1;
            }
        } else if bytes_in[col] == b'\'' {
            col += 1;
            value = parse_character_literal(text, &mut col, loc, messages)?;
        } else if let Some(number) = parse_number(text, &mut col) {
            value = number.value;
            is_decimal = number.is_decimal;
        } else {
            // a previously-declared label?
            let start = col;
            skip_to_break(text, &mut col);
            let extracted = &text[start..col];

            match data.labels.get(extracted) {
                Some(info) => value = info.addr,
                None => {
                    messages.add(Message::error(
                        loc.copy().with_column(start as i32),
                        format!("unexpected character '{}' in data list", bytes_in[start] as char),
                    ));
                    messages.add(Message::new(
                        util::Level::Note,
                        "labels cannot be used prior to declaration in this context".to_string(),
                    ));
                    return Err(Failed);
                }
            }
        }

        // narrow decimals to the element size
        if is_decimal && size != 8 {
            let decimal = f64::from_bits(value);
            value = match size {
                1 => decimal as u8 as u64,
                4 => u64::from((decimal as f32).to_bits()),
                _ => value,
            };
        }

        let at = out.len();
        out.resize(at + size, 0);
        let masked = if size == 8 {
            value
        } else {
            value & ((1u64 << (size * 8)) - 1)
        };
        Endian::write_uint(&mut out[at..at + size], masked, size);

        if str_start.is_none() {
            skip_whitespace(text, &mut col);
            if col < bytes_in.len() && bytes_in[col] == b',' {
                col += 1;
                skip_whitespace(text, &mut col);
            }
        }
    }

    if let Some(opened_at) = str_start {
        messages.add(Message::error(
            loc.copy().with_column((col.saturating_sub(1)) as i32),
            format!(
                "unterminated string literal; expected '\"', got {}",
                describe_char(text, col)
            ),
        ));
        messages.add(Message::note(
            loc.copy().with_column(opened_at as i32),
            "string literal opened here".to_string(),
        ));
        return Err(Failed);
    }

    Ok(out)
}

fn parse_character_literal(
    text: &str,
    col: &mut usize,
    loc: &Location,
    messages: &mut MessageList,
) -> PhaseResult<u64> {
    let bytes = text.as_bytes();
    let value;

    if *col < bytes.len() && bytes[*col] == b'\\' {
        *col += 1;
        value = match decode_escape(text, col) {
            Some(value) => value,
            None => {
                messages.add(Message::error(
                    loc.copy().with_column(*col as i32),
                    "invalid escape sequence".to_string(),
                ));
                return Err(Failed);
            }
        };
    } else if *col < bytes.len() {
        value = u64::from(bytes[*col]);
        *col += 1;
    } else {
        messages.add(Message::error(
            loc.copy().with_column(*col as i32),
            "expected character before end of line".to_string(),
        ));
        return Err(Failed);
    }

    if *col >= bytes.len() || bytes[*col] != b'\'' {
        messages.add(Message::error(
            loc.copy().with_column(*col as i32),
            "expected apostrophe to terminate character literal".to_string(),
        ));
        return Err(Failed);
    }
    *col += 1;
    Ok(value)
}

/// Parse one argument starting at `*i`.
fn parse_arg(
    text: &str,
    i: &mut usize,
    loc: &Location,
    messages: &mut MessageList,
) -> PhaseResult<Argument> {
    let bytes = text.as_bytes();

    // character literal
    if bytes[*i] == b'\'' {
        *i += 1;
        let value = parse_character_literal(text, i, loc, messages)?;
        return Ok(Argument::Immediate(value));
    }

    // register
    if bytes[*i] == b'$' {
        let start = *i;
        *i += 1;
        return parse_register(text, i, loc, start, messages).map(Argument::Register);
    }

    // label reference, optionally with +/- offset
    if bytes[*i].is_ascii_alphabetic() || bytes[*i] == b'_' {
        let start = *i;
        crate::numbers::skip_alphanum(text, i);
        let label = text[start..*i].to_string();

        let mut offset: i64 = 0;
        let mut peek = *i;
        skip_whitespace(text, &mut peek);
        if peek < bytes.len() && (bytes[peek] == b'+' || bytes[peek] == b'-') {
            let negate = bytes[peek] == b'-';
            peek += 1;
            skip_whitespace(text, &mut peek);
            let num_start = peek;
            match parse_number(text, &mut peek) {
                Some(number) if !number.is_decimal => {
                    offset = number.value as i64;
                    if negate {
                        offset = -offset;
                    }
                    *i = peek;
                }
                _ => {
                    messages.add(Message::error(
                        loc.copy().with_column(num_start as i32),
                        "expected number as label offset".to_string(),
                    ));
                    return Err(Failed);
                }
            }
        }

        return Ok(Argument::Label {
            name: label,
            offset,
            is_addr: false,
        });
    }

    // a number may be an immediate or the offset of a register-indirect
    let mut value: u64 = 0;
    let mut found_number = false;
    let mut number_decimal = false;
    if bytes[*i] == b'-' || bytes[*i].is_ascii_digit() {
        let start = *i;
        match parse_number(text, i) {
            Some(number) => {
                value = number.value;
                number_decimal = number.is_decimal;
                found_number = true;
            }
            None => *i = start,
        }
    }

    if *i < bytes.len() && bytes[*i] == b'(' {
        let group_start = *i;
        *i += 1;
        let start = *i;

        if *i < bytes.len() && bytes[*i] == b'$' {
            *i += 1;

            if found_number && number_decimal {
                messages.add(Message::error(
                    loc.copy(),
                    format!(
                        "offset in register-indirect cannot be a decimal! (got {})",
                        f64::from_bits(value)
                    ),
                ));
                return Err(Failed);
            }

            let reg = parse_register(text, i, loc, start, messages)?;

            if *i >= bytes.len() || bytes[*i] != b')' {
                messages.add(Message::error(
                    loc.copy().with_column(*i as i32),
                    format!("expected ')', got {}", describe_char(text, *i)),
                ));
                messages.add(Message::note(
                    loc.copy().with_column(group_start as i32),
                    "group opened here".to_string(),
                ));
                return Err(Failed);
            }
            *i += 1;

            return Ok(Argument::RegisterIndirect {
                reg,
                offset: value as i32,
            });
        }

        if found_number {
            messages.add(Message::error(
                loc.copy(),
                format!(
                    "expected '$' for register-indirect, found {} after '('",
                    describe_char(text, *i)
                ),
            ));
            return Err(Failed);
        }

        // (label) addresses the memory at the label
        if bytes[*i].is_ascii_alphabetic() || bytes[*i] == b'_' {
            let name_start = *i;
            crate::numbers::skip_alphanum(text, i);
            let label = text[name_start..*i].to_string();

            let mut offset: i64 = 0;
            skip_whitespace(text, i);
            if *i < bytes.len() && (bytes[*i] == b'+' || bytes[*i] == b'-') {
                let negate = bytes[*i] == b'-';
                *i += 1;
                skip_whitespace(text, i);
                match parse_number(text, i) {
                    Some(number) if !number.is_decimal => {
                        offset = number.value as i64;
                        if negate {
                            offset = -offset;
                        }
                    }
                    _ => {
                        messages.add(Message::error(
                            loc.copy().with_column(*i as i32),
                            "expected number as label offset".to_string(),
                        ));
                        return Err(Failed);
                    }
                }
            }

            if *i >= bytes.len() || bytes[*i] != b')' {
                messages.add(Message::error(
                    loc.copy().with_column(*i as i32),
                    format!("expected ')', got {}", describe_char(text, *i)),
                ));
                messages.add(Message::note(
                    loc.copy().with_column(group_start as i32),
                    "group opened here".to_string(),
                ));
                return Err(Failed);
            }
            *i += 1;

            return Ok(Argument::Label {
                name: label,
                offset,
                is_addr: true,
            });
        }

        match parse_number(text, i) {
            Some(number) if !number.is_decimal => value = number.value,
            Some(_) => {
                messages.add(Message::error(
                    loc.copy().with_column(start as i32),
                    "memory address cannot be a decimal!".to_string(),
                ));
                return Err(Failed);
            }
            None => {
                messages.add(Message::error(
                    loc.copy().with_column(start as i32),
                    format!(
                        "expected memory address, found {} after '('",
                        describe_char(text, *i)
                    ),
                ));
                return Err(Failed);
            }
        }

        if *i >= bytes.len() || bytes[*i] != b')' {
            messages.add(Message::error(
                loc.copy().with_column(*i as i32),
                format!("expected ')', got {}", describe_char(text, *i)),
            ));
            messages.add(Message::note(
                loc.copy().with_column(group_start as i32),
                "group opened here".to_string(),
            ));
            return Err(Failed);
        }
        *i += 1;

        return Ok(Argument::Address(value));
    }

    if found_number {
        return Ok(if number_decimal {
            Argument::DecimalImmediate(value)
        } else {
            Argument::Immediate(value)
        });
    }

    messages.add(Message::error(
        loc.copy().with_column(*i as i32),
        format!("unexpected character {}", describe_char(text, *i)),
    ));
    Err(Failed)
}

fn parse_register(
    text: &str,
    i: &mut usize,
    loc: &Location,
    start: usize,
    messages: &mut MessageList,
) -> PhaseResult<u8> {
    let name_start = *i;
    crate::numbers::skip_alphanum(text, i);
    match Register::parse(&text[name_start..*i]) {
        Some(reg) => Ok(reg.index()),
        None => {
            messages.add(Message::error(
                loc.copy().with_column(start as i32),
                "unknown register".to_string(),
            ));
            Err(Failed)
        }
    }
}

/// Apply option suffixes and select an overload, then run the signature's
/// intercept.
fn parse_instruction(
    sig: &'static Signature,
    mut sig_options: String,
    arguments: Vec<Argument>,
    loc: &Location,
    options: &Options,
    messages: &mut MessageList,
) -> PhaseResult<Vec<Instruction>> {
    let mut instruction = Instruction::new(sig, arguments);

    if let Some(custom) = sig.parse {
        custom(&mut instruction, &mut sig_options, loc, messages)?;
    }

    // options = <cond>[.<datatype>]
    let dot = sig_options.find('.');
    let cond_part = match dot {
        Some(at) => sig_options[..at].to_string(),
        None => sig_options.clone(),
    };

    if sig.expect_test {
        if !cond_part.is_empty() {
            match ConditionFlag::from_suffix(&cond_part) {
                Some(flag) => {
                    if options.debug {
                        println!("Conditional test: 0x{:x} ('{}')", flag.bits(), cond_part);
                    }
                    instruction.set_conditional_test(flag);
                }
                None => {
                    messages.add(Message::error(
                        loc.copy(),
                        format!("unknown conditional test '{}'", cond_part),
                    ));
                    return Err(Failed);
                }
            }
        }
    } else if !cond_part.is_empty() && dot.is_none() {
        messages.add(Message::error(
            loc.copy(),
            format!("unexpected options after {}: '{}'", sig.mnemonic, sig_options),
        ));
        return Err(Failed);
    }

    if sig.expect_datatype {
        match dot {
            None => instruction.add_datatype(DataType::U64),
            Some(at) => {
                let dt_part = &sig_options[at + 1..];
                match DataType::from_suffix(dt_part) {
                    Some(dt) => instruction.add_datatype(dt),
                    None => {
                        messages.add(Message::error(
                            loc.copy(),
                            format!("unknown datatype specifier '{}'", dt_part),
                        ));
                        return Err(Failed);
                    }
                }
            }
        }
    } else if let Some(at) = dot {
        messages.add(Message::error(
            loc.copy(),
            format!(
                "unexpected dot-options after {}: '{}'",
                sig.mnemonic,
                &sig_options[at..]
            ),
        ));
        return Err(Failed);
    }

    // select the first overload whose arity and slot types accept the args
    let overload = sig.overloads.iter().position(|slots| {
        slots.len() == instruction.args.len()
            && instruction
                .args
                .iter()
                .zip(slots.iter())
                .all(|(arg, slot)| arg.matches_slot(*slot))
    });

    let overload = match overload {
        Some(index) => index,
        None => {
            let mut message = format!("no match for mnemonic {} with arguments ", sig.mnemonic);
            for arg in &instruction.args {
                message.push_str(arg.kind().describe());
                message.push(' ');
            }
            message.push_str("- available overloads:");
            for slots in sig.overloads {
                message.push_str(&format!("\n\t- {}", sig.mnemonic));
                for slot in *slots {
                    message.push(' ');
                    message.push_str(slot.describe());
                }
            }
            messages.add(Message::error(loc.copy(), message));
            return Err(Failed);
        }
    };
    instruction.overload = overload;

    let mut produced = Vec::new();
    match sig.intercept {
        Some(intercept) => intercept(instruction, &mut produced),
        None => produced.push(instruction),
    }
    Ok(produced)
}

/// Write the reconstructed assembly: one line per chunk, annotated with the
/// chunk's origin and byte offset.
pub fn reconstruct_assembly<W: Write>(data: &Data, out: &mut W) -> std::io::Result<()> {
    for chunk in &data.chunks {
        let path = chunk
            .source
            .path()
            .canonicalize()
            .unwrap_or_else(|_| chunk.source.path().to_path_buf());
        writeln!(
            out,
            "{}\t; {}:{}+{}",
            chunk,
            path.display(),
            chunk.source.line() + 1,
            chunk.offset
        )?;
    }
    Ok(())
}
