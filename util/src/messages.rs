use crate::Location;
use std::fmt::{self, Write as _};
use std::io::{self, Write};

/// Severity of a diagnostic. `Note`s attach context to a preceding warning
/// or error and are never fatal on their own.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Level {
    Note,
    Warning,
    Error,
}

impl Level {
    pub fn from_int(level: i32) -> Level {
        match level {
            0 => Level::Note,
            1 => Level::Warning,
            _ => Level::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Level::Note => write!(f, "note"),
            Level::Warning => write!(f, "warning"),
            Level::Error => write!(f, "error"),
        }
    }
}

/// A single diagnostic: level, optional source location, text and an
/// optional numeric code.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    level: Level,
    location: Option<Location>,
    text: String,
    code: Option<i32>,
}

impl Message {
    pub fn new(level: Level, text: impl Into<String>) -> Message {
        Message {
            level,
            location: None,
            text: text.into(),
            code: None,
        }
    }

    pub fn error(loc: Location, text: impl Into<String>) -> Message {
        Message::new(Level::Error, text).with_location(loc)
    }

    pub fn warning(loc: Location, text: impl Into<String>) -> Message {
        Message::new(Level::Warning, text).with_location(loc)
    }

    pub fn note(loc: Location, text: impl Into<String>) -> Message {
        Message::new(Level::Note, text).with_location(loc)
    }

    pub fn with_location(mut self, loc: Location) -> Message {
        self.location = Some(loc);
        self
    }

    pub fn with_code(mut self, code: i32) -> Message {
        self.code = Some(code);
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Append to the message text; mirrors the stream-style construction
    /// used when a diagnostic is assembled in several steps.
    pub fn append(&mut self, text: &str) {
        let _ = write!(self.text, "{}", text);
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(loc) = &self.location {
            write!(f, "{}: ", loc)?;
        }
        write!(f, "{}: {}", self.level, self.text)?;
        if let Some(code) = self.code {
            write!(f, " [{}]", code)?;
        }
        Ok(())
    }
}

/// Ordered collection of diagnostics. Insertion order is preserved; phases
/// abort on the first `Error` and callers test `has_error`.
#[derive(Default, Debug)]
pub struct MessageList {
    messages: Vec<Message>,
}

impl MessageList {
    pub fn new() -> MessageList {
        MessageList::default()
    }

    pub fn add(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Merge another list into this one, emptying it.
    pub fn merge(&mut self, other: &mut MessageList) {
        self.messages.append(&mut other.messages);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn has_message_of(&self, level: Level) -> bool {
        self.messages.iter().any(|m| m.level() == level)
    }

    pub fn has_error(&self) -> bool {
        self.has_message_of(Level::Error)
    }

    /// Print every message at or above `min_level` to the writer.
    pub fn print_all<W: Write>(&self, out: &mut W, min_level: Level) -> io::Result<()> {
        for message in &self.messages {
            if message.level() >= min_level || message.level() == Level::Note {
                writeln!(out, "{}", message)?;
            }
        }
        Ok(())
    }
}

/// Print messages to stderr, empty the list, and report whether an error was
/// present.
pub fn print_and_check(list: &mut MessageList) -> bool {
    let stderr = io::stderr();
    let _ = list.print_all(&mut stderr.lock(), Level::Note);
    let is_error = list.has_error();
    list.clear();
    is_error
}

/// Marker for a phase that failed after reporting into a [`MessageList`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Failed;

/// Result alias used by compilation and assembly phases: the interesting
/// error content lives in the shared message list, the `Err` variant only
/// unwinds the phase.
pub type PhaseResult<T = ()> = Result<T, Failed>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn has_error_only_counts_errors() {
        let mut list = MessageList::new();
        list.add(Message::new(Level::Warning, "w"));
        list.add(Message::new(Level::Note, "n"));
        assert!(!list.has_error());
        list.add(Message::new(Level::Error, "e"));
        assert!(list.has_error());
    }

    #[test]
    fn merge_preserves_order_and_empties_source() {
        let mut a = MessageList::new();
        let mut b = MessageList::new();
        a.add(Message::new(Level::Note, "first"));
        b.add(Message::new(Level::Note, "second"));
        a.merge(&mut b);
        assert!(b.is_empty());
        let texts: Vec<&str> = a.iter().map(|m| m.text()).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[test]
    fn display_includes_location_and_code() {
        let msg = Message::error(Location::at("x.edel", 2), "bad thing").with_code(7);
        assert_eq!(msg.to_string(), "x.edel:3: error: bad thing [7]");
    }
}
