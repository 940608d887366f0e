//! Support types shared by every crate in the edel toolchain: source
//! [`Location`](location/struct.Location.html)s, leveled diagnostic
//! [`Message`](messages/struct.Message.html)s, and enum parsing helpers.

use std::{error::Error, fmt};

pub mod location;
pub mod messages;

pub use location::Location;
pub use messages::{Failed, Level, Message, MessageList, PhaseResult};

pub type Endian = byteorder::LittleEndian;

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ParseEnumError {
    pub value: String,
    pub enum_name: &'static str,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Failed to parse \"{}\" as {}.",
            &self.value, &self.enum_name
        )
    }
}

impl Error for ParseEnumError {}

pub trait EnumFromStr: Sized {
    fn from_str(s: &str) -> Result<Self, ParseEnumError>;
}

/// Access to the lowercase spelling of each variant, as written in assembly
/// source (`$sp`, `add`, ...).
pub trait EnumVariantNames {
    fn variant_name(&self) -> &'static str;
}
