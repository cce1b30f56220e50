//! Value encodings
//!
//! The full tag set mirrors the NVS type family. Only `I32`, `Str` and
//! `Blob` are implemented; the remaining tags are reserved.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Encoding tag of a stored or default value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    Str,
    Blob,
}

impl Encoding {
    /// Every tag, in declaration order
    pub const ALL: [Encoding; 10] = [
        Encoding::U8,
        Encoding::I8,
        Encoding::U16,
        Encoding::I16,
        Encoding::U32,
        Encoding::I32,
        Encoding::U64,
        Encoding::I64,
        Encoding::Str,
        Encoding::Blob,
    ];

    /// Returns the string representation of the encoding
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::U8 => "u8",
            Encoding::I8 => "i8",
            Encoding::U16 => "u16",
            Encoding::I16 => "i16",
            Encoding::U32 => "u32",
            Encoding::I32 => "i32",
            Encoding::U64 => "u64",
            Encoding::I64 => "i64",
            Encoding::Str => "str",
            Encoding::Blob => "blob",
        }
    }

    /// Whether values of this encoding can be stored and resolved
    pub fn is_implemented(&self) -> bool {
        matches!(self, Encoding::I32 | Encoding::Str | Encoding::Blob)
    }

    /// Whether the encoding carries an explicit byte length
    pub fn is_variable_length(&self) -> bool {
        matches!(self, Encoding::Str | Encoding::Blob)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown encoding name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown encoding '{0}'")]
pub struct UnknownEncoding(pub String);

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "string" => return Ok(Encoding::Str),
            "int32" => return Ok(Encoding::I32),
            _ => {}
        }
        Encoding::ALL
            .into_iter()
            .find(|e| e.as_str() == lower)
            .ok_or_else(|| UnknownEncoding(s.to_string()))
    }
}
