//! Provenance of resolved values

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fetch::{Fetch, FetchMode};

/// Which tier supplied a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// The writable override store
    Override,
    /// The compiled-in defaults table
    Default,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Override => "override",
            Source::Default => "default",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A value together with the tier it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: Source,
}

/// The four distinguishable outcomes of a string or blob get
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    SizeFromOverride,
    SizeFromDefault,
    DataFromOverride,
    DataFromDefault,
}

/// Result of a string or blob get
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub source: Source,
    pub fetch: Fetch,
}

impl Resolved {
    pub fn mode(&self) -> FetchMode {
        self.fetch.mode
    }

    /// Stored length of the value
    pub fn size(&self) -> usize {
        self.fetch.size
    }

    /// Bytes copied into the destination
    pub fn copied(&self) -> usize {
        self.fetch.copied
    }

    pub fn is_truncated(&self) -> bool {
        self.fetch.is_truncated()
    }

    pub fn outcome(&self) -> Outcome {
        match (self.fetch.mode, self.source) {
            (FetchMode::SizeQuery, Source::Override) => Outcome::SizeFromOverride,
            (FetchMode::SizeQuery, Source::Default) => Outcome::SizeFromDefault,
            (FetchMode::Buffered, Source::Override) => Outcome::DataFromOverride,
            (FetchMode::Buffered, Source::Default) => Outcome::DataFromDefault,
        }
    }
}
