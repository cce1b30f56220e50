//! Outcome of a variable-length fetch

use serde::{Deserialize, Serialize};

/// Whether a call only asked for the size or copied data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// No destination given; only the stored size was reported
    SizeQuery,
    /// Data was copied into the destination
    Buffered,
}

/// Result of a string or blob fetch from one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fetch {
    pub mode: FetchMode,
    /// Stored length of the value in bytes
    pub size: usize,
    /// Bytes written to the destination (0 for size queries)
    pub copied: usize,
}

impl Fetch {
    pub fn size_query(size: usize) -> Self {
        Self {
            mode: FetchMode::SizeQuery,
            size,
            copied: 0,
        }
    }

    pub fn buffered(size: usize, dest_len: usize) -> Self {
        Self {
            mode: FetchMode::Buffered,
            size,
            copied: size.min(dest_len),
        }
    }

    /// True when the destination was too small for the stored value
    pub fn is_truncated(&self) -> bool {
        self.mode == FetchMode::Buffered && self.copied < self.size
    }
}
