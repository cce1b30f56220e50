//! Override store errors

use std::fmt;
use std::io;

use thiserror::Error;

use crate::Encoding;

/// Store operation, used to tag faults and failure injections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Open,
    Read,
    Write,
    Commit,
    Teardown,
    Erase,
    Init,
}

impl StoreOp {
    /// Returns the string representation of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOp::Open => "open",
            StoreOp::Read => "read",
            StoreOp::Write => "write",
            StoreOp::Commit => "commit",
            StoreOp::Teardown => "teardown",
            StoreOp::Erase => "erase",
            StoreOp::Init => "init",
        }
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors from override store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store not initialized")]
    NotInitialized,

    #[error("namespace '{0}' not found")]
    NamespaceNotFound(String),

    #[error("key '{key}' not found in namespace '{namespace}'")]
    KeyNotFound { namespace: String, key: String },

    #[error("key '{key}' holds a {found} value, not {expected}")]
    TypeMismatch {
        key: String,
        expected: Encoding,
        found: Encoding,
    },

    #[error("invalid name '{0}': names must be 1 to 15 bytes")]
    InvalidName(String),

    #[error("invalid or closed handle {0}")]
    InvalidHandle(u32),

    #[error("handle for namespace '{0}' was opened read-only")]
    ReadOnly(String),

    #[error("{encoding} value of {len} bytes exceeds the {max} byte limit")]
    ValueTooLarge {
        encoding: Encoding,
        len: usize,
        max: usize,
    },

    #[error("no space left: partition is limited to {max_entries} entries")]
    NoSpace { max_entries: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt store: {0}")]
    Corrupt(String),

    #[error("value of '{0}' kept changing while it was read")]
    Changed(String),

    #[error("injected {op} failure: {message}")]
    Injected { op: StoreOp, message: String },
}

impl StoreError {
    /// True for plain absence, as opposed to a fault
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NamespaceNotFound(_) | StoreError::KeyNotFound { .. }
        )
    }
}
