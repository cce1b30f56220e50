//! Resolver errors

use std::fmt;

use esp_config_store::{Encoding, StoreError, StoreOp};

/// Step of a reset that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStep {
    Teardown,
    Erase,
    Init,
}

impl ResetStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetStep::Teardown => "teardown",
            ResetStep::Erase => "erase",
            ResetStep::Init => "init",
        }
    }
}

impl fmt::Display for ResetStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolver error type
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Absent from both the override store and the defaults table
    #[error("{encoding} key '{key}' not found in namespace '{namespace}' (no override, no default)")]
    NotFound {
        namespace: String,
        key: String,
        encoding: Encoding,
    },

    /// A set failed at open, write or commit
    #[error("failed to {op} {encoding} key '{key}' in namespace '{namespace}': {source}")]
    Store {
        op: StoreOp,
        namespace: String,
        key: String,
        encoding: Encoding,
        #[source]
        source: StoreError,
    },

    #[error("reset failed during {step}: {source}")]
    Reset {
        step: ResetStep,
        #[source]
        source: StoreError,
    },
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }

    /// The underlying store error, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            ResolveError::NotFound { .. } => None,
            ResolveError::Store { source, .. } | ResolveError::Reset { source, .. } => Some(source),
        }
    }
}
