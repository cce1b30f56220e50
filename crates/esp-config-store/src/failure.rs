//! Failure Injection for the memory store
//!
//! Supports configurable failure injection for testing error paths.

use std::collections::HashMap;

use crate::{StoreError, StoreOp};

/// Failure configuration for an operation
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Message carried by the injected error
    pub message: String,
    /// Only fail for this namespace (None = any namespace)
    pub namespace: Option<String>,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Create a config that always fails
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            namespace: None,
            fail_count: None,
        }
    }

    /// Restrict the failure to one namespace
    pub fn for_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Failure injector for the memory store
#[derive(Debug, Default)]
pub struct FailureInjector {
    /// Per-operation failure configs
    configs: HashMap<StoreOp, FailureConfig>,
    /// Call counts per operation (for fail_count tracking)
    call_counts: HashMap<StoreOp, u32>,
}

impl FailureInjector {
    /// Create a new failure injector
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for an operation
    pub fn inject(&mut self, op: StoreOp, config: FailureConfig) {
        self.configs.insert(op, config);
        self.call_counts.insert(op, 0);
    }

    /// Inject an always-failing error for an operation
    pub fn inject_error(&mut self, op: StoreOp, message: impl Into<String>) {
        self.inject(op, FailureConfig::error(message));
    }

    /// Clear all failure injections
    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// Clear failure injection for a specific operation
    pub fn clear_op(&mut self, op: StoreOp) {
        self.configs.remove(&op);
        self.call_counts.remove(&op);
    }

    /// Check whether `op` on `namespace` should fail.
    ///
    /// Returns the error to report, or `Ok(())` to proceed. Process-wide
    /// operations pass `None` as the namespace.
    pub fn check(&mut self, op: StoreOp, namespace: Option<&str>) -> Result<(), StoreError> {
        let Some(config) = self.configs.get(&op) else {
            return Ok(());
        };

        if let (Some(wanted), Some(actual)) = (config.namespace.as_deref(), namespace) {
            if wanted != actual {
                return Ok(());
            }
        }

        let count = self.call_counts.entry(op).or_insert(0);
        *count += 1;

        // Check if we should still fail based on fail_count
        if let Some(fail_limit) = config.fail_count {
            if *count > fail_limit {
                return Ok(()); // Exceeded fail count, succeed now
            }
        }

        Err(StoreError::Injected {
            op,
            message: config.message.clone(),
        })
    }
}
