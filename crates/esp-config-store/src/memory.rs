//! In-memory override store.
//!
//! Volatile partition for tests and host tooling. Clones share state, so a
//! test can hand one clone to a resolver and inspect another.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::failure::{FailureConfig, FailureInjector};
use crate::partition::{Namespaces, Partition};
use crate::value::{copy_blob, copy_str};
use crate::{
    Encoding, OpenMode, OverrideStore, StoreError, StoreHandle, StoreOp, StoredValue,
    DEFAULT_MAX_ENTRIES,
};

/// Thread-safe in-memory store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug)]
struct MemoryStoreInner {
    partition: Partition,
    /// Failure injection configuration.
    failures: FailureInjector,
    /// Namespace of each open handle, for namespace-scoped injection.
    handle_namespaces: std::collections::HashMap<u32, String>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    /// Create an empty store holding at most `max_entries` entries
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                partition: Partition::new(max_entries),
                failures: FailureInjector::new(),
                handle_namespaces: Default::default(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inject a failure for an operation
    pub fn inject_failure(&self, op: StoreOp, config: FailureConfig) {
        self.lock().failures.inject(op, config);
    }

    /// Clear failure injection for one operation
    pub fn clear_failure(&self, op: StoreOp) {
        self.lock().failures.clear_op(op);
    }

    /// Clear all failure injections
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Number of handles not yet closed
    pub fn open_handles(&self) -> usize {
        self.lock().partition.open_handles()
    }

    /// Total committed entries
    pub fn entry_count(&self) -> usize {
        self.lock().partition.entry_count()
    }

    /// Copy of the committed contents
    pub fn snapshot(&self) -> Namespaces {
        self.lock().partition.namespaces().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().partition.is_initialized()
    }
}

impl MemoryStoreInner {
    fn namespace_of(&self, handle: StoreHandle) -> Option<&str> {
        self.handle_namespaces.get(&handle.id()).map(String::as_str)
    }

    fn check(&mut self, op: StoreOp, handle: StoreHandle) -> Result<(), StoreError> {
        let namespace = self.namespace_of(handle).map(str::to_string);
        self.failures.check(op, namespace.as_deref())
    }

    fn read(
        &mut self,
        handle: StoreHandle,
        key: &str,
        expected: Encoding,
    ) -> Result<&StoredValue, StoreError> {
        self.check(StoreOp::Read, handle)?;
        self.partition.read(handle, key, expected)
    }

    fn write(
        &mut self,
        handle: StoreHandle,
        key: &str,
        value: StoredValue,
    ) -> Result<(), StoreError> {
        self.check(StoreOp::Write, handle)?;
        self.partition.stage(handle, key, value)
    }
}

impl OverrideStore for MemoryStore {
    fn open(&self, namespace: &str, mode: OpenMode) -> Result<StoreHandle, StoreError> {
        let mut inner = self.lock();
        inner.failures.check(StoreOp::Open, Some(namespace))?;
        let handle = inner.partition.open(namespace, mode)?;
        inner
            .handle_namespaces
            .insert(handle.id(), namespace.to_string());
        Ok(handle)
    }

    fn read_i32(&self, handle: StoreHandle, key: &str) -> Result<i32, StoreError> {
        match self.lock().read(handle, key, Encoding::I32)? {
            StoredValue::I32(v) => Ok(*v),
            other => Err(mismatch(key, Encoding::I32, other)),
        }
    }

    fn read_str(
        &self,
        handle: StoreHandle,
        key: &str,
        dest: Option<&mut [u8]>,
    ) -> Result<usize, StoreError> {
        let mut inner = self.lock();
        match inner.read(handle, key, Encoding::Str)? {
            StoredValue::Str(s) => {
                if let Some(dest) = dest {
                    copy_str(s.as_bytes(), dest);
                }
                Ok(s.len())
            }
            other => Err(mismatch(key, Encoding::Str, other)),
        }
    }

    fn read_blob(
        &self,
        handle: StoreHandle,
        key: &str,
        dest: Option<&mut [u8]>,
    ) -> Result<usize, StoreError> {
        let mut inner = self.lock();
        match inner.read(handle, key, Encoding::Blob)? {
            StoredValue::Blob(b) => {
                if let Some(dest) = dest {
                    copy_blob(b, dest);
                }
                Ok(b.len())
            }
            other => Err(mismatch(key, Encoding::Blob, other)),
        }
    }

    fn write_i32(&self, handle: StoreHandle, key: &str, value: i32) -> Result<(), StoreError> {
        self.lock().write(handle, key, StoredValue::I32(value))
    }

    fn write_str(&self, handle: StoreHandle, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()
            .write(handle, key, StoredValue::Str(value.to_string()))
    }

    fn write_blob(&self, handle: StoreHandle, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.lock()
            .write(handle, key, StoredValue::Blob(value.to_vec()))
    }

    fn commit(&self, handle: StoreHandle) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check(StoreOp::Commit, handle)?;
        inner.partition.commit_with(handle, |_| Ok(()))
    }

    fn close(&self, handle: StoreHandle) {
        let mut inner = self.lock();
        inner.handle_namespaces.remove(&handle.id());
        inner.partition.close(handle);
    }

    fn teardown(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.failures.check(StoreOp::Teardown, None)?;
        inner.handle_namespaces.clear();
        inner.partition.teardown()
    }

    fn erase_all(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.failures.check(StoreOp::Erase, None)?;
        inner.handle_namespaces.clear();
        inner.partition.erase();
        Ok(())
    }

    fn init(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.failures.check(StoreOp::Init, None)?;
        // Teardown keeps contents in memory; init brings them back
        let contents = inner.partition.namespaces().clone();
        inner.partition.init(contents);
        Ok(())
    }
}

pub(crate) fn mismatch(key: &str, expected: Encoding, found: &StoredValue) -> StoreError {
    StoreError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.encoding(),
    }
}
