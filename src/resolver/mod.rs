//! Two-tier value resolution
//!
//! Reads try the override store first and fall back to the defaults table:
//!
//! 1. open the namespace read-only; on failure go to 3
//! 2. typed read; on success return `Source::Override`, on any failure go to 3
//! 3. look up the defaults table; on success return `Source::Default`,
//!    otherwise `ResolveError::NotFound`
//!
//! Override-tier failures in steps 1 and 2 are logged and never surfaced.
//! The store handle lives only for the read attempt and is closed before
//! the defaults are consulted. A size query stays a size query in both
//! tiers, and one call's answer always comes from a single tier.
//!
//! Writes go only to the override store (open, write, commit, close) and
//! never fall back. Every get re-opens the store; nothing is cached.

mod error;
mod outcome;
mod session;

use esp_config_store::{Encoding, OpenMode, OverrideStore, StoreError, StoreHandle, StoreOp};
use tracing::{debug, error, warn};

use crate::defaults::{DefaultValue, DefaultsTable};
use crate::fetch::Fetch;

pub use error::{ResetStep, ResolveError};
pub use outcome::{Outcome, Resolved, Source, Sourced};

use session::Session;

/// Fetch attempts for owned reads whose stored size keeps changing
const OWNED_READ_ATTEMPTS: usize = 3;

/// Resolves typed configuration values against an override store and a
/// defaults table.
#[derive(Debug)]
pub struct Resolver<'d, S> {
    store: S,
    defaults: &'d DefaultsTable,
}

impl<'d, S: OverrideStore> Resolver<'d, S> {
    pub fn new(store: S, defaults: &'d DefaultsTable) -> Self {
        Self { store, defaults }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn defaults(&self) -> &'d DefaultsTable {
        self.defaults
    }

    /// Resolve a 32-bit integer
    pub fn get_i32(&self, namespace: &str, key: &str) -> Result<Sourced<i32>, ResolveError> {
        if let Some(value) = self.from_override(namespace, key, Encoding::I32, |store, handle| {
            store.read_i32(handle, key)
        }) {
            return Ok(Sourced {
                value,
                source: Source::Override,
            });
        }

        self.defaults
            .get_i32(namespace, key)
            .map(|value| {
                debug!(namespace, key, "resolved i32 from defaults");
                Sourced {
                    value,
                    source: Source::Default,
                }
            })
            .ok_or_else(|| not_found(namespace, key, Encoding::I32))
    }

    /// Resolve a string.
    ///
    /// With `dest` = None only the size is reported. Otherwise the string is
    /// copied into `dest` with bounded-copy rules and the stored size is
    /// still reported, so `size() > dest.len()` means truncation.
    pub fn get_str(
        &self,
        namespace: &str,
        key: &str,
        mut dest: Option<&mut [u8]>,
    ) -> Result<Resolved, ResolveError> {
        let dest_len = dest.as_ref().map(|d| d.len());

        if let Some(size) = self.from_override(namespace, key, Encoding::Str, |store, handle| {
            store.read_str(handle, key, dest.as_deref_mut())
        }) {
            return Ok(self.resolved(namespace, key, Source::Override, size, dest_len));
        }

        self.defaults
            .get_str(namespace, key, dest)
            .map(|fetch| self.from_default(namespace, key, fetch))
            .ok_or_else(|| not_found(namespace, key, Encoding::Str))
    }

    /// Resolve a blob.
    ///
    /// Same contract as [`get_str`](Self::get_str), except that the copy
    /// writes exactly `min(size, dest.len())` bytes.
    pub fn get_blob(
        &self,
        namespace: &str,
        key: &str,
        mut dest: Option<&mut [u8]>,
    ) -> Result<Resolved, ResolveError> {
        let dest_len = dest.as_ref().map(|d| d.len());

        if let Some(size) = self.from_override(namespace, key, Encoding::Blob, |store, handle| {
            store.read_blob(handle, key, dest.as_deref_mut())
        }) {
            return Ok(self.resolved(namespace, key, Source::Override, size, dest_len));
        }

        self.defaults
            .get_blob(namespace, key, dest)
            .map(|fetch| self.from_default(namespace, key, fetch))
            .ok_or_else(|| not_found(namespace, key, Encoding::Blob))
    }

    /// Resolve a string into an owned value.
    ///
    /// The size query and the fetch share one store handle, so the value
    /// comes whole from a single tier.
    pub fn get_string(&self, namespace: &str, key: &str) -> Result<Sourced<String>, ResolveError> {
        if let Some(bytes) = self.from_override(namespace, key, Encoding::Str, |store, handle| {
            read_owned(key, |dest| store.read_str(handle, key, dest))
        }) {
            let value = match String::from_utf8(bytes) {
                Ok(s) => s,
                Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
            };
            return Ok(Sourced {
                value,
                source: Source::Override,
            });
        }

        self.owned_default(namespace, key, Encoding::Str, |v| v.as_str().map(str::to_string))
    }

    /// Resolve a blob into an owned value; same contract as
    /// [`get_string`](Self::get_string)
    pub fn get_blob_vec(&self, namespace: &str, key: &str) -> Result<Sourced<Vec<u8>>, ResolveError> {
        if let Some(value) = self.from_override(namespace, key, Encoding::Blob, |store, handle| {
            read_owned(key, |dest| store.read_blob(handle, key, dest))
        }) {
            return Ok(Sourced {
                value,
                source: Source::Override,
            });
        }

        self.owned_default(namespace, key, Encoding::Blob, |v| v.as_bytes().map(<[u8]>::to_vec))
    }

    /// Store a 32-bit integer override
    pub fn set_i32(&self, namespace: &str, key: &str, value: i32) -> Result<(), ResolveError> {
        self.write(namespace, key, Encoding::I32, |store, handle| {
            store.write_i32(handle, key, value)
        })
    }

    /// Store a string override
    pub fn set_str(&self, namespace: &str, key: &str, value: &str) -> Result<(), ResolveError> {
        self.write(namespace, key, Encoding::Str, |store, handle| {
            store.write_str(handle, key, value)
        })
    }

    /// Store a blob override
    pub fn set_blob(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), ResolveError> {
        self.write(namespace, key, Encoding::Blob, |store, handle| {
            store.write_blob(handle, key, value)
        })
    }

    /// Erase every override in every namespace.
    ///
    /// Runs teardown, erase and init in order; the first failing step aborts
    /// the sequence and is reported.
    pub fn reset(&self) -> Result<(), ResolveError> {
        let fault = |step: ResetStep, source: StoreError| {
            error!(%step, error = %source, "override store reset failed");
            ResolveError::Reset { step, source }
        };

        self.store
            .teardown()
            .map_err(|e| fault(ResetStep::Teardown, e))?;
        self.store
            .erase_all()
            .map_err(|e| fault(ResetStep::Erase, e))?;
        self.store.init().map_err(|e| fault(ResetStep::Init, e))?;

        debug!("override store reset");
        Ok(())
    }

    /// Phase 1: one read attempt against the override store.
    ///
    /// Returns None on any failure. The handle is closed before returning.
    fn from_override<T, F>(&self, namespace: &str, key: &str, encoding: Encoding, read: F) -> Option<T>
    where
        F: FnOnce(&S, StoreHandle) -> Result<T, StoreError>,
    {
        let session = match Session::open(&self.store, namespace, OpenMode::ReadOnly) {
            Ok(session) => session,
            Err(e) => {
                log_miss(namespace, key, encoding, StoreOp::Open, &e);
                return None;
            }
        };

        match read(&self.store, session.handle()) {
            Ok(value) => {
                debug!(namespace, key, %encoding, "resolved from override store");
                Some(value)
            }
            Err(e) => {
                log_miss(namespace, key, encoding, StoreOp::Read, &e);
                None
            }
        }
    }

    fn resolved(
        &self,
        namespace: &str,
        key: &str,
        source: Source,
        size: usize,
        dest_len: Option<usize>,
    ) -> Resolved {
        let fetch = match dest_len {
            None => Fetch::size_query(size),
            Some(len) => Fetch::buffered(size, len),
        };
        let resolved = Resolved { source, fetch };
        log_truncation(namespace, key, &resolved);
        resolved
    }

    fn from_default(&self, namespace: &str, key: &str, fetch: Fetch) -> Resolved {
        debug!(namespace, key, "resolved from defaults");
        let resolved = Resolved {
            source: Source::Default,
            fetch,
        };
        log_truncation(namespace, key, &resolved);
        resolved
    }

    fn owned_default<T>(
        &self,
        namespace: &str,
        key: &str,
        encoding: Encoding,
        extract: impl FnOnce(&DefaultValue) -> Option<T>,
    ) -> Result<Sourced<T>, ResolveError> {
        self.defaults
            .lookup(namespace, key, encoding)
            .and_then(extract)
            .map(|value| {
                debug!(namespace, key, %encoding, "resolved from defaults");
                Sourced {
                    value,
                    source: Source::Default,
                }
            })
            .ok_or_else(|| not_found(namespace, key, encoding))
    }

    /// Open read-write, write, commit. The handle closes on every path.
    fn write<F>(&self, namespace: &str, key: &str, encoding: Encoding, write: F) -> Result<(), ResolveError>
    where
        F: FnOnce(&S, StoreHandle) -> Result<(), StoreError>,
    {
        let fault = |op: StoreOp, source: StoreError| {
            error!(namespace, key, %encoding, %op, error = %source, "failed to store override");
            ResolveError::Store {
                op,
                namespace: namespace.to_string(),
                key: key.to_string(),
                encoding,
                source,
            }
        };

        let session = Session::open(&self.store, namespace, OpenMode::ReadWrite)
            .map_err(|e| fault(StoreOp::Open, e))?;
        write(&self.store, session.handle()).map_err(|e| fault(StoreOp::Write, e))?;
        self.store
            .commit(session.handle())
            .map_err(|e| fault(StoreOp::Commit, e))?;

        if self.defaults.lookup(namespace, key, encoding).is_none() {
            debug!(namespace, key, %encoding, "stored override has no matching default");
        }
        debug!(namespace, key, %encoding, "stored override");
        Ok(())
    }
}

/// Size query then fetch through one handle. A stored size that moves
/// between the two reads is retried a bounded number of times.
fn read_owned<F>(key: &str, mut read: F) -> Result<Vec<u8>, StoreError>
where
    F: FnMut(Option<&mut [u8]>) -> Result<usize, StoreError>,
{
    let mut size = read(None)?;
    for _ in 0..OWNED_READ_ATTEMPTS {
        let mut buf = vec![0u8; size];
        let stored = read(Some(&mut buf))?;
        if stored == size {
            return Ok(buf);
        }
        size = stored;
    }
    Err(StoreError::Changed(key.to_string()))
}

fn log_miss(namespace: &str, key: &str, encoding: Encoding, op: StoreOp, e: &StoreError) {
    if e.is_not_found() {
        debug!(namespace, key, %encoding, %op, error = %e, "no override, falling back to defaults");
    } else {
        warn!(namespace, key, %encoding, %op, error = %e, "override store unavailable, falling back to defaults");
    }
}

fn log_truncation(namespace: &str, key: &str, resolved: &Resolved) {
    if resolved.is_truncated() {
        warn!(
            namespace,
            key,
            size = resolved.size(),
            copied = resolved.copied(),
            source = %resolved.source,
            "destination smaller than stored value; copy truncated"
        );
    }
}

fn not_found(namespace: &str, key: &str, encoding: Encoding) -> ResolveError {
    ResolveError::NotFound {
        namespace: namespace.to_string(),
        key: key.to_string(),
        encoding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{Entry, Namespace, EXAMPLE_TABLE};
    use esp_config_store::{FailureConfig, MemoryStore};

    fn resolver(store: &MemoryStore) -> Resolver<'static, &MemoryStore> {
        Resolver::new(store, &EXAMPLE_TABLE)
    }

    #[test]
    fn test_example_end_to_end() {
        let store = MemoryStore::new();
        let r = resolver(&store);

        let got = r.get_i32("example", "i32").unwrap();
        assert_eq!(got, Sourced { value: 12345, source: Source::Default });

        r.set_i32("example", "i32", 777).unwrap();
        let got = r.get_i32("example", "i32").unwrap();
        assert_eq!(got, Sourced { value: 777, source: Source::Override });

        r.reset().unwrap();
        let got = r.get_i32("example", "i32").unwrap();
        assert_eq!(got, Sourced { value: 12345, source: Source::Default });
    }

    #[test]
    fn test_str_size_query_then_fetch_from_defaults() {
        let store = MemoryStore::new();
        let r = resolver(&store);

        let sized = r.get_str("example", "str", None).unwrap();
        assert_eq!(sized.outcome(), Outcome::SizeFromDefault);
        assert_eq!(sized.size(), 6);

        let mut buf = [0u8; 6];
        let fetched = r.get_str("example", "str", Some(&mut buf)).unwrap();
        assert_eq!(fetched.outcome(), Outcome::DataFromDefault);
        assert_eq!(&buf, b"abcdef");
    }

    #[test]
    fn test_str_override_outcomes() {
        let store = MemoryStore::new();
        let r = resolver(&store);
        r.set_str("example", "str", "overridden").unwrap();

        let sized = r.get_str("example", "str", None).unwrap();
        assert_eq!(sized.outcome(), Outcome::SizeFromOverride);
        assert_eq!(sized.size(), 10);

        let mut buf = vec![0u8; sized.size()];
        let fetched = r.get_str("example", "str", Some(&mut buf)).unwrap();
        assert_eq!(fetched.outcome(), Outcome::DataFromOverride);
        assert_eq!(buf, b"overridden");
    }

    #[test]
    fn test_encoding_mismatch_in_store_falls_back() {
        let store = MemoryStore::new();
        let r = resolver(&store);
        // "i32" stored as a string: invisible to an i32 get
        r.set_str("example", "i32", "not a number").unwrap();

        let got = r.get_i32("example", "i32").unwrap();
        assert_eq!(got.source, Source::Default);
        assert_eq!(got.value, 12345);
    }

    #[test]
    fn test_encoding_mismatch_in_defaults_is_not_found() {
        let store = MemoryStore::new();
        let r = resolver(&store);
        let err = r.get_i32("example", "str").unwrap_err();
        assert!(matches!(
            err,
            ResolveError::NotFound { encoding: Encoding::I32, .. }
        ));
    }

    #[test]
    fn test_not_found_anywhere() {
        let store = MemoryStore::new();
        let r = resolver(&store);
        let err = r.get_blob("nowhere", "nothing", None).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.store_error().is_none());
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn test_store_open_failure_falls_back() {
        let store = MemoryStore::new();
        let r = resolver(&store);
        r.set_i32("example", "i32", 5).unwrap();
        store.inject_failure(StoreOp::Open, FailureConfig::error("partition missing"));

        let got = r.get_i32("example", "i32").unwrap();
        assert_eq!(got, Sourced { value: 12345, source: Source::Default });
    }

    #[test]
    fn test_store_read_failure_falls_back_and_releases_handle() {
        let store = MemoryStore::new();
        let r = resolver(&store);
        r.set_blob("example", "blob", b"xyz").unwrap();
        store.inject_failure(StoreOp::Read, FailureConfig::error("page corrupt"));

        let got = r.get_blob_vec("example", "blob").unwrap();
        assert_eq!(got.value, b"abcdef");
        assert_eq!(got.source, Source::Default);
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn test_set_commit_failure_is_reported_and_not_readable() {
        let store = MemoryStore::new();
        let r = resolver(&store);
        store.inject_failure(StoreOp::Commit, FailureConfig::error("flash write"));

        let err = r.set_i32("example", "i32", 777).unwrap_err();
        assert!(matches!(err, ResolveError::Store { op: StoreOp::Commit, .. }));
        assert!(matches!(err.store_error(), Some(StoreError::Injected { .. })));
        assert_eq!(store.open_handles(), 0);

        store.clear_failures();
        let got = r.get_i32("example", "i32").unwrap();
        assert_eq!(got.source, Source::Default);
    }

    #[test]
    fn test_set_write_and_open_failures() {
        let store = MemoryStore::new();
        let r = resolver(&store);

        store.inject_failure(StoreOp::Write, FailureConfig::error("no"));
        let err = r.set_str("example", "str", "x").unwrap_err();
        assert!(matches!(err, ResolveError::Store { op: StoreOp::Write, .. }));
        assert_eq!(store.open_handles(), 0);

        store.clear_failures();
        store.inject_failure(StoreOp::Open, FailureConfig::error("no"));
        let err = r.set_str("example", "str", "x").unwrap_err();
        assert!(matches!(err, ResolveError::Store { op: StoreOp::Open, .. }));
    }

    #[test]
    fn test_set_without_default_is_permitted() {
        let store = MemoryStore::new();
        let r = resolver(&store);
        r.set_i32("custom", "counter", 3).unwrap();
        assert_eq!(
            r.get_i32("custom", "counter").unwrap(),
            Sourced { value: 3, source: Source::Override }
        );
    }

    #[test]
    fn test_reset_reports_failing_step() {
        let store = MemoryStore::new();
        let r = resolver(&store);
        r.set_i32("example", "i32", 1).unwrap();
        store.inject_failure(StoreOp::Erase, FailureConfig::error("erase timeout"));

        let err = r.reset().unwrap_err();
        assert!(matches!(err, ResolveError::Reset { step: ResetStep::Erase, .. }));
        assert!(err.to_string().contains("during erase"));
        // Aborted before init
        assert!(!store.is_initialized());
    }

    #[test]
    fn test_reset_teardown_failure_keeps_overrides() {
        let store = MemoryStore::new();
        let r = resolver(&store);
        r.set_i32("example", "i32", 1).unwrap();
        store.inject_failure(StoreOp::Teardown, FailureConfig::error("busy"));

        let err = r.reset().unwrap_err();
        assert!(matches!(err, ResolveError::Reset { step: ResetStep::Teardown, .. }));
        store.clear_failures();
        assert_eq!(r.get_i32("example", "i32").unwrap().source, Source::Override);
    }

    #[test]
    fn test_blob_truncation_from_override() {
        let store = MemoryStore::new();
        let r = resolver(&store);
        r.set_blob("example", "blob", &[9, 8, 7, 6, 5]).unwrap();

        let mut buf = [0u8; 3];
        let got = r.get_blob("example", "blob", Some(&mut buf)).unwrap();
        assert_eq!(got.source, Source::Override);
        assert_eq!(got.size(), 5);
        assert_eq!(got.copied(), 3);
        assert!(got.is_truncated());
        assert_eq!(buf, [9, 8, 7]);
    }

    #[test]
    fn test_blob_truncation_from_default() {
        let store = MemoryStore::new();
        let r = resolver(&store);

        let mut buf = [0u8; 4];
        let got = r.get_blob("example", "blob", Some(&mut buf)).unwrap();
        assert_eq!(got.outcome(), Outcome::DataFromDefault);
        assert!(got.is_truncated());
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn test_same_key_different_encodings() {
        const ENTRIES: &[Entry] = &[Entry::i32("port", 80), Entry::str("port", "http")];
        const NAMESPACES: &[Namespace] = &[Namespace::from_static("net", ENTRIES)];
        static TABLE: DefaultsTable = DefaultsTable::from_static(NAMESPACES);

        let store = MemoryStore::new();
        let r = Resolver::new(&store, &TABLE);
        assert_eq!(r.get_i32("net", "port").unwrap().value, 80);
        assert_eq!(r.get_string("net", "port").unwrap().value, "http");
    }

    /// Wraps a store; string reads misbehave on chosen calls
    struct UnsteadyReads {
        inner: MemoryStore,
        calls: std::cell::Cell<u32>,
        fail_on: Option<u32>,
        /// Reported size is short by one on the first call
        stale_first_size: bool,
    }

    impl UnsteadyReads {
        fn new(inner: MemoryStore) -> Self {
            Self {
                inner,
                calls: std::cell::Cell::new(0),
                fail_on: None,
                stale_first_size: false,
            }
        }
    }

    impl OverrideStore for UnsteadyReads {
        fn open(&self, namespace: &str, mode: OpenMode) -> Result<StoreHandle, StoreError> {
            self.inner.open(namespace, mode)
        }
        fn read_i32(&self, handle: StoreHandle, key: &str) -> Result<i32, StoreError> {
            self.inner.read_i32(handle, key)
        }
        fn read_str(&self, handle: StoreHandle, key: &str, dest: Option<&mut [u8]>) -> Result<usize, StoreError> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if self.fail_on == Some(call) {
                return Err(StoreError::Injected {
                    op: StoreOp::Read,
                    message: "page read failed".into(),
                });
            }
            let size = self.inner.read_str(handle, key, dest)?;
            Ok(if self.stale_first_size && call == 1 { size - 1 } else { size })
        }
        fn read_blob(&self, handle: StoreHandle, key: &str, dest: Option<&mut [u8]>) -> Result<usize, StoreError> {
            self.inner.read_blob(handle, key, dest)
        }
        fn write_i32(&self, handle: StoreHandle, key: &str, value: i32) -> Result<(), StoreError> {
            self.inner.write_i32(handle, key, value)
        }
        fn write_str(&self, handle: StoreHandle, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.write_str(handle, key, value)
        }
        fn write_blob(&self, handle: StoreHandle, key: &str, value: &[u8]) -> Result<(), StoreError> {
            self.inner.write_blob(handle, key, value)
        }
        fn commit(&self, handle: StoreHandle) -> Result<(), StoreError> {
            self.inner.commit(handle)
        }
        fn close(&self, handle: StoreHandle) {
            self.inner.close(handle)
        }
        fn teardown(&self) -> Result<(), StoreError> {
            self.inner.teardown()
        }
        fn erase_all(&self) -> Result<(), StoreError> {
            self.inner.erase_all()
        }
        fn init(&self) -> Result<(), StoreError> {
            self.inner.init()
        }
    }

    #[test]
    fn test_get_string_fetch_failure_falls_back_whole() {
        let inner = MemoryStore::new();
        resolver(&inner).set_str("example", "str", "xyz").unwrap();

        // Size query succeeds, the fetch that follows fails
        let store = UnsteadyReads {
            fail_on: Some(2),
            ..UnsteadyReads::new(inner.clone())
        };
        let r = Resolver::new(&store, &EXAMPLE_TABLE);

        let got = r.get_string("example", "str").unwrap();
        assert_eq!(got.value, "abcdef");
        assert_eq!(got.source, Source::Default);
        assert_eq!(inner.open_handles(), 0);
    }

    #[test]
    fn test_get_string_retries_when_size_moves() {
        let inner = MemoryStore::new();
        resolver(&inner).set_str("example", "str", "override").unwrap();

        let store = UnsteadyReads {
            stale_first_size: true,
            ..UnsteadyReads::new(inner)
        };
        let r = Resolver::new(&store, &EXAMPLE_TABLE);

        let got = r.get_string("example", "str").unwrap();
        assert_eq!(got.value, "override");
        assert_eq!(got.source, Source::Override);
        assert_eq!(store.calls.get(), 3);
    }

    #[test]
    fn test_read_owned_gives_up_on_unstable_size() {
        let mut next = 0usize;
        let err = read_owned("k", |_| {
            next += 1;
            Ok(next)
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::Changed(ref k) if k == "k"));
    }

    #[test]
    fn test_write_of_other_kind_replaces_override() {
        let store = MemoryStore::new();
        let r = resolver(&store);
        r.set_i32("example", "i32", 777).unwrap();
        r.set_str("example", "i32", "text").unwrap();

        // One override entry per key: the string replaced the integer
        assert_eq!(
            r.get_i32("example", "i32").unwrap(),
            Sourced { value: 12345, source: Source::Default }
        );
        assert_eq!(
            r.get_string("example", "i32").unwrap(),
            Sourced { value: "text".to_string(), source: Source::Override }
        );
    }
}
