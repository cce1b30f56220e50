//! esp-config override store
//!
//! The writable tier of esp-config: a namespaced key-value partition with
//! typed values, scoped handles and staged writes that become visible only
//! after commit.
//!
//! Two backends are provided:
//! - [`MemoryStore`]: volatile, with failure injection for testing fault paths
//! - [`FileStore`]: persistent JSON partition with atomic commits
//!
//! Both serialise access internally, so a store may be shared between
//! threads. Callers needing read-modify-write consistency across several
//! calls must synchronise externally.

pub mod encoding;
pub mod error;
pub mod failure;
pub mod file;
pub mod memory;
pub mod partition;
pub mod value;

use std::sync::Arc;

pub use encoding::{Encoding, UnknownEncoding};
pub use error::{StoreError, StoreOp};
pub use failure::{FailureConfig, FailureInjector};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use partition::Namespaces;
pub use value::{copy_blob, copy_str, StoredValue};

/// Maximum namespace or key length in bytes.
pub const MAX_NAME_LEN: usize = 15;

/// Maximum string value length in bytes.
pub const MAX_STR_LEN: usize = 4000;

/// Maximum blob value length in bytes.
pub const MAX_BLOB_LEN: usize = 508_000;

/// Default partition capacity in entries.
pub const DEFAULT_MAX_ENTRIES: usize = 512;

/// Access mode for [`OverrideStore::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Opaque handle to an open namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreHandle(u32);

impl StoreHandle {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

/// Capabilities required of an override store.
///
/// String and blob reads take an optional destination. Without one they
/// only report the stored length. With one they copy into it (see
/// [`copy_str`] and [`copy_blob`]) and still return the stored length, so a
/// return value larger than the destination means the copy was truncated.
pub trait OverrideStore {
    fn open(&self, namespace: &str, mode: OpenMode) -> Result<StoreHandle, StoreError>;

    fn read_i32(&self, handle: StoreHandle, key: &str) -> Result<i32, StoreError>;

    fn read_str(
        &self,
        handle: StoreHandle,
        key: &str,
        dest: Option<&mut [u8]>,
    ) -> Result<usize, StoreError>;

    fn read_blob(
        &self,
        handle: StoreHandle,
        key: &str,
        dest: Option<&mut [u8]>,
    ) -> Result<usize, StoreError>;

    fn write_i32(&self, handle: StoreHandle, key: &str, value: i32) -> Result<(), StoreError>;

    fn write_str(&self, handle: StoreHandle, key: &str, value: &str) -> Result<(), StoreError>;

    fn write_blob(&self, handle: StoreHandle, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Make staged writes visible to later opens
    fn commit(&self, handle: StoreHandle) -> Result<(), StoreError>;

    /// Release a handle. Idempotent; uncommitted writes are discarded.
    fn close(&self, handle: StoreHandle);

    /// Shut the store down; every operation but `erase_all` and `init` fails afterwards
    fn teardown(&self) -> Result<(), StoreError>;

    /// Erase every namespace
    fn erase_all(&self) -> Result<(), StoreError>;

    /// Bring the store (back) up
    fn init(&self) -> Result<(), StoreError>;
}

macro_rules! forward_store {
    ($($ty:ty),*) => {$(
        impl<T: OverrideStore + ?Sized> OverrideStore for $ty {
            fn open(&self, namespace: &str, mode: OpenMode) -> Result<StoreHandle, StoreError> {
                (**self).open(namespace, mode)
            }
            fn read_i32(&self, handle: StoreHandle, key: &str) -> Result<i32, StoreError> {
                (**self).read_i32(handle, key)
            }
            fn read_str(&self, handle: StoreHandle, key: &str, dest: Option<&mut [u8]>) -> Result<usize, StoreError> {
                (**self).read_str(handle, key, dest)
            }
            fn read_blob(&self, handle: StoreHandle, key: &str, dest: Option<&mut [u8]>) -> Result<usize, StoreError> {
                (**self).read_blob(handle, key, dest)
            }
            fn write_i32(&self, handle: StoreHandle, key: &str, value: i32) -> Result<(), StoreError> {
                (**self).write_i32(handle, key, value)
            }
            fn write_str(&self, handle: StoreHandle, key: &str, value: &str) -> Result<(), StoreError> {
                (**self).write_str(handle, key, value)
            }
            fn write_blob(&self, handle: StoreHandle, key: &str, value: &[u8]) -> Result<(), StoreError> {
                (**self).write_blob(handle, key, value)
            }
            fn commit(&self, handle: StoreHandle) -> Result<(), StoreError> {
                (**self).commit(handle)
            }
            fn close(&self, handle: StoreHandle) {
                (**self).close(handle)
            }
            fn teardown(&self) -> Result<(), StoreError> {
                (**self).teardown()
            }
            fn erase_all(&self) -> Result<(), StoreError> {
                (**self).erase_all()
            }
            fn init(&self) -> Result<(), StoreError> {
                (**self).init()
            }
        }
    )*};
}

forward_store!(&T, Box<T>, Arc<T>);
