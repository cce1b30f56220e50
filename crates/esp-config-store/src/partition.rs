//! Partition engine shared by the store backends.
//!
//! Holds committed namespaces, open handles and their staged writes.
//! Backends wrap a `Partition` in a mutex and add persistence or failure
//! injection on top.

use std::collections::{BTreeMap, HashMap};

use crate::{Encoding, OpenMode, StoreError, StoreHandle, StoredValue, MAX_NAME_LEN};

/// Committed contents: namespace -> key -> value
pub type Namespaces = BTreeMap<String, BTreeMap<String, StoredValue>>;

#[derive(Debug)]
struct OpenHandle {
    namespace: String,
    mode: OpenMode,
    /// Writes not yet committed
    staged: BTreeMap<String, StoredValue>,
}

/// In-memory partition state
#[derive(Debug)]
pub struct Partition {
    namespaces: Namespaces,
    handles: HashMap<u32, OpenHandle>,
    next_handle: u32,
    initialized: bool,
    max_entries: usize,
}

/// Validate a namespace or key name
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl Partition {
    /// Create an initialized, empty partition
    pub fn new(max_entries: usize) -> Self {
        Self {
            namespaces: Namespaces::new(),
            handles: HashMap::new(),
            next_handle: 1,
            initialized: true,
            max_entries,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Committed contents
    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Total committed entries across all namespaces
    pub fn entry_count(&self) -> usize {
        self.namespaces.values().map(BTreeMap::len).sum()
    }

    /// Number of handles not yet closed
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    fn ensure_initialized(&self) -> Result<(), StoreError> {
        if self.initialized {
            Ok(())
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    fn handle(&self, handle: StoreHandle) -> Result<&OpenHandle, StoreError> {
        self.ensure_initialized()?;
        self.handles
            .get(&handle.id())
            .ok_or(StoreError::InvalidHandle(handle.id()))
    }

    /// Open a namespace.
    ///
    /// Read-only opens require the namespace to hold committed entries.
    /// Read-write opens always succeed; the namespace appears on commit.
    pub fn open(&mut self, namespace: &str, mode: OpenMode) -> Result<StoreHandle, StoreError> {
        self.ensure_initialized()?;
        validate_name(namespace)?;

        if mode == OpenMode::ReadOnly && !self.namespaces.contains_key(namespace) {
            return Err(StoreError::NamespaceNotFound(namespace.to_string()));
        }

        let id = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        self.handles.insert(
            id,
            OpenHandle {
                namespace: namespace.to_string(),
                mode,
                staged: BTreeMap::new(),
            },
        );
        Ok(StoreHandle::new(id))
    }

    /// Read a value, checking its encoding.
    ///
    /// Staged writes on the same handle shadow committed values.
    pub fn read(
        &self,
        handle: StoreHandle,
        key: &str,
        expected: Encoding,
    ) -> Result<&StoredValue, StoreError> {
        let open = self.handle(handle)?;
        validate_name(key)?;

        let value = open
            .staged
            .get(key)
            .or_else(|| {
                self.namespaces
                    .get(&open.namespace)
                    .and_then(|entries| entries.get(key))
            })
            .ok_or_else(|| StoreError::KeyNotFound {
                namespace: open.namespace.clone(),
                key: key.to_string(),
            })?;

        if value.encoding() != expected {
            return Err(StoreError::TypeMismatch {
                key: key.to_string(),
                expected,
                found: value.encoding(),
            });
        }
        Ok(value)
    }

    /// Stage a write on a read-write handle
    pub fn stage(
        &mut self,
        handle: StoreHandle,
        key: &str,
        value: StoredValue,
    ) -> Result<(), StoreError> {
        self.ensure_initialized()?;
        validate_name(key)?;
        value.check_size()?;

        let open = self
            .handles
            .get_mut(&handle.id())
            .ok_or(StoreError::InvalidHandle(handle.id()))?;
        if open.mode == OpenMode::ReadOnly {
            return Err(StoreError::ReadOnly(open.namespace.clone()));
        }
        open.staged.insert(key.to_string(), value);
        Ok(())
    }

    /// Commit staged writes.
    ///
    /// The staged writes are applied to a copy of the committed contents,
    /// which is handed to `persist`. Only when `persist` succeeds does the
    /// copy replace the committed contents, so a failed commit leaves no
    /// trace. Staged writes survive a failed commit until the handle closes.
    pub fn commit_with<F>(&mut self, handle: StoreHandle, persist: F) -> Result<(), StoreError>
    where
        F: FnOnce(&Namespaces) -> Result<(), StoreError>,
    {
        let open = self.handle(handle)?;
        if open.staged.is_empty() {
            return Ok(());
        }

        let mut next = self.namespaces.clone();
        let entries = next.entry(open.namespace.clone()).or_default();
        for (key, value) in &open.staged {
            entries.insert(key.clone(), value.clone());
        }

        let total: usize = next.values().map(BTreeMap::len).sum();
        if total > self.max_entries {
            return Err(StoreError::NoSpace {
                max_entries: self.max_entries,
            });
        }

        persist(&next)?;

        self.namespaces = next;
        if let Some(open) = self.handles.get_mut(&handle.id()) {
            open.staged.clear();
        }
        Ok(())
    }

    /// Swap in committed contents read from a backing medium. Open
    /// handles and their staged writes are kept.
    pub fn replace_committed(&mut self, namespaces: Namespaces) {
        self.namespaces = namespaces;
    }

    /// Release a handle, discarding uncommitted writes. Unknown handles are ignored.
    pub fn close(&mut self, handle: StoreHandle) {
        self.handles.remove(&handle.id());
    }

    /// Drop all handles and refuse further operations until `init`
    pub fn teardown(&mut self) -> Result<(), StoreError> {
        self.ensure_initialized()?;
        self.handles.clear();
        self.initialized = false;
        Ok(())
    }

    /// Remove every committed entry in every namespace
    pub fn erase(&mut self) {
        self.namespaces.clear();
        self.handles.clear();
    }

    /// Bring the partition back up with the given contents
    pub fn init(&mut self, namespaces: Namespaces) {
        self.namespaces = namespaces;
        self.handles.clear();
        self.initialized = true;
    }
}
