//! File-backed override store.
//!
//! Persists the whole partition as a single JSON document:
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "updated_at": "2026-01-01T00:00:00Z",
//!   "namespaces": { "example": { "i32": { "type": "i32", "value": 777 } } }
//! }
//! ```
//!
//! The file is the only source of truth. It is read on every `open` and
//! again at `commit`, where staged writes are applied on top of what is on
//! disk right now. Other stores on the same path see each other's commits.
//!
//! Commits write a uniquely named temp file next to the target and rename
//! it over. A failed write leaves the file unchanged. `erase_all` removes
//! the file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::memory::mismatch;
use crate::partition::{Namespaces, Partition};
use crate::value::{copy_blob, copy_str};
use crate::{Encoding, OpenMode, OverrideStore, StoreError, StoreHandle, StoredValue};

/// Schema version of the partition file
pub const FILE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PartitionFile {
    schema_version: u32,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    namespaces: Namespaces,
}

/// Persistent store backed by one JSON file.
#[derive(Debug)]
pub struct FileStore {
    /// Path of the partition file.
    path: PathBuf,
    /// Open handles and their staged writes; committed contents are
    /// refreshed from the file before use.
    partition: Mutex<Partition>,
}

impl FileStore {
    /// Create a store over `path`.
    ///
    /// Touches nothing on disk. A missing file is an empty partition; an
    /// unreadable or malformed one is reported by `open`, `commit` and
    /// `init`.
    pub fn new(path: impl AsRef<Path>, max_entries: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            partition: Mutex::new(Partition::new(max_entries)),
        }
    }

    /// Path of the partition file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Partition> {
        self.partition.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entries currently committed to the file
    pub fn entry_count(&self) -> Result<usize, StoreError> {
        Ok(load(&self.path)?.values().map(|entries| entries.len()).sum())
    }

    /// Number of handles not yet closed
    pub fn open_handles(&self) -> usize {
        self.lock().open_handles()
    }
}

/// Read the partition file, treating a missing file as empty.
fn load(path: &Path) -> Result<Namespaces, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Namespaces::new()),
        Err(e) => return Err(StoreError::Io(e)),
    };

    let file: PartitionFile = serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))?;

    if file.schema_version != FILE_SCHEMA_VERSION {
        return Err(StoreError::Corrupt(format!(
            "{}: unsupported schema version {}",
            path.display(),
            file.schema_version
        )));
    }

    debug!(path = %path.display(), namespaces = file.namespaces.len(), "loaded partition file");
    Ok(file.namespaces)
}

/// Write the partition file atomically.
fn persist(path: &Path, namespaces: &Namespaces) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let document = PartitionFile {
        schema_version: FILE_SCHEMA_VERSION,
        updated_at: Utc::now(),
        namespaces: namespaces.clone(),
    };
    let json = serde_json::to_vec_pretty(&document)
        .map_err(|e| StoreError::Corrupt(format!("serialization failed: {}", e)))?;

    // Removed on drop if anything below fails
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(&json)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

impl OverrideStore for FileStore {
    fn open(&self, namespace: &str, mode: OpenMode) -> Result<StoreHandle, StoreError> {
        let mut partition = self.lock();
        if !partition.is_initialized() {
            return Err(StoreError::NotInitialized);
        }
        partition.replace_committed(load(&self.path)?);
        partition.open(namespace, mode)
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
        let partition = self.lock();
        match partition.read(handle, key, Encoding::Str)? {
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
        let partition = self.lock();
        match partition.read(handle, key, Encoding::Blob)? {
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
        self.lock().stage(handle, key, StoredValue::I32(value))
    }

    fn write_str(&self, handle: StoreHandle, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()
            .stage(handle, key, StoredValue::Str(value.to_string()))
    }

    fn write_blob(&self, handle: StoreHandle, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.lock()
            .stage(handle, key, StoredValue::Blob(value.to_vec()))
    }

    fn commit(&self, handle: StoreHandle) -> Result<(), StoreError> {
        let mut partition = self.lock();
        if partition.is_initialized() {
            partition.replace_committed(load(&self.path)?);
        }
        partition.commit_with(handle, |namespaces| persist(&self.path, namespaces))
    }

    fn close(&self, handle: StoreHandle) {
        self.lock().close(handle);
    }

    fn teardown(&self) -> Result<(), StoreError> {
        let mut partition = self.lock();
        partition.teardown()?;
        partition.erase();
        Ok(())
    }

    fn erase_all(&self) -> Result<(), StoreError> {
        let mut partition = self.lock();
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Io(e)),
        }
        partition.erase();
        Ok(())
    }

    fn init(&self) -> Result<(), StoreError> {
        let mut partition = self.lock();
        let contents = load(&self.path)?;
        partition.init(contents);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileStore {
        FileStore::new(dir.path().join("nvs.json"), 64)
    }

    fn set_i32(store: &FileStore, ns: &str, key: &str, value: i32) {
        let h = store.open(ns, OpenMode::ReadWrite).unwrap();
        store.write_i32(h, key, value).unwrap();
        store.commit(h).unwrap();
        store.close(h);
    }

    fn get_i32(store: &FileStore, ns: &str, key: &str) -> Result<i32, StoreError> {
        let h = store.open(ns, OpenMode::ReadOnly)?;
        let value = store.read_i32(h, key);
        store.close(h);
        value
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.entry_count().unwrap(), 0);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_commit_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = store_in(&dir);
            let h = store.open("app", OpenMode::ReadWrite).unwrap();
            store.write_i32(h, "level", 7).unwrap();
            store.write_blob(h, "mac", &[0xde, 0xad]).unwrap();
            store.commit(h).unwrap();
            store.close(h);
        }

        let store = store_in(&dir);
        let h = store.open("app", OpenMode::ReadOnly).unwrap();
        assert_eq!(store.read_i32(h, "level").unwrap(), 7);
        let mut mac = [0u8; 2];
        assert_eq!(store.read_blob(h, "mac", Some(&mut mac)).unwrap(), 2);
        assert_eq!(mac, [0xde, 0xad]);
        store.close(h);
    }

    #[test]
    fn test_two_stores_on_one_file_see_each_other() {
        let dir = TempDir::new().unwrap();
        let a = store_in(&dir);
        let b = store_in(&dir);

        set_i32(&a, "app", "level", 777);
        assert_eq!(get_i32(&b, "app", "level").unwrap(), 777);

        // B commits on top of A's write instead of over it
        set_i32(&b, "app", "retries", 3);
        assert_eq!(get_i32(&a, "app", "level").unwrap(), 777);
        assert_eq!(get_i32(&a, "app", "retries").unwrap(), 3);

        let fresh = store_in(&dir);
        assert_eq!(fresh.entry_count().unwrap(), 2);
    }

    #[test]
    fn test_commit_keeps_writes_made_after_open() {
        let dir = TempDir::new().unwrap();
        let a = store_in(&dir);
        let b = store_in(&dir);

        let h = a.open("app", OpenMode::ReadWrite).unwrap();
        a.write_i32(h, "mine", 1).unwrap();
        set_i32(&b, "app", "theirs", 2);
        a.commit(h).unwrap();
        a.close(h);

        assert_eq!(get_i32(&b, "app", "mine").unwrap(), 1);
        assert_eq!(get_i32(&b, "app", "theirs").unwrap(), 2);
    }

    #[test]
    fn test_uncommitted_writes_not_persisted() {
        let dir = TempDir::new().unwrap();
        {
            let store = store_in(&dir);
            let h = store.open("app", OpenMode::ReadWrite).unwrap();
            store.write_i32(h, "level", 7).unwrap();
            store.close(h);
        }
        let store = store_in(&dir);
        assert_eq!(store.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let h = store.open("app", OpenMode::ReadWrite).unwrap();
        store.write_str(h, "name", "node").unwrap();
        store.commit(h).unwrap();
        store.close(h);

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["nvs.json".to_string()]);
    }

    #[test]
    fn test_parallel_commits_in_one_process() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nvs.json");

        let workers: Vec<_> = ["left", "right"]
            .into_iter()
            .map(|ns| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store = FileStore::new(&path, 64);
                    for i in 0..20 {
                        let h = store.open(ns, OpenMode::ReadWrite)?;
                        store.write_i32(h, "n", i)?;
                        let committed = store.commit(h);
                        store.close(h);
                        committed?;
                    }
                    Ok::<(), StoreError>(())
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap().unwrap();
        }

        // Every commit landed a whole file and no temp files remain
        assert!(FileStore::new(&path, 64).entry_count().is_ok());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_erase_removes_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        set_i32(&store, "app", "level", 1);
        assert!(store.path().exists());

        store.teardown().unwrap();
        store.erase_all().unwrap();
        store.init().unwrap();

        assert!(!store.path().exists());
        assert_eq!(store.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_teardown_refuses_open_until_init() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        set_i32(&store, "app", "level", 1);

        store.teardown().unwrap();
        assert!(matches!(
            store.open("app", OpenMode::ReadOnly),
            Err(StoreError::NotInitialized)
        ));

        store.init().unwrap();
        assert_eq!(get_i32(&store, "app", "level").unwrap(), 1);
    }

    #[test]
    fn test_corrupt_file_reported_on_open() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "{ not json").unwrap();

        assert!(matches!(
            store.open("app", OpenMode::ReadOnly),
            Err(StoreError::Corrupt(_))
        ));
        assert!(matches!(
            store.open("app", OpenMode::ReadWrite),
            Err(StoreError::Corrupt(_))
        ));
        assert_eq!(store.open_handles(), 0);

        // A full reset recovers the partition
        store.teardown().unwrap();
        store.erase_all().unwrap();
        store.init().unwrap();
        set_i32(&store, "app", "level", 2);
        assert_eq!(get_i32(&store, "app", "level").unwrap(), 2);
    }

    #[test]
    fn test_unsupported_schema_version() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            r#"{"schema_version": 9, "updated_at": "2026-01-01T00:00:00Z", "namespaces": {}}"#,
        )
        .unwrap();

        let err = store.open("app", OpenMode::ReadOnly).unwrap_err();
        assert!(err.to_string().contains("schema version 9"));
    }
}
