//! Durable key-value storage backends.
//!
//! Storage mirrors the browser `localStorage` model: string keys mapping to
//! string values, scoped to one profile.
//!
//! | Backend | Persistence |
//! |---------|-------------|
//! | [`MemoryStore`] | Process lifetime |
//! | [`FileStore`] | JSON object file on disk |

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Directory under the platform data dir used by [`FileStore::default_location`].
const APP_DIR: &str = "session-bridge";

/// File name used by [`FileStore::default_location`].
const STORAGE_FILE: &str = "storage.json";

// ============================================================================
// KeyValueStore
// ============================================================================

/// String key-value storage scoped to one profile.
pub trait KeyValueStore: Send + Sync {
    /// Reads a value. Returns `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-process storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<FxHashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// Storage backed by a JSON object file.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Creates a store backed by `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates a store at `<data_dir>/session-bridge/storage.json`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the platform has no data directory.
    pub fn default_location() -> Result<Self> {
        let base = dirs::data_dir().ok_or_else(|| {
            Error::config(
                "Could not determine the platform data directory.\n\
                 Use .storage_path() to choose a storage file explicitly.",
            )
        })?;
        Ok(Self::new(base.join(APP_DIR).join(STORAGE_FILE)))
    }

    /// Returns the backing file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if text.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::storage(&self.path, "storage file is not a JSON object")),
        }
    }

    fn persist(&self, map: &Map<String, Value>) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, map)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| Error::storage(&self.path, e.to_string()))?;

        trace!(path = %self.path.display(), keys = map.len(), "Storage file written");
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.load()?;
        match map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(Error::storage(
                &self.path,
                format!("value for key `{key}` is not a string"),
            )),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut map = self.load()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.persist(&map)?;

        debug!(path = %self.path.display(), key, "Stored value");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    use crate::identity::{IDENTITY_KEY, IdentityStore};

    #[test]
    fn test_memory_store_get_set() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_file_store_missing_file_reads_none() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("storage.json"));
        assert_eq!(store.get(IDENTITY_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let first = IdentityStore::new(FileStore::new(&path))
            .get_identity()
            .unwrap();
        let second = IdentityStore::new(FileStore::new(&path))
            .get_identity()
            .unwrap();

        assert_eq!(first, second);
        assert!(path.exists());
    }

    #[test]
    fn test_file_store_keeps_other_keys() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("storage.json"));

        store.set("theme", "dark").unwrap();
        store.set(IDENTITY_KEY, "abc").unwrap();

        assert_eq!(store.get("theme").unwrap().as_deref(), Some("dark"));
        assert_eq!(store.get(IDENTITY_KEY).unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_file_store_rejects_non_object_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        let err = FileStore::new(&path).get(IDENTITY_KEY).unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
    }

    #[test]
    fn test_file_store_rejects_non_string_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, r#"{"uuid": 42}"#).unwrap();

        let err = FileStore::new(&path).get(IDENTITY_KEY).unwrap_err();
        assert!(err.to_string().contains("not a string"));
    }

    #[test]
    fn test_file_store_empty_file_is_empty_map() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "").unwrap();

        assert_eq!(FileStore::new(&path).get(IDENTITY_KEY).unwrap(), None);
    }

    #[test]
    fn test_arc_store_shares_state() {
        let shared: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let a = IdentityStore::new(Arc::clone(&shared));
        let b = IdentityStore::new(shared);
        assert_eq!(a.get_identity().unwrap(), b.get_identity().unwrap());
    }
}
