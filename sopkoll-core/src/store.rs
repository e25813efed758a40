//! Local key/value persistence surviving process restarts.
//!
//! The store holds the last-selected address, the last-fetched schedule,
//! and the notification permission state. Values are plain strings; callers
//! own the encoding.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::{fs, io};

/// Store key for the last-selected address (full string, with disambiguator).
pub const ADDRESS_KEY: &str = "sopkoll-address";
/// Store key for the JSON-encoded [`crate::model::CachedSchedule`].
pub const SCHEDULE_CACHE_KEY: &str = "sopkoll-schedule-cache";
/// Store key for the persisted notification permission state.
pub const NOTIFICATION_PERMISSION_KEY: &str = "sopkoll-notification-permission";

#[derive(thiserror::Error, Debug)]
/// Errors produced by the persistence store.
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("Store I/O error: {0}")]
    Io(#[from] io::Error),
    /// Encoding the store contents failed.
    #[error("Store encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// String key/value storage, synchronous from the caller's perspective.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backing storage fails.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backing storage fails.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a value if present.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backing storage fails.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// File-backed store keeping the whole map in one JSON file.
///
/// Writes go to a temp file first and are renamed into place, so a crash
/// mid-write leaves the previous contents intact.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open a store at the given path, creating an empty one when the file
    /// does not exist yet.
    ///
    /// A file that exists but no longer decodes is treated as empty rather
    /// than bricking the application.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), %err, "discarding undecodable store file");
                HashMap::new()
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

/// In-memory store, mainly for tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FileStore, KeyValueStore, MemoryStore};

    fn temp_store_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("sopkoll-store-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn file_store_round_trips_across_reopen() {
        let path = temp_store_path("reopen");
        let _ignored = std::fs::remove_file(&path);

        {
            let store = FileStore::open(&path).expect("open");
            store.set("adress", "Storgatan 1").expect("set");
        }

        let store = FileStore::open(&path).expect("reopen");
        assert_eq!(
            store.get("adress").expect("get"),
            Some("Storgatan 1".to_owned())
        );

        let _ignored = std::fs::remove_file(&path);
    }

    #[test]
    fn file_store_remove_deletes() {
        let path = temp_store_path("remove");
        let _ignored = std::fs::remove_file(&path);

        let store = FileStore::open(&path).expect("open");
        store.set("nyckel", "värde").expect("set");
        store.remove("nyckel").expect("remove");
        assert_eq!(store.get("nyckel").expect("get"), None);

        let _ignored = std::fs::remove_file(&path);
    }

    #[test]
    fn file_store_survives_corrupt_contents() {
        let path = temp_store_path("corrupt");
        std::fs::write(&path, "inte json").expect("write garbage");

        let store = FileStore::open(&path).expect("open");
        assert_eq!(store.get("adress").expect("get"), None);

        let _ignored = std::fs::remove_file(&path);
    }

    #[test]
    fn memory_store_set_get_remove() {
        let store = MemoryStore::new();
        store.set("k", "v").expect("set");
        assert_eq!(store.get("k").expect("get"), Some("v".to_owned()));
        store.remove("k").expect("remove");
        assert_eq!(store.get("k").expect("get"), None);
    }
}
