//! Durable key-value storage for the active selection.
//!
//! The store persists the chosen organization and client IDs so a restart
//! resumes where the user left off. Storage is never the source of truth:
//! every value read back is revalidated against live membership data.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::warn;

/// Storage error types.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored values could not be encoded
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// String key-value storage scoped to one client installation.
pub trait SelectionStorage: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the value could not be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the removal could not be persisted.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

fn lock(values: &Mutex<HashMap<String, String>>) -> MutexGuard<'_, HashMap<String, String>> {
    values.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory storage, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        lock(&self.values).remove(key);
        Ok(())
    }
}

/// Storage backed by a JSON object file.
///
/// The file is read once on open and rewritten on every change. A change
/// is visible to readers only once it is on disk. An unreadable or corrupt
/// file is treated as empty.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Open storage at `path`, loading any existing values.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Discarding corrupt selection file");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Selection file unreadable, starting empty");
                HashMap::new()
            }
        };

        Self {
            path,
            values: Mutex::new(values),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // Write-then-rename: the file is never observed half-written.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SelectionStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = lock(&self.values);
        let mut next = values.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next)?;
        *values = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = lock(&self.values);
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut next = values.clone();
        next.remove(key);
        self.flush(&next)?;
        *values = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert!(storage.get("a").is_none());

        storage.set("a", "1").unwrap();
        assert_eq!(storage.get("a").as_deref(), Some("1"));

        storage.remove("a").unwrap();
        storage.remove("a").unwrap();
        assert!(storage.get("a").is_none());
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("selection.json");

        let storage = FileStorage::open(&path);
        storage.set("currentOrganizationId", "org-1").unwrap();
        storage.set("currentClientId", "client-1").unwrap();
        storage.remove("currentClientId").unwrap();

        let reopened = FileStorage::open(&path);
        assert_eq!(reopened.get("currentOrganizationId").as_deref(), Some("org-1"));
        assert!(reopened.get("currentClientId").is_none());
    }

    #[test]
    fn test_failed_write_leaves_values_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        // The parent of the selection file is a regular file, so every flush fails.
        let storage = FileStorage::open(blocker.join("selection.json"));
        assert!(storage.set("currentOrganizationId", "org-1").is_err());
        assert!(storage.get("currentOrganizationId").is_none());
    }

    #[test]
    fn test_failed_remove_keeps_value() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        let path = nested.join("selection.json");

        let storage = FileStorage::open(&path);
        storage.set("currentClientId", "client-1").unwrap();

        std::fs::remove_dir_all(&nested).unwrap();
        std::fs::write(&nested, b"").unwrap();

        assert!(storage.remove("currentClientId").is_err());
        assert_eq!(storage.get("currentClientId").as_deref(), Some("client-1"));
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selection.json");
        std::fs::write(&path, b"{not json").unwrap();

        let storage = FileStorage::open(&path);
        assert!(storage.get("currentOrganizationId").is_none());

        storage.set("currentOrganizationId", "org-2").unwrap();
        assert_eq!(
            FileStorage::open(&path).get("currentOrganizationId").as_deref(),
            Some("org-2")
        );
    }
}
