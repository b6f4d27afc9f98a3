//! Durable key/value storage backing the token store.

use crate::errors::AppError;
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// String key/value storage with local-storage semantics: no transactions
/// across keys, reads never fail (unreadable data is absent).
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// # Errors
    /// Returns `AppError::Storage` when the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    /// # Errors
    /// Returns `AppError::Storage` when the removal cannot be persisted.
    fn remove(&self, key: &str) -> Result<(), AppError>;
}

/// Process-local storage; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Storage persisted as a flat JSON object in a single file. Every write goes
/// through a sibling temp file and a rename so readers never see a torn file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return BTreeMap::new(),
            Err(err) => {
                warn!("Failed to read state file {}: {}", self.path.display(), err);
                return BTreeMap::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(
                "Ignoring unreadable state file {}: {}",
                self.path.display(),
                err
            );
            BTreeMap::new()
        })
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    AppError::Storage(format!("Failed to create {}: {err}", parent.display()))
                })?;
            }
        }

        let payload = serde_json::to_string_pretty(entries)
            .map_err(|err| AppError::Serialization(format!("Failed to encode state: {err}")))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, payload)
            .map_err(|err| AppError::Storage(format!("Failed to write {}: {err}", tmp.display())))?;
        fs::rename(&tmp, &self.path).map_err(|err| {
            AppError::Storage(format!(
                "Failed to replace {}: {err}",
                self.path.display()
            ))
        })?;

        debug!("state file updated: {}", self.path.display());

        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock();
        self.load().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let _guard = self.lock.lock();
        let mut entries = self.load();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        let _guard = self.lock.lock();
        let mut entries = self.load();
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&entries)
    }
}
