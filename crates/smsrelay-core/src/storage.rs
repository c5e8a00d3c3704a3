//! Key-value persistence for relay state
//!
//! The relay persists two independent records: the device identity and the
//! relay configuration. Both live behind the [`KeyValueStore`] trait so hosts
//! can back them with whatever durable storage they have.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock};

use tracing::debug;

use crate::errors::{RelayError, RelayResult};

/// Key holding the persisted device identifier
pub const DEVICE_ID_KEY: &str = "device_id";
/// Key holding the administrator address
pub const ADMIN_ADDRESS_KEY: &str = "admin_number";
/// Key holding the relay credential
pub const CREDENTIAL_KEY: &str = "api_key";

// ----------------------------------------------------------------------------
// Storage Trait
// ----------------------------------------------------------------------------

/// Named string values with last-write-wins semantics
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> RelayResult<Option<String>>;

    /// Write a value, replacing any previous one
    fn put(&self, key: &str, value: &str) -> RelayResult<()>;

    /// Write `value` only if `key` is absent
    ///
    /// Returns the value that is stored once the call completes: `value` if it
    /// was written, otherwise the value that was already present.
    fn put_if_absent(&self, key: &str, value: &str) -> RelayResult<String>;

    /// Replace the value at `key` with `value` only if it currently equals
    /// `expected`
    ///
    /// Returns the value stored once the call completes, or `None` if the key
    /// is absent.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: &str,
    ) -> RelayResult<Option<String>>;

    /// Remove a value
    fn remove(&self, key: &str) -> RelayResult<()>;
}

// ----------------------------------------------------------------------------
// Memory Store
// ----------------------------------------------------------------------------

/// In-memory store for tests and embedding hosts without durable storage
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> RelayError {
    RelayError::storage_error("Storage lock poisoned")
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> RelayResult<Option<String>> {
        let data = self.data.read().map_err(|_| poisoned())?;
        Ok(data.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> RelayResult<()> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn put_if_absent(&self, key: &str, value: &str) -> RelayResult<String> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        let stored = data
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
        Ok(stored.clone())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: &str,
    ) -> RelayResult<Option<String>> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        match data.get_mut(key) {
            Some(current) if current == expected => {
                *current = value.to_string();
                Ok(Some(current.clone()))
            }
            current => Ok(current.cloned()),
        }
    }

    fn remove(&self, key: &str) -> RelayResult<()> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        data.remove(key);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// JSON File Store
// ----------------------------------------------------------------------------

/// Durable store persisting the whole map as a JSON document
///
/// Every write rewrites the file through a temporary sibling and a rename, so
/// readers never observe a partially written document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store at `path`, reading any existing document
    pub fn open(path: impl Into<PathBuf>) -> RelayResult<Self> {
        let path = path.into();
        let data = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                RelayError::storage_error(format!("Failed to read state file: {}", e))
            })?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents).map_err(|e| {
                    RelayError::storage_error(format!("Failed to parse state file: {}", e))
                })?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = data.len(), "Opened state file");
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> RelayResult<MutexGuard<'_, BTreeMap<String, String>>> {
        self.data.lock().map_err(|_| poisoned())
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> RelayResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RelayError::storage_error(format!(
                        "Failed to create state directory: {}",
                        e
                    ))
                })?;
            }
        }

        let contents = serde_json::to_string_pretty(data)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, contents).map_err(|e| {
            RelayError::storage_error(format!("Failed to write state file: {}", e))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            RelayError::storage_error(format!("Failed to replace state file: {}", e))
        })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> RelayResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> RelayResult<()> {
        let mut data = self.lock()?;
        let mut updated = data.clone();
        updated.insert(key.to_string(), value.to_string());
        self.persist(&updated)?;
        *data = updated;
        Ok(())
    }

    fn put_if_absent(&self, key: &str, value: &str) -> RelayResult<String> {
        let mut data = self.lock()?;
        if let Some(existing) = data.get(key) {
            return Ok(existing.clone());
        }
        let mut updated = data.clone();
        updated.insert(key.to_string(), value.to_string());
        self.persist(&updated)?;
        *data = updated;
        Ok(value.to_string())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: &str,
    ) -> RelayResult<Option<String>> {
        let mut data = self.lock()?;
        match data.get(key) {
            Some(current) if current == expected => {}
            current => return Ok(current.cloned()),
        }
        let mut updated = data.clone();
        updated.insert(key.to_string(), value.to_string());
        self.persist(&updated)?;
        *data = updated;
        Ok(Some(value.to_string()))
    }

    fn remove(&self, key: &str) -> RelayResult<()> {
        let mut data = self.lock()?;
        if !data.contains_key(key) {
            return Ok(());
        }
        let mut updated = data.clone();
        updated.remove(key);
        self.persist(&updated)?;
        *data = updated;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
