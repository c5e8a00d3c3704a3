//! Device identity store
//!
//! The identifier is generated lazily on first access from the host hardware
//! id and the creation time, then persisted. Generation is single-flight
//! within the process and compare-and-set against the backing store, so racing
//! callers all observe the one value that was durably kept.

use std::sync::{Arc, Mutex, OnceLock};

use tracing::{debug, info};

use crate::errors::{RelayError, RelayResult};
use crate::host::HardwareIdSource;
use crate::storage::{KeyValueStore, DEVICE_ID_KEY};
use crate::time::TimeSource;
use crate::types::DeviceIdentity;

pub struct IdentityStore {
    store: Arc<dyn KeyValueStore>,
    hardware: Arc<dyn HardwareIdSource>,
    time_source: Arc<dyn TimeSource>,
    cached: OnceLock<DeviceIdentity>,
    init_lock: Mutex<()>,
}

impl IdentityStore {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        hardware: Arc<dyn HardwareIdSource>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            store,
            hardware,
            time_source,
            cached: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Return the persisted identifier, generating it on first use
    pub fn get_or_create_id(&self) -> RelayResult<String> {
        Ok(self.identity()?.id)
    }

    /// Same as [`get_or_create_id`](Self::get_or_create_id), typed
    pub fn identity(&self) -> RelayResult<DeviceIdentity> {
        if let Some(identity) = self.cached.get() {
            return Ok(identity.clone());
        }

        let _guard = self
            .init_lock
            .lock()
            .map_err(|_| RelayError::storage_error("Identity lock poisoned"))?;

        // Another caller may have finished while we waited
        if let Some(identity) = self.cached.get() {
            return Ok(identity.clone());
        }

        let identity = match self.store.get(DEVICE_ID_KEY)? {
            Some(existing) if !existing.is_empty() => {
                debug!(device_id = %existing, "Loaded device identity");
                DeviceIdentity::new(existing)
            }
            blank => {
                let candidate = DeviceIdentity::synthesize(
                    &self.hardware.hardware_id(),
                    self.time_source.now_millis(),
                );
                // An empty record counts as absent
                let swapped = match blank {
                    Some(_) => self.store.compare_and_swap(DEVICE_ID_KEY, "", &candidate.id)?,
                    None => None,
                };
                let kept = match swapped {
                    Some(stored) if !stored.is_empty() => stored,
                    _ => self.store.put_if_absent(DEVICE_ID_KEY, &candidate.id)?,
                };
                info!(device_id = %kept, "Generated device identity");
                DeviceIdentity::new(kept)
            }
        };

        Ok(self.cached.get_or_init(|| identity).clone())
    }

    /// Identifier if it has already been created, without generating one
    pub fn existing(&self) -> RelayResult<Option<String>> {
        if let Some(identity) = self.cached.get() {
            return Ok(Some(identity.id.clone()));
        }
        Ok(self.store.get(DEVICE_ID_KEY)?.filter(|id| !id.is_empty()))
    }
}

impl std::fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityStore")
            .field("cached", &self.cached.get())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FixedHardwareId;
    use crate::storage::MemoryStore;
    use crate::time::ManualTimeSource;

    fn identity_store(store: Arc<MemoryStore>, clock: Arc<ManualTimeSource>) -> IdentityStore {
        IdentityStore::new(store, Arc::new(FixedHardwareId("hw42".into())), clock)
    }

    #[test]
    fn test_first_access_generates_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualTimeSource::new(1_700_000_000_000));
        let identities = identity_store(store.clone(), clock);

        assert!(identities.existing().unwrap().is_none());

        let id = identities.get_or_create_id().unwrap();
        assert_eq!(id, "hw42_1700000000000");
        assert_eq!(store.get(DEVICE_ID_KEY).unwrap().as_deref(), Some(id.as_str()));
    }

    #[test]
    fn test_later_calls_return_same_value() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualTimeSource::new(1));
        let identities = identity_store(store, clock.clone());

        let first = identities.get_or_create_id().unwrap();
        clock.advance(60_000);
        let second = identities.get_or_create_id().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_existing_value_is_loaded_not_regenerated() {
        let store = Arc::new(MemoryStore::new());
        store.put(DEVICE_ID_KEY, "preexisting").unwrap();

        let identities = identity_store(store, Arc::new(ManualTimeSource::new(9)));
        assert_eq!(identities.get_or_create_id().unwrap(), "preexisting");
    }

    #[test]
    fn test_empty_record_is_replaced_once() {
        let store = Arc::new(MemoryStore::new());
        store.put(DEVICE_ID_KEY, "").unwrap();

        let first = identity_store(store.clone(), Arc::new(ManualTimeSource::new(1)));
        let second = identity_store(store.clone(), Arc::new(ManualTimeSource::new(2)));

        assert!(first.existing().unwrap().is_none());
        let id = first.get_or_create_id().unwrap();
        assert_eq!(id, "hw42_1");
        assert_eq!(second.get_or_create_id().unwrap(), id);
        assert_eq!(store.get(DEVICE_ID_KEY).unwrap(), Some(id));
    }

    #[test]
    fn test_store_written_elsewhere_wins_race() {
        // Another process stored an id between our read and our write
        struct RacingStore {
            inner: MemoryStore,
        }

        impl KeyValueStore for RacingStore {
            fn get(&self, _key: &str) -> RelayResult<Option<String>> {
                Ok(None)
            }
            fn put(&self, key: &str, value: &str) -> RelayResult<()> {
                self.inner.put(key, value)
            }
            fn put_if_absent(&self, key: &str, value: &str) -> RelayResult<String> {
                self.inner.put_if_absent(key, "winner")?;
                self.inner.put_if_absent(key, value)
            }
            fn compare_and_swap(
                &self,
                key: &str,
                expected: &str,
                value: &str,
            ) -> RelayResult<Option<String>> {
                self.inner.compare_and_swap(key, expected, value)
            }
            fn remove(&self, key: &str) -> RelayResult<()> {
                self.inner.remove(key)
            }
        }

        let identities = IdentityStore::new(
            Arc::new(RacingStore {
                inner: MemoryStore::new(),
            }),
            Arc::new(FixedHardwareId("hw".into())),
            Arc::new(ManualTimeSource::new(1)),
        );
        assert_eq!(identities.get_or_create_id().unwrap(), "winner");
    }
}
