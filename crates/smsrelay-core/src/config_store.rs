//! Administrator address and relay credential
//!
//! Plain last-write-wins values with no validation. Readers see a write as
//! soon as the setter returns, so changes take effect on the next dispatch or
//! heartbeat without a restart.

use std::sync::Arc;

use tracing::info;

use crate::errors::RelayResult;
use crate::storage::{KeyValueStore, ADMIN_ADDRESS_KEY, CREDENTIAL_KEY};
use crate::types::RelayConfig;

#[derive(Clone)]
pub struct ConfigStore {
    store: Arc<dyn KeyValueStore>,
}

impl ConfigStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn admin_address(&self) -> RelayResult<Option<String>> {
        self.store.get(ADMIN_ADDRESS_KEY)
    }

    pub fn set_admin_address(&self, address: &str) -> RelayResult<()> {
        self.store.put(ADMIN_ADDRESS_KEY, address)?;
        info!("Admin address updated");
        Ok(())
    }

    pub fn credential(&self) -> RelayResult<Option<String>> {
        self.store.get(CREDENTIAL_KEY)
    }

    pub fn set_credential(&self, credential: &str) -> RelayResult<()> {
        self.store.put(CREDENTIAL_KEY, credential)?;
        info!("Relay credential updated");
        Ok(())
    }

    pub fn clear_credential(&self) -> RelayResult<()> {
        self.store.remove(CREDENTIAL_KEY)
    }

    /// Read both values for one dispatch or heartbeat
    pub fn snapshot(&self) -> RelayResult<RelayConfig> {
        Ok(RelayConfig {
            admin_address: self.admin_address()?,
            api_credential: self.credential()?,
        })
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore").finish_non_exhaustive()
    }
}
