//! Reference host wiring
//!
//! Opens the persisted state in the data directory and assembles the host
//! capabilities the runtime needs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use smsrelay_core::{
    ConfigStore, FixedHardwareId, HardwareIdSource, IdentityStore, JsonFileStore, SystemTimeSource,
};
use smsrelay_runtime::{RelayRuntime, RuntimeBuilder};
use tracing::info;

use crate::config::{AppConfig, STATE_FILE};
use crate::error::Result;
use crate::host::{MachineHardwareId, OutboxSmsSender, TcpConnectivityProbe};

/// CLI application: configuration plus the opened state store
pub struct RelayApp {
    config: AppConfig,
    data_dir: PathBuf,
    store: Arc<JsonFileStore>,
}

impl RelayApp {
    /// Open the state in `data_dir`, creating the directory if needed
    pub fn open(config: AppConfig, data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        let store = Arc::new(JsonFileStore::open(data_dir.join(STATE_FILE))?);

        Ok(Self {
            config,
            data_dir,
            store,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::new(self.store.clone())
    }

    pub fn identity_store(&self) -> IdentityStore {
        IdentityStore::new(
            self.store.clone(),
            self.hardware_id(),
            Arc::new(SystemTimeSource::new()),
        )
    }

    pub fn outbox(&self) -> OutboxSmsSender {
        OutboxSmsSender::new(self.config.outbox_path(&self.data_dir))
    }

    fn hardware_id(&self) -> Arc<dyn HardwareIdSource> {
        match &self.config.host.hardware_id {
            Some(id) => Arc::new(FixedHardwareId(id.clone())),
            None => Arc::new(MachineHardwareId::detect()),
        }
    }

    /// Build and start a runtime over the host capabilities
    pub async fn start_runtime(&self, heartbeat: bool) -> Result<RelayRuntime> {
        let connectivity =
            TcpConnectivityProbe::new(self.config.connectivity_target()?, self.config.connectivity_timeout());

        info!(
            data_dir = %self.data_dir.display(),
            heartbeat,
            "Starting relay runtime"
        );

        let runtime = RuntimeBuilder::new(
            self.store.clone(),
            Arc::new(self.outbox()),
            Arc::new(connectivity),
            self.hardware_id(),
        )
        .with_settings(self.config.relay_settings())
        .enable_heartbeat(heartbeat)
        .build_and_start()
        .await?;

        Ok(runtime)
    }
}

impl std::fmt::Debug for RelayApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayApp")
            .field("data_dir", &self.data_dir)
            .field("config", &self.config)
            .finish()
    }
}
