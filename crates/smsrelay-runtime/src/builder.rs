//! Runtime Builder API
//!
//! Hosts hand their capabilities (storage, SMS, connectivity, hardware id)
//! to the builder and get back a running relay with a dispatcher, a
//! heartbeat scheduler and, optionally, a periodic heartbeat driver.

use std::sync::Arc;
use std::time::Duration;

use smsrelay_core::{
    ConfigStore, ConnectivityProbe, HardwareIdSource, IdentityStore, InboundMessage,
    KeyValueStore, RelayResult, RelaySettings, SmsSender, SystemTimeSource, TimeSource,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::heartbeat::{HeartbeatScheduler, TickOutcome};
use crate::statistics::{OutcomeStatistics, StatisticsSnapshot};
use crate::tasks::{HeartbeatDriver, WorkerPool};
use crate::transport::{HttpRelayTransport, RelayTransport};

/// How long shutdown waits for the heartbeat driver before aborting it
const HEARTBEAT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

/// Builder for a relay runtime
pub struct RuntimeBuilder {
    store: Arc<dyn KeyValueStore>,
    sms_sender: Arc<dyn SmsSender>,
    connectivity: Arc<dyn ConnectivityProbe>,
    hardware: Arc<dyn HardwareIdSource>,
    settings: RelaySettings,
    time_source: Arc<dyn TimeSource>,
    transport: Option<Arc<dyn RelayTransport>>,
    heartbeat_enabled: bool,
}

impl RuntimeBuilder {
    /// Create a builder from the host capabilities
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        sms_sender: Arc<dyn SmsSender>,
        connectivity: Arc<dyn ConnectivityProbe>,
        hardware: Arc<dyn HardwareIdSource>,
    ) -> Self {
        Self {
            store,
            sms_sender,
            connectivity,
            hardware,
            settings: RelaySettings::default(),
            time_source: Arc::new(SystemTimeSource::new()),
            transport: None,
            heartbeat_enabled: false,
        }
    }

    /// Set the relay settings
    pub fn with_settings(mut self, settings: RelaySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Override the clock used for identity and heartbeat timestamps
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    /// Replace the HTTP transport
    pub fn with_transport(mut self, transport: Arc<dyn RelayTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Run the periodic heartbeat driver
    pub fn enable_heartbeat(mut self, enabled: bool) -> Self {
        self.heartbeat_enabled = enabled;
        self
    }

    /// Build and start the runtime
    ///
    /// Must be called within a tokio runtime.
    pub async fn build_and_start(self) -> RelayResult<RelayRuntime> {
        self.settings.validate()?;
        info!(endpoint = %self.settings.endpoint, "Building relay runtime");

        let transport: Arc<dyn RelayTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpRelayTransport::new(&self.settings)?),
        };

        let config = ConfigStore::new(self.store.clone());
        let identity = Arc::new(IdentityStore::new(
            self.store,
            self.hardware,
            self.time_source.clone(),
        ));
        let statistics = Arc::new(OutcomeStatistics::new());
        let pool = Arc::new(WorkerPool::new(&self.settings.workers));

        let dispatcher = Dispatcher::new(
            config.clone(),
            identity.clone(),
            self.sms_sender,
            transport.clone(),
            pool.clone(),
            statistics.clone(),
        );

        let scheduler = Arc::new(HeartbeatScheduler::new(
            config.clone(),
            identity.clone(),
            self.connectivity,
            transport,
            self.time_source,
            statistics.clone(),
        ));

        let heartbeat = if self.heartbeat_enabled {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let handle = HeartbeatDriver::new(scheduler.clone(), self.settings.heartbeat.clone())
                .spawn(shutdown_rx);
            Some(HeartbeatHandle {
                shutdown: shutdown_tx,
                handle,
            })
        } else {
            None
        };

        info!("Relay runtime started");

        Ok(RelayRuntime {
            config,
            identity,
            dispatcher,
            scheduler,
            statistics,
            pool,
            heartbeat,
            running: true,
        })
    }
}

impl std::fmt::Debug for RuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeBuilder")
            .field("settings", &self.settings)
            .field("heartbeat_enabled", &self.heartbeat_enabled)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Relay Runtime
// ----------------------------------------------------------------------------

struct HeartbeatHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<u64>,
}

/// Totals reported when the runtime stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Remote relay attempts the worker pool finished
    pub relay_jobs_completed: u64,
    /// Ticks run by the periodic heartbeat driver
    pub heartbeat_ticks: u64,
}

/// Handle to a running relay
pub struct RelayRuntime {
    config: ConfigStore,
    identity: Arc<IdentityStore>,
    dispatcher: Dispatcher,
    scheduler: Arc<HeartbeatScheduler>,
    statistics: Arc<OutcomeStatistics>,
    pool: Arc<WorkerPool>,
    heartbeat: Option<HeartbeatHandle>,
    running: bool,
}

impl RelayRuntime {
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn identity(&self) -> &IdentityStore {
        &self.identity
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn scheduler(&self) -> Arc<HeartbeatScheduler> {
        self.scheduler.clone()
    }

    /// Dispatch one inbound message
    pub fn dispatch(&self, message: InboundMessage) -> DispatchReport {
        self.dispatcher.dispatch(message)
    }

    /// Run a single heartbeat tick outside the periodic driver
    pub async fn tick_heartbeat(&self) -> TickOutcome {
        self.scheduler.tick().await
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }

    /// Check if the runtime is still running
    pub fn is_running(&self) -> bool {
        self.running && self.pool.is_running()
    }

    /// Stop the heartbeat driver and drain queued relay attempts
    pub async fn shutdown(&mut self) -> RelayResult<ShutdownSummary> {
        if !self.running {
            return Ok(ShutdownSummary::default());
        }
        info!("Shutting down relay runtime");

        let mut summary = ShutdownSummary::default();

        if let Some(heartbeat) = self.heartbeat.take() {
            let _ = heartbeat.shutdown.send(true);
            let mut handle = heartbeat.handle;
            match tokio::time::timeout(HEARTBEAT_STOP_TIMEOUT, &mut handle).await {
                Ok(Ok(ticks)) => summary.heartbeat_ticks = ticks,
                Ok(Err(e)) => warn!("Heartbeat driver ended abnormally: {}", e),
                Err(_) => {
                    warn!("Heartbeat driver did not stop in time; aborting");
                    handle.abort();
                }
            }
        }

        summary.relay_jobs_completed = self.pool.shutdown().await;
        self.running = false;

        info!(
            relay_jobs = summary.relay_jobs_completed,
            heartbeat_ticks = summary.heartbeat_ticks,
            "Relay runtime shut down"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for RelayRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayRuntime")
            .field("running", &self.running)
            .field("heartbeat", &self.heartbeat.is_some())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
