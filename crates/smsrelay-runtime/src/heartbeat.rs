//! Heartbeat scheduler
//!
//! One tick reports liveness to the relay endpoint. Only missing
//! connectivity asks the scheduling substrate to retry. A missing admin
//! address and any fault while sending end the tick as a failure, and any
//! HTTP status counts as a completed tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use smsrelay_core::{
    ConfigStore, ConnectivityProbe, DispatchOutcome, HeartbeatRecord, IdentityStore, RelayError,
    RelayRequest, RelayResult, SinkKind, TimeSource,
};
use tracing::{debug, info, warn};

use crate::statistics::OutcomeStatistics;
use crate::transport::RelayTransport;

// ----------------------------------------------------------------------------
// Tick Outcome
// ----------------------------------------------------------------------------

/// Result of one heartbeat tick, as reported to the scheduling substrate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Heartbeat was sent; the status code is informational
    Success { status_code: u16 },
    /// No connectivity; reattempt later
    Retry,
    /// Configuration fault or send failure; do not retry
    Failure { reason: String },
}

impl TickOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TickOutcome::Success { .. })
    }
}

impl std::fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TickOutcome::Success { status_code } => write!(f, "SUCCESS (status {})", status_code),
            TickOutcome::Retry => write!(f, "RETRY"),
            TickOutcome::Failure { reason } => write!(f, "FAILURE ({})", reason),
        }
    }
}

/// Scheduler state between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

// ----------------------------------------------------------------------------
// Scheduler
// ----------------------------------------------------------------------------

pub struct HeartbeatScheduler {
    config: ConfigStore,
    identity: Arc<IdentityStore>,
    connectivity: Arc<dyn ConnectivityProbe>,
    transport: Arc<dyn RelayTransport>,
    time_source: Arc<dyn TimeSource>,
    statistics: Arc<OutcomeStatistics>,
    running: AtomicBool,
}

/// Returns the scheduler to IDLE however the tick ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl HeartbeatScheduler {
    pub fn new(
        config: ConfigStore,
        identity: Arc<IdentityStore>,
        connectivity: Arc<dyn ConnectivityProbe>,
        transport: Arc<dyn RelayTransport>,
        time_source: Arc<dyn TimeSource>,
        statistics: Arc<OutcomeStatistics>,
    ) -> Self {
        Self {
            config,
            identity,
            connectivity,
            transport,
            time_source,
            statistics,
            running: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.running.load(Ordering::SeqCst) {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// Run one heartbeat tick
    ///
    /// A tick that arrives while another is in flight is coalesced into a
    /// RETRY without touching the network.
    pub async fn tick(&self) -> TickOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Heartbeat tick already in flight; coalescing");
            let outcome = TickOutcome::Retry;
            self.statistics.record_tick(&outcome);
            return outcome;
        }
        let _guard = RunningGuard(&self.running);

        let outcome = match self.run_tick().await {
            Ok(status_code) => {
                info!(status = status_code, "Heartbeat sent");
                TickOutcome::Success { status_code }
            }
            Err(e) if e.is_retryable() => {
                warn!("No network connection available; heartbeat will be retried");
                TickOutcome::Retry
            }
            Err(e) => {
                warn!("Heartbeat failed: {}", e);
                TickOutcome::Failure {
                    reason: e.to_string(),
                }
            }
        };

        self.statistics.record_tick(&outcome);
        outcome
    }

    async fn run_tick(&self) -> RelayResult<u16> {
        if !self.connectivity.is_online().await {
            return Err(RelayError::ConnectivityUnavailable);
        }

        let config = self.config.snapshot()?;
        if config.admin_address().is_none() {
            return Err(RelayError::ConfigurationMissing {
                field: "admin_address",
            });
        }

        // Re-establish collaborator invariants before reporting liveness
        let identity = self.identity.identity()?;
        let credential = config.credential();
        if credential.is_none() {
            debug!("No relay credential configured; heartbeat is unauthenticated");
        }

        let record = HeartbeatRecord::new(&identity, self.time_source.now_millis());
        let result = self
            .transport
            .send(&RelayRequest::Heartbeat(record), credential)
            .await;

        let attempt = match &result {
            Ok(status) => DispatchOutcome::completed(SinkKind::Heartbeat, Some(*status)),
            Err(e) => DispatchOutcome::failed(SinkKind::Heartbeat, e),
        };
        self.statistics.record(&attempt);
        result
    }
}

impl std::fmt::Debug for HeartbeatScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatScheduler")
            .field("state", &self.state())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
