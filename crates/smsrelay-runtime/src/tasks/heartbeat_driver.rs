//! Periodic heartbeat driver
//!
//! Stands in for the platform's periodic-work facility: ticks the scheduler
//! once immediately and then on the configured interval. A RETRY outcome
//! schedules the next tick after an exponentially growing delay instead.

use std::sync::Arc;
use std::time::Duration;

use smsrelay_core::HeartbeatConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::heartbeat::{HeartbeatScheduler, TickOutcome};

/// Delay until the next tick after `outcome`
///
/// `retry_streak` counts consecutive RETRY outcomes and is reset by any other
/// outcome.
pub fn next_delay(
    config: &HeartbeatConfig,
    outcome: &TickOutcome,
    retry_streak: &mut u32,
) -> Duration {
    match outcome {
        TickOutcome::Retry => {
            let delay = config.retry_delay(*retry_streak);
            *retry_streak = retry_streak.saturating_add(1);
            delay
        }
        _ => {
            *retry_streak = 0;
            config.interval
        }
    }
}

pub struct HeartbeatDriver {
    scheduler: Arc<HeartbeatScheduler>,
    config: HeartbeatConfig,
}

impl HeartbeatDriver {
    pub fn new(scheduler: Arc<HeartbeatScheduler>, config: HeartbeatConfig) -> Self {
        Self { scheduler, config }
    }

    /// Run the driver on its own task until `shutdown` turns true
    ///
    /// The task resolves to the number of ticks it ran.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<u64> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!(
            interval_secs = self.config.interval.as_secs_f64(),
            "Heartbeat driver started"
        );

        let mut ticks = 0u64;
        let mut retry_streak = 0u32;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = self.scheduler.tick().await;
            ticks += 1;

            let delay = next_delay(&self.config, &outcome, &mut retry_streak);
            debug!(%outcome, delay_ms = delay.as_millis() as u64, "Next heartbeat scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    // A dropped sender also stops the driver
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(ticks, "Heartbeat driver stopped");
        ticks
    }
}

impl std::fmt::Debug for HeartbeatDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatDriver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
