//! Message dispatcher
//!
//! Every inbound message fans out to two sinks that never share fate:
//!
//! - **local**: re-send a forwarding envelope to the administrator address
//!   through the host SMS capability, synchronously, before `dispatch`
//!   returns. No admin address means the sink is skipped, not failed.
//! - **remote**: post a structured record to the relay endpoint on the
//!   worker pool. `dispatch` returns as soon as the attempt is queued.
//!
//! A fault in either sink is turned into a failed outcome at the sink
//! boundary and never reaches the other sink or the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use smsrelay_core::{
    ConfigStore, DispatchOutcome, IdentityStore, InboundMessage, MessageRecord, RelayError,
    RelayRequest, RelayResult, SinkKind, SmsSender,
};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::statistics::OutcomeStatistics;
use crate::tasks::WorkerPool;
use crate::transport::RelayTransport;

// ----------------------------------------------------------------------------
// Dispatch Report
// ----------------------------------------------------------------------------

/// Remote outcome that may still be in flight
///
/// Dropping it leaves the attempt running; nothing waits for it.
#[derive(Debug)]
pub struct PendingOutcome {
    inner: PendingInner,
}

#[derive(Debug)]
enum PendingInner {
    Ready(DispatchOutcome),
    Waiting {
        receiver: oneshot::Receiver<DispatchOutcome>,
        started: Arc<AtomicBool>,
    },
}

impl PendingOutcome {
    fn ready(outcome: DispatchOutcome) -> Self {
        Self {
            inner: PendingInner::Ready(outcome),
        }
    }

    fn waiting(receiver: oneshot::Receiver<DispatchOutcome>, started: Arc<AtomicBool>) -> Self {
        Self {
            inner: PendingInner::Waiting { receiver, started },
        }
    }

    /// Wait for the attempt to finish
    ///
    /// An attempt dropped before it ran resolves as `Shutdown`; one that died
    /// while running resolves as a transport failure.
    pub async fn wait(self) -> DispatchOutcome {
        match self.inner {
            PendingInner::Ready(outcome) => outcome,
            PendingInner::Waiting { receiver, started } => match receiver.await {
                Ok(outcome) => outcome,
                Err(_) if started.load(Ordering::SeqCst) => DispatchOutcome::failed(
                    SinkKind::Remote,
                    &RelayError::transport_error("Relay job aborted before completing"),
                ),
                Err(_) => DispatchOutcome::failed(SinkKind::Remote, &RelayError::Shutdown),
            },
        }
    }
}

/// Both sink outcomes for one message
#[derive(Debug)]
pub struct DispatchReport {
    pub local: DispatchOutcome,
    pub remote: PendingOutcome,
}

// ----------------------------------------------------------------------------
// Dispatcher
// ----------------------------------------------------------------------------

pub struct Dispatcher {
    config: ConfigStore,
    identity: Arc<IdentityStore>,
    sms_sender: Arc<dyn SmsSender>,
    transport: Arc<dyn RelayTransport>,
    pool: Arc<WorkerPool>,
    statistics: Arc<OutcomeStatistics>,
}

impl Dispatcher {
    pub fn new(
        config: ConfigStore,
        identity: Arc<IdentityStore>,
        sms_sender: Arc<dyn SmsSender>,
        transport: Arc<dyn RelayTransport>,
        pool: Arc<WorkerPool>,
        statistics: Arc<OutcomeStatistics>,
    ) -> Self {
        Self {
            config,
            identity,
            sms_sender,
            transport,
            pool,
            statistics,
        }
    }

    /// Fan one message out to both sinks
    pub fn dispatch(&self, message: InboundMessage) -> DispatchReport {
        debug!(sender = %message.sender(), "Dispatching inbound message");

        // Queue the remote attempt first so a slow local send cannot delay it
        let remote = self.submit_remote(&message);
        let local = self.send_local(&message);

        DispatchReport { local, remote }
    }

    /// Dispatch a batch delivered by one ingestion event, in delivery order
    pub fn dispatch_batch<I>(&self, messages: I) -> Vec<DispatchReport>
    where
        I: IntoIterator<Item = InboundMessage>,
    {
        messages
            .into_iter()
            .map(|message| self.dispatch(message))
            .collect()
    }

    fn send_local(&self, message: &InboundMessage) -> DispatchOutcome {
        let outcome = match self.forward_to_admin(message) {
            Ok(true) => DispatchOutcome::completed(SinkKind::Local, None),
            Ok(false) => DispatchOutcome::skipped(SinkKind::Local),
            Err(e) => {
                warn!("Error forwarding SMS: {}", e);
                DispatchOutcome::failed(SinkKind::Local, &e)
            }
        };
        self.statistics.record(&outcome);
        outcome
    }

    /// `Ok(false)` when no admin address is configured
    fn forward_to_admin(&self, message: &InboundMessage) -> RelayResult<bool> {
        let Some(admin) = self.config.admin_address()?.filter(|a| !a.is_empty()) else {
            debug!("No admin address configured; local forward skipped");
            return Ok(false);
        };

        self.sms_sender
            .send_text(&admin, &message.forwarding_text())?;
        info!(admin = %admin, "SMS forwarded to admin");
        Ok(true)
    }

    fn submit_remote(&self, message: &InboundMessage) -> PendingOutcome {
        let (tx, rx) = oneshot::channel();
        let started = Arc::new(AtomicBool::new(false));
        let job_started = started.clone();
        let job = RemoteAttempt {
            message: message.clone(),
            config: self.config.clone(),
            identity: self.identity.clone(),
            transport: self.transport.clone(),
            statistics: self.statistics.clone(),
        };

        match self.pool.submit(Box::pin(async move {
            job_started.store(true, Ordering::SeqCst);
            let outcome = job.run().await;
            let _ = tx.send(outcome);
        })) {
            Ok(()) => PendingOutcome::waiting(rx, started),
            Err(e) => {
                warn!("Backend relay not queued: {}", e);
                let outcome = DispatchOutcome::failed(SinkKind::Remote, &e);
                self.statistics.record(&outcome);
                PendingOutcome::ready(outcome)
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Remote Attempt
// ----------------------------------------------------------------------------

/// Everything one remote relay attempt needs, owned by the worker
struct RemoteAttempt {
    message: InboundMessage,
    config: ConfigStore,
    identity: Arc<IdentityStore>,
    transport: Arc<dyn RelayTransport>,
    statistics: Arc<OutcomeStatistics>,
}

impl RemoteAttempt {
    async fn run(self) -> DispatchOutcome {
        let outcome = match self.relay().await {
            Ok(status) => {
                debug!(status, "Backend API response code");
                DispatchOutcome::completed(SinkKind::Remote, Some(status))
            }
            Err(e) => {
                warn!("Error sending to backend: {}", e);
                DispatchOutcome::failed(SinkKind::Remote, &e)
            }
        };
        self.statistics.record(&outcome);
        outcome
    }

    async fn relay(&self) -> RelayResult<u16> {
        let identity = self.identity.identity()?;
        let credential = self.config.credential()?;
        let record = MessageRecord::from_message(&self.message, &identity);

        self.transport
            .send(
                &RelayRequest::Message(record),
                credential.as_deref().filter(|c| !c.is_empty()),
            )
            .await
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSmsSender, RecordingTransport};
    use smsrelay_core::{FixedHardwareId, ManualTimeSource, MemoryStore, WorkerPoolConfig};

    struct Fixture {
        config: ConfigStore,
        sms: Arc<RecordingSmsSender>,
        transport: Arc<RecordingTransport>,
        pool: Arc<WorkerPool>,
        dispatcher: Dispatcher,
    }

    fn fixture(sms: RecordingSmsSender, queue_capacity: usize) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let config = ConfigStore::new(store.clone());
        let identity = Arc::new(IdentityStore::new(
            store,
            Arc::new(FixedHardwareId("hw".into())),
            Arc::new(ManualTimeSource::new(7)),
        ));
        let sms = Arc::new(sms);
        let transport = Arc::new(RecordingTransport::responding(201));
        let pool = Arc::new(WorkerPool::new(&WorkerPoolConfig {
            workers: 1,
            queue_capacity,
        }));

        let dispatcher = Dispatcher::new(
            config.clone(),
            identity,
            sms.clone(),
            transport.clone(),
            pool.clone(),
            Arc::new(OutcomeStatistics::new()),
        );

        Fixture {
            config,
            sms,
            transport,
            pool,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn test_unconfigured_admin_skips_local_sink() {
        let f = fixture(RecordingSmsSender::new(), 8);

        let report = f.dispatcher.dispatch(InboundMessage::new("+1555", "hi", 1));
        assert!(report.local.success);
        assert!(report.local.skipped);
        assert_eq!(f.sms.attempts(), 0);

        // The remote sink still runs
        let remote = report.remote.wait().await;
        assert_eq!(remote.status_code, Some(201));
        assert_eq!(f.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_local_failure_does_not_affect_remote() {
        let f = fixture(RecordingSmsSender::failing(), 8);
        f.config.set_admin_address("+1999").unwrap();

        let report = f.dispatcher.dispatch(InboundMessage::new("+1555", "hi", 1));
        assert!(!report.local.success);
        assert!(report.local.error.as_deref().unwrap_or("").contains("radio off"));

        let remote = report.remote.wait().await;
        assert!(remote.success);
        assert_eq!(f.sms.attempts(), 1);
        assert_eq!(f.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_remote_failure_does_not_affect_local() {
        let f = fixture(RecordingSmsSender::new(), 8);
        f.config.set_admin_address("+1999").unwrap();
        f.transport.fail_with("connection reset");

        let report = f.dispatcher.dispatch(InboundMessage::new("+1555", "hi", 1));
        assert!(report.local.success);
        assert!(!report.local.skipped);

        let remote = report.remote.wait().await;
        assert!(!remote.success);
        assert!(remote.error.unwrap().contains("connection reset"));
        assert_eq!(f.sms.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_returns_before_remote_completes() {
        let f = fixture(RecordingSmsSender::new(), 8);
        f.config.set_admin_address("+1999").unwrap();
        f.transport.hold();

        let report = f.dispatcher.dispatch(InboundMessage::new("+1555", "hi", 1));
        // Local sink finished synchronously while the remote is parked
        assert!(report.local.success);
        assert_eq!(f.sms.attempts(), 1);

        f.transport.release();
        assert!(report.remote.wait().await.success);
    }

    #[tokio::test]
    async fn test_queue_full_reports_remote_failure() {
        let f = fixture(RecordingSmsSender::new(), 1);
        f.transport.hold();

        let reports = f.dispatcher.dispatch_batch(
            (0..4).map(|i| InboundMessage::new("+1555", format!("msg {}", i), i)),
        );
        assert_eq!(reports.len(), 4);

        let mut outcomes = Vec::new();
        f.transport.release();
        for report in reports {
            assert!(report.local.skipped);
            outcomes.push(report.remote.wait().await);
        }

        // With one worker and one queue slot, at least the last two are refused
        let refused = outcomes
            .iter()
            .filter(|o| o.error.as_deref().map_or(false, |e| e.contains("queue full")))
            .count();
        assert!(refused >= 2);
        f.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_abandoned_attempt_resolves_as_failure() {
        let f = fixture(RecordingSmsSender::new(), 8);
        f.pool.shutdown().await;

        let report = f.dispatcher.dispatch(InboundMessage::new("+1555", "hi", 1));
        let remote = report.remote.wait().await;
        assert!(!remote.success);
        assert_eq!(f.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_panicked_attempt_is_not_reported_as_shutdown() {
        let f = fixture(RecordingSmsSender::new(), 8);
        f.transport.panic_on_send();

        let report = f.dispatcher.dispatch(InboundMessage::new("+1555", "hi", 1));
        let remote = report.remote.wait().await;
        assert!(!remote.success);

        let error = remote.error.unwrap_or_default();
        assert!(error.contains("aborted"), "unexpected error: {}", error);
        assert_ne!(error, RelayError::Shutdown.to_string());

        // The worker survives and serves the next attempt
        f.transport.respond_with(202);
        let report = f.dispatcher.dispatch(InboundMessage::new("+1555", "again", 2));
        assert_eq!(report.remote.wait().await.status_code, Some(202));
        f.pool.shutdown().await;
    }
}
