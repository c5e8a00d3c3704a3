//! Test doubles for host collaborators and the relay transport
//!
//! Used by this crate's tests and available to hosts that want to exercise
//! their wiring without a modem or a backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use smsrelay_core::{HostError, RelayError, RelayRequest, RelayResult, SmsSender};
use tokio::sync::Semaphore;

use crate::transport::RelayTransport;

// ----------------------------------------------------------------------------
// SMS Sender
// ----------------------------------------------------------------------------

/// One text handed to the SMS capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentText {
    pub destination: String,
    pub text: String,
}

/// SMS sender that records every submission
#[derive(Debug, Default)]
pub struct RecordingSmsSender {
    sent: Mutex<Vec<SentText>>,
    failing: AtomicBool,
}

impl RecordingSmsSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sender whose every submission is rejected
    pub fn failing() -> Self {
        let sender = Self::default();
        sender.set_failing(true);
        sender
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentText> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Number of submissions, including rejected ones
    pub fn attempts(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl SmsSender for RecordingSmsSender {
    fn send_text(&self, destination: &str, text: &str) -> Result<(), HostError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentText {
                destination: destination.to_string(),
                text: text.to_string(),
            });
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(HostError::Rejected("radio off".to_string()));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Relay Transport
// ----------------------------------------------------------------------------

/// One request seen by [`RecordingTransport`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: RelayRequest,
    pub credential: Option<String>,
}

#[derive(Debug, Clone)]
enum Response {
    Status(u16),
    Fail(String),
    Panic,
}

/// Transport that records requests and answers with a configured response
///
/// [`hold`](Self::hold) parks every request after it has been recorded until
/// [`release`](Self::release) is called.
#[derive(Debug)]
pub struct RecordingTransport {
    requests: Mutex<Vec<RecordedRequest>>,
    response: Mutex<Response>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl RecordingTransport {
    pub fn responding(status: u16) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            response: Mutex::new(Response::Status(status)),
            gate: Mutex::new(None),
        }
    }

    pub fn respond_with(&self, status: u16) {
        if let Ok(mut response) = self.response.lock() {
            *response = Response::Status(status);
        }
    }

    /// Fail every following request with a transport error
    pub fn fail_with(&self, reason: &str) {
        if let Ok(mut response) = self.response.lock() {
            *response = Response::Fail(reason.to_string());
        }
    }

    /// Panic inside every following request
    pub fn panic_on_send(&self) {
        if let Ok(mut response) = self.response.lock() {
            *response = Response::Panic;
        }
    }

    pub fn hold(&self) {
        if let Ok(mut gate) = self.gate.lock() {
            *gate = Some(Arc::new(Semaphore::new(0)));
        }
    }

    pub fn release(&self) {
        let gate = self.gate.lock().ok().and_then(|mut gate| gate.take());
        if let Some(gate) = gate {
            gate.close();
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl RelayTransport for RecordingTransport {
    async fn send(&self, request: &RelayRequest, credential: Option<&str>) -> RelayResult<u16> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                request: request.clone(),
                credential: credential.map(str::to_string),
            });
        }

        let gate = self.gate.lock().ok().and_then(|gate| gate.clone());
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }

        let response = self
            .response
            .lock()
            .map(|r| r.clone())
            .unwrap_or(Response::Fail("poisoned".to_string()));
        match response {
            Response::Status(status) => Ok(status),
            Response::Fail(reason) => Err(RelayError::transport_error(reason)),
            Response::Panic => panic!("relay transport panicked"),
        }
    }
}
