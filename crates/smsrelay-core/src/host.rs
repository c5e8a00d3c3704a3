//! Host collaborator interfaces
//!
//! The relay core never talks to the operating system directly. Hosts supply
//! the SMS send capability, a connectivity check and a stable hardware
//! identifier through these traits.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::errors::HostError;

// ----------------------------------------------------------------------------
// Capability Traits
// ----------------------------------------------------------------------------

/// Outbound SMS capability exposed by the host
pub trait SmsSender: Send + Sync {
    /// Submit `text` for delivery to `destination`
    fn send_text(&self, destination: &str, text: &str) -> Result<(), HostError>;
}

/// Network reachability check used to gate heartbeats
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Stable hardware or installation identifier provided by the host
pub trait HardwareIdSource: Send + Sync {
    fn hardware_id(&self) -> String;
}

// ----------------------------------------------------------------------------
// Simple Implementations
// ----------------------------------------------------------------------------

/// Connectivity flag set by the host from its own network callbacks
#[derive(Debug)]
pub struct StaticConnectivity {
    online: AtomicBool,
}

impl StaticConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for StaticConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Hardware identifier known up front
#[derive(Debug, Clone)]
pub struct FixedHardwareId(pub String);

impl HardwareIdSource for FixedHardwareId {
    fn hardware_id(&self) -> String {
        self.0.clone()
    }
}
