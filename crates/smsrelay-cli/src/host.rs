//! Reference host capabilities
//!
//! A workstation has no modem, so the SMS capability appends each outgoing
//! text to an outbox file as one JSON line. Connectivity is a TCP connect to
//! the relay host, and the hardware identifier comes from the machine id.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smsrelay_core::{ConnectivityProbe, HardwareIdSource, HostError, SmsSender};
use tokio::net::TcpStream;
use tracing::debug;

/// Machine id location on systemd-based hosts
pub const MACHINE_ID_PATH: &str = "/etc/machine-id";

// ----------------------------------------------------------------------------
// Outbox SMS Sender
// ----------------------------------------------------------------------------

/// One line of the outbox file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub destination: String,
    pub text: String,
    pub queued_at_millis: u64,
}

/// SMS capability that appends texts to a JSON-lines outbox
#[derive(Debug)]
pub struct OutboxSmsSender {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl OutboxSmsSender {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries written so far; a missing outbox is empty
    pub fn read_entries(&self) -> Result<Vec<OutboxEntry>, HostError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| HostError::Rejected(format!("Corrupt outbox line: {}", e)))
            })
            .collect()
    }
}

impl SmsSender for OutboxSmsSender {
    fn send_text(&self, destination: &str, text: &str) -> Result<(), HostError> {
        let entry = OutboxEntry {
            destination: destination.to_string(),
            text: text.to_string(),
            queued_at_millis: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        };
        let mut line = serde_json::to_string(&entry)
            .map_err(|e| HostError::Rejected(format!("Unencodable text: {}", e)))?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| HostError::Unavailable("Outbox lock poisoned".to_string()))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;

        debug!(destination, outbox = %self.path.display(), "Text queued in outbox");
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Connectivity Probe
// ----------------------------------------------------------------------------

/// Online when a TCP connection to `target` opens within `timeout`
#[derive(Debug, Clone)]
pub struct TcpConnectivityProbe {
    target: String,
    timeout: Duration,
}

impl TcpConnectivityProbe {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ConnectivityProbe for TcpConnectivityProbe {
    async fn is_online(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(target = %self.target, "Connectivity probe failed: {}", e);
                false
            }
            Err(_) => {
                debug!(target = %self.target, "Connectivity probe timed out");
                false
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Hardware Identifier
// ----------------------------------------------------------------------------

/// Hardware identifier read from the machine id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineHardwareId {
    id: String,
}

impl MachineHardwareId {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Read the machine id, falling back to a random UUID
    ///
    /// The fallback only matters for the first identity synthesis; the
    /// resulting device id is persisted afterwards.
    pub fn detect() -> Self {
        Self::from_path(MACHINE_ID_PATH)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let id = std::fs::read_to_string(path.as_ref())
            .ok()
            .map(|contents| contents.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        Self { id }
    }
}

impl HardwareIdSource for MachineHardwareId {
    fn hardware_id(&self) -> String {
        self.id.clone()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_outbox_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sender = OutboxSmsSender::new(dir.path().join("nested").join("outbox.jsonl"));

        assert!(sender.read_entries().unwrap().is_empty());

        sender.send_text("+1999", "From: +1555\nMessage: hi").unwrap();
        sender.send_text("+1999", "second").unwrap();

        let entries = sender.read_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].destination, "+1999");
        assert_eq!(entries[0].text, "From: +1555\nMessage: hi");
        assert_eq!(entries[1].text, "second");

        // Embedded newlines stay inside one JSON line
        let raw = std::fs::read_to_string(sender.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }

    #[test]
    fn test_outbox_unwritable_path_is_host_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending
        let sender = OutboxSmsSender::new(dir.path());
        assert!(sender.send_text("+1999", "hi").is_err());
    }

    #[test]
    fn test_machine_id_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine-id");
        std::fs::write(&path, "4c4c4544004d3510\n").unwrap();

        assert_eq!(
            MachineHardwareId::from_path(&path).hardware_id(),
            "4c4c4544004d3510"
        );
    }

    #[test]
    fn test_missing_machine_id_falls_back_to_uuid() {
        let dir = tempfile::tempdir().unwrap();
        let id = MachineHardwareId::from_path(dir.path().join("absent")).hardware_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_tcp_probe() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let probe = TcpConnectivityProbe::new(addr.to_string(), Duration::from_secs(1));
        assert!(probe.is_online().await);

        drop(listener);
        assert!(!probe.is_online().await);
    }
}
