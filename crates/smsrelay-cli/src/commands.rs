//! Command handlers for the SMS relay CLI

use std::future::Future;

use smsrelay_core::{InboundMessage, SystemTimeSource, TimeSource};
use smsrelay_runtime::RelayRuntime;
use tracing::{info, warn};

use crate::app::RelayApp;
use crate::cli::Commands;
use crate::config::AppConfig;
use crate::error::Result;
use crate::ingest::{self, LineReceiver};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(command: Commands, app: RelayApp) -> Result<()> {
        match command {
            Commands::SetAdmin { address } => Self::handle_set_admin(&app, &address),
            Commands::SetCredential { token } => Self::handle_set_credential(&app, &token),
            Commands::ClearCredential => Self::handle_clear_credential(&app),
            Commands::ShowConfig => Self::handle_show_config(&app),
            Commands::DeviceId => Self::handle_device_id(&app),
            Commands::Dispatch {
                sender,
                body,
                timestamp,
            } => Self::handle_dispatch(&app, sender, body, timestamp).await,
            Commands::Heartbeat => Self::handle_heartbeat(&app).await,
            Commands::Run { no_heartbeat } => Self::handle_run(&app, !no_heartbeat).await,
            Commands::ExampleConfig => {
                print!("{}", AppConfig::example_config()?);
                Ok(())
            }
        }
    }

    fn handle_set_admin(app: &RelayApp, address: &str) -> Result<()> {
        app.config_store().set_admin_address(address)?;
        info!("Admin address updated");
        println!("Admin address set to {}", address);
        Ok(())
    }

    fn handle_set_credential(app: &RelayApp, token: &str) -> Result<()> {
        app.config_store().set_credential(token)?;
        info!("Relay credential updated");
        println!("Credential set ({})", mask_credential(token));
        Ok(())
    }

    fn handle_clear_credential(app: &RelayApp) -> Result<()> {
        app.config_store().clear_credential()?;
        println!("Credential cleared");
        Ok(())
    }

    fn handle_show_config(app: &RelayApp) -> Result<()> {
        let config = app.config_store().snapshot()?;
        let device_id = app.identity_store().existing()?;

        println!("Relay Configuration");
        println!("===================");
        println!("Endpoint:      {}", app.config().relay.endpoint);
        println!("Data dir:      {}", app.data_dir().display());
        println!(
            "Admin address: {}",
            config.admin_address().unwrap_or("(not set)")
        );
        println!(
            "Credential:    {}",
            config
                .credential()
                .map(mask_credential)
                .unwrap_or_else(|| "(not set)".to_string())
        );
        println!(
            "Device id:     {}",
            device_id.as_deref().unwrap_or("(not created)")
        );
        Ok(())
    }

    fn handle_device_id(app: &RelayApp) -> Result<()> {
        println!("{}", app.identity_store().get_or_create_id()?);
        Ok(())
    }

    async fn handle_dispatch(
        app: &RelayApp,
        sender: String,
        body: String,
        timestamp: Option<u64>,
    ) -> Result<()> {
        let received_at = timestamp.unwrap_or_else(|| SystemTimeSource::new().now_millis());
        let mut runtime = app.start_runtime(false).await?;

        let report = runtime.dispatch(InboundMessage::new(sender, body, received_at));
        println!("{}", report.local);
        println!("{}", report.remote.wait().await);

        runtime.shutdown().await?;
        Ok(())
    }

    async fn handle_heartbeat(app: &RelayApp) -> Result<()> {
        let mut runtime = app.start_runtime(false).await?;
        let outcome = runtime.tick_heartbeat().await;
        println!("Heartbeat: {}", outcome);
        runtime.shutdown().await?;
        Ok(())
    }

    async fn handle_run(app: &RelayApp, heartbeat: bool) -> Result<()> {
        let mut runtime = app.start_runtime(heartbeat).await?;
        let device_id = runtime.identity().get_or_create_id()?;
        info!(device_id = %device_id, "Relay running; reading messages from stdin");

        let lines = ingest::stdin_lines()?;
        let summary = relay_lines(&runtime, lines, interrupted()).await?;

        let shutdown = runtime.shutdown().await?;
        let statistics = runtime.statistics();

        info!(
            events = summary.events,
            messages = summary.messages,
            rejected_lines = summary.rejected_lines,
            relay_jobs = shutdown.relay_jobs_completed,
            heartbeat_ticks = shutdown.heartbeat_ticks,
            "Relay stopped"
        );
        println!("{}", serde_json::to_string_pretty(&statistics)?);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Ingestion Loop
// ----------------------------------------------------------------------------

/// Counts from one ingestion loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub events: u64,
    pub messages: u64,
    pub rejected_lines: u64,
}

/// Dispatch every event from `lines` until the input ends or `shutdown`
/// resolves
///
/// Malformed lines are logged and skipped. Remote outcomes are not awaited.
pub async fn relay_lines<F>(
    runtime: &RelayRuntime,
    mut lines: LineReceiver,
    shutdown: F,
) -> Result<RunSummary>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut summary = RunSummary::default();

    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = &mut shutdown => {
                info!("Interrupted; shutting down");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        let messages = match ingest::parse_line(&line?) {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Skipping input line: {}", e);
                summary.rejected_lines += 1;
                continue;
            }
        };

        summary.events += 1;
        summary.messages += messages.len() as u64;
        for report in runtime.dispatcher().dispatch_batch(messages) {
            if !report.local.success {
                warn!("{}", report.local);
            }
        }
    }

    Ok(summary)
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Mask all but the last four characters of a credential
pub fn mask_credential(credential: &str) -> String {
    let chars: Vec<char> = credential.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len().max(4));
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use smsrelay_core::{FixedHardwareId, MemoryStore, RelaySettings, StaticConnectivity};
    use smsrelay_runtime::testing::{RecordingSmsSender, RecordingTransport};
    use smsrelay_runtime::RuntimeBuilder;
    use tokio::sync::mpsc;

    async fn runtime_with(
        sms: Arc<RecordingSmsSender>,
        transport: Arc<RecordingTransport>,
    ) -> RelayRuntime {
        let runtime = RuntimeBuilder::new(
            Arc::new(MemoryStore::new()),
            sms,
            Arc::new(StaticConnectivity::new(true)),
            Arc::new(FixedHardwareId("hw".into())),
        )
        .with_settings(RelaySettings::testing())
        .with_transport(transport)
        .build_and_start()
        .await
        .unwrap();
        runtime.config().set_admin_address("+1999").unwrap();
        runtime
    }

    fn lines_from(input: &str) -> LineReceiver {
        let (tx, rx) = mpsc::channel(16);
        for line in input.lines() {
            tx.try_send(Ok(line.to_string())).unwrap();
        }
        rx
    }

    #[test]
    fn test_mask_credential() {
        assert_eq!(mask_credential("abc"), "****");
        assert_eq!(mask_credential("12345678"), "********");
        assert_eq!(mask_credential("sk-live-abcdef1234"), "**************1234");
    }

    #[tokio::test]
    async fn test_relay_lines_dispatches_each_event() {
        let sms = Arc::new(RecordingSmsSender::new());
        let transport = Arc::new(RecordingTransport::responding(200));
        let mut runtime = runtime_with(sms.clone(), transport.clone()).await;

        let input = concat!(
            r#"{"sender":"+1555","body":"hi","receivedAtMillis":1}"#,
            "\n",
            "garbage\n",
            "\n",
            r#"[{"sender":"+1556","body":"a","receivedAtMillis":2},{"sender":"+1557","body":"b","receivedAtMillis":3}]"#,
            "\n",
        );

        let summary = relay_lines(&runtime, lines_from(input), std::future::pending())
            .await
            .unwrap();
        assert_eq!(
            summary,
            RunSummary {
                events: 3,
                messages: 3,
                rejected_lines: 1,
            }
        );

        let shutdown = runtime.shutdown().await.unwrap();
        assert_eq!(shutdown.relay_jobs_completed, 3);
        assert_eq!(sms.sent().len(), 3);
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_relay_lines_stops_on_interrupt_with_input_open() {
        let sms = Arc::new(RecordingSmsSender::new());
        let transport = Arc::new(RecordingTransport::responding(200));
        let mut runtime = runtime_with(sms.clone(), transport).await;

        // The sender stays alive, so the input never reaches EOF
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok(r#"{"sender":"+1555","body":"hi","receivedAtMillis":1}"#.to_string()))
            .await
            .unwrap();

        let summary = tokio::time::timeout(
            Duration::from_secs(2),
            relay_lines(&runtime, rx, tokio::time::sleep(Duration::from_millis(50))),
        )
        .await
        .expect("relay loop ignored the interrupt")
        .unwrap();

        assert_eq!(summary.events, 1);
        assert_eq!(summary.messages, 1);
        drop(tx);

        runtime.shutdown().await.unwrap();
        assert_eq!(sms.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_relay_lines_surfaces_read_errors() {
        let sms = Arc::new(RecordingSmsSender::new());
        let transport = Arc::new(RecordingTransport::responding(200));
        let mut runtime = runtime_with(sms, transport).await;

        let (tx, rx) = mpsc::channel(4);
        tx.try_send(Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "stream did not contain valid UTF-8",
        )))
        .unwrap();

        let result = relay_lines(&runtime, rx, std::future::pending()).await;
        assert!(matches!(result, Err(crate::error::CliError::Io(_))));
        runtime.shutdown().await.unwrap();
    }
}
