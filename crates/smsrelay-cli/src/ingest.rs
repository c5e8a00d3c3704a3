//! Ingestion adapter for the `run` command
//!
//! Each stdin line is one delivery event: either a single message object or
//! an array of them, in the order the host delivered them. Blank lines are
//! empty events.
//!
//! Lines are read on a dedicated OS thread and handed over through a channel.
//! A blocking read there is never awaited by the async runtime, so an
//! interrupt can end the process while stdin is still open.

use std::io::BufRead;

use serde::Deserialize;
use smsrelay_core::InboundMessage;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{CliError, Result};

/// Lines in flight between the reader thread and the relay loop
const LINE_BUFFER: usize = 64;

/// Receiving end of a line reader
pub type LineReceiver = mpsc::Receiver<std::io::Result<String>>;

#[derive(Deserialize)]
#[serde(untagged)]
enum DeliveryEvent {
    Single(InboundMessage),
    Batch(Vec<InboundMessage>),
}

/// Messages carried by one input line
pub fn parse_line(line: &str) -> Result<Vec<InboundMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<DeliveryEvent>(line) {
        Ok(DeliveryEvent::Single(message)) => Ok(vec![message]),
        Ok(DeliveryEvent::Batch(messages)) => Ok(messages),
        Err(e) => Err(CliError::InvalidInput(format!(
            "Expected a message object or array: {}",
            e
        ))),
    }
}

/// Read stdin line by line on its own thread
pub fn stdin_lines() -> Result<LineReceiver> {
    spawn_line_reader(std::io::BufReader::new(std::io::stdin()))
}

/// Forward every line of `reader` into a channel from a detached thread
///
/// The channel closes at EOF, after the first read error, or once the
/// receiver is dropped and another line arrives.
pub fn spawn_line_reader<R>(reader: R) -> Result<LineReceiver>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    std::thread::Builder::new()
        .name("smsrelay-input".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
            debug!("Input reader finished");
        })?;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_single_message() {
        let messages =
            parse_line(r#"{"sender":"+1555","body":"hi","receivedAtMillis":1700000000000}"#)
                .unwrap();
        assert_eq!(
            messages,
            vec![InboundMessage::new("+1555", "hi", 1_700_000_000_000)]
        );
    }

    #[test]
    fn test_batch_keeps_delivery_order() {
        let messages = parse_line(
            r#"[{"sender":"a","body":"1","receivedAtMillis":2},{"sender":"b","body":"2","receivedAtMillis":1}]"#,
        )
        .unwrap();
        let senders: Vec<_> = messages.iter().map(|m| m.sender()).collect();
        assert_eq!(senders, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_events() {
        assert!(parse_line("   ").unwrap().is_empty());
        assert!(parse_line("[]").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_line() {
        assert!(matches!(
            parse_line(r#"{"sender":"+1555"}"#),
            Err(CliError::InvalidInput(_))
        ));
        assert!(parse_line("not json").is_err());
    }

    #[tokio::test]
    async fn test_line_reader_forwards_until_eof() {
        let mut lines = spawn_line_reader(Cursor::new("first\n\nthird\n")).unwrap();

        let mut received = Vec::new();
        while let Some(line) = lines.recv().await {
            received.push(line.unwrap());
        }
        assert_eq!(received, vec!["first", "", "third"]);
    }
}
