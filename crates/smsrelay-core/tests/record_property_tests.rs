//! Property-based tests for relay wire records
//!
//! The backend keys on the exact field names and value types, so every
//! message must serialize to the same four-field shape regardless of content.

use proptest::prelude::*;
use smsrelay_core::{DeviceIdentity, HeartbeatRecord, InboundMessage, MessageRecord, RelayRequest};

/// Generate arbitrary sender addresses
fn arb_sender() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"\+?[0-9A-Za-z]{1,20}").unwrap()
}

/// Generate arbitrary message bodies, including quotes and newlines
fn arb_body() -> impl Strategy<Value = String> {
    prop::string::string_regex(r#"[a-zA-Z0-9 .,!?"\\\n]{0,400}"#).unwrap()
}

fn arb_message() -> impl Strategy<Value = InboundMessage> {
    (arb_sender(), arb_body(), any::<u64>())
        .prop_map(|(sender, body, ts)| InboundMessage::new(sender, body, ts))
}

proptest! {
    /// Property: message records carry exactly sender/content/timestamp/deviceId
    #[test]
    fn message_record_shape(message in arb_message(), device in "[a-z0-9_]{1,40}") {
        let identity = DeviceIdentity::new(device.clone());
        let request = RelayRequest::Message(MessageRecord::from_message(&message, &identity));
        let value: serde_json::Value = serde_json::from_slice(&request.to_json().unwrap()).unwrap();

        let object = value.as_object().unwrap();
        prop_assert_eq!(object.len(), 4);
        prop_assert_eq!(object["sender"].as_str().unwrap(), message.sender());
        prop_assert_eq!(object["content"].as_str().unwrap(), message.body());
        prop_assert_eq!(object["timestamp"].as_u64().unwrap(), message.received_at_millis());
        prop_assert_eq!(object["deviceId"].as_str().unwrap(), device.as_str());
    }

    /// Property: heartbeat records always declare their type
    #[test]
    fn heartbeat_record_shape(device in "[a-z0-9_]{1,40}", ts in any::<u64>()) {
        let record = HeartbeatRecord::new(&DeviceIdentity::new(device.clone()), ts);
        let value = serde_json::to_value(&record).unwrap();

        prop_assert_eq!(value["type"].as_str().unwrap(), "heartbeat");
        prop_assert_eq!(value["deviceId"].as_str().unwrap(), device.as_str());
        prop_assert_eq!(value["timestamp"].as_u64().unwrap(), ts);
    }

    /// Property: the forwarding envelope contains both sender and body
    #[test]
    fn forwarding_text_contains_original(message in arb_message()) {
        let text = message.forwarding_text();
        prop_assert!(text.contains(message.sender()));
        prop_assert!(text.contains(message.body()));
    }
}

#[test]
fn test_reference_payload() {
    let message = InboundMessage::new("+1555", "hello", 1_700_000_000_000);
    let identity = DeviceIdentity::new("abc_1");
    let json = RelayRequest::Message(MessageRecord::from_message(&message, &identity))
        .to_json()
        .unwrap();

    assert_eq!(
        String::from_utf8(json).unwrap(),
        r#"{"sender":"+1555","content":"hello","timestamp":1700000000000,"deviceId":"abc_1"}"#
    );
}
