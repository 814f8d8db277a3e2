//! Wire message shape shared by both directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One named message on the channel: `{ "event": ..., "payload": ... }`.
///
/// A missing payload decodes as `null`, which is how the backend signals a
/// bare acknowledgement such as `create_project_success`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl WireMessage {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_payload_decodes_as_null() {
        let message: WireMessage =
            serde_json::from_str(r#"{"event":"create_project_success"}"#).unwrap();
        assert_eq!(message.event, "create_project_success");
        assert!(message.payload.is_null());
    }

    #[test]
    fn serializes_event_and_payload_fields() {
        let message = WireMessage::new("create_project", json!({"project_name": "demo"}));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({"event": "create_project", "payload": {"project_name": "demo"}})
        );
    }
}
