//! Classification of inbound deliveries into exchange outcomes.

use serde_json::Value;

use crate::error::ExchangeError;

/// What a settled exchange hands to its waiter: the raw success payload, or
/// the typed error. Decoding into the caller's type happens in the broker.
pub type ExchangeOutcome = Result<Value, ExchangeError>;

/// Turn a delivery on an exchange's error event into a `Remote` error.
///
/// The backend answers failures either with a bare string or with an object
/// carrying a string `message` and optional extra fields. Extra fields are
/// kept verbatim as `detail`. Any other shape is a local protocol defect.
pub(crate) fn remote_error(event: &str, payload: Value) -> ExchangeError {
    match payload {
        Value::String(message) => ExchangeError::Remote {
            message,
            detail: None,
        },
        Value::Object(mut fields) => match fields.remove("message") {
            Some(Value::String(message)) => ExchangeError::Remote {
                message,
                detail: (!fields.is_empty()).then_some(Value::Object(fields)),
            },
            _ => ExchangeError::protocol(event, "error payload has no string `message` field"),
        },
        other => ExchangeError::protocol(
            event,
            format!("error payload must be a string or an object, got {other}"),
        ),
    }
}
