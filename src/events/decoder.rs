//! Stream boundary decoder.
//!
//! Turns one UTF-8 text message into a [`StreamEvent`]. The envelope must be a
//! JSON object with a string `type`; `payload` defaults to `null` for event types
//! that do not need one. Unknown types are not an error.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::types::*;
use crate::error_handling::types::DecodeError;

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    payload: Value,
}

/// Decodes one stream message.
///
/// # Errors
/// - [`DecodeError::Malformed`] when the text is not a JSON object with a string `type`.
/// - [`DecodeError::InvalidPayload`] when a known type carries a payload of the wrong shape.
pub fn decode(text: &str) -> Result<StreamEvent, DecodeError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let event = match envelope.event_type.as_str() {
        SESSION_START => StreamEvent::SessionStart(payload(&envelope)?),
        SESSION_COMMAND => StreamEvent::SessionCommand(payload(&envelope)?),
        SESSION_END => StreamEvent::SessionEnd(payload(&envelope)?),
        SYSTEM_LOG => StreamEvent::SystemLog(payload(&envelope)?),
        WAF_BYPASS | ATTACK_ALERT => {
            let mut alert: AttackAlert = payload(&envelope)?;
            alert.kind = envelope.event_type.clone();
            StreamEvent::AttackAlert(alert)
        }
        SYSTEM_ALERT => StreamEvent::SystemAlert(payload(&envelope)?),
        _ => StreamEvent::Unrecognized {
            event_type: envelope.event_type,
            payload: envelope.payload,
        },
    };

    Ok(event)
}

fn payload<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, DecodeError> {
    T::deserialize(&envelope.payload).map_err(|e| DecodeError::InvalidPayload {
        event_type: envelope.event_type.clone(),
        reason: e.to_string(),
    })
}
