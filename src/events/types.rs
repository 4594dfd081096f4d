//! Typed stream events.
//!
//! Every inbound message is an envelope `{"type": ..., "payload": {...}}`; the
//! decoder turns it into one [`StreamEvent`] variant. Payload structs are lenient
//! about optional fields so a slightly older or newer server does not break decoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire discriminators understood by the decoder.
pub const SESSION_START: &str = "session_start";
pub const SESSION_COMMAND: &str = "session_command";
pub const SESSION_END: &str = "session_end";
pub const SYSTEM_LOG: &str = "system_log";
pub const WAF_BYPASS: &str = "waf_bypass";
pub const ATTACK_ALERT: &str = "attack_alert";
pub const SYSTEM_ALERT: &str = "system_alert";

/// One command typed by the attacker and the output the decoy returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub input: String,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Command {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStart {
    pub session_id: String,
    #[serde(alias = "source_ip")]
    pub attacker_ip: String,
    #[serde(alias = "start_time")]
    pub started_at: String,
}

/// A command event. The metadata fields are only present when the server
/// chooses to repeat them; they let a late subscriber build a usable session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCommand {
    pub session_id: String,
    pub command: Command,
    #[serde(default, alias = "source_ip", skip_serializing_if = "Option::is_none")]
    pub attacker_ip: Option<String>,
    #[serde(default, alias = "start_time", skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEnd {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemLog {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub source: String,
    pub message: String,
}

/// Attack telemetry (`waf_bypass`, `attack_alert`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackAlert {
    /// Wire type the alert arrived as; filled in by the decoder.
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub source_ip: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemAlert {
    #[serde(default)]
    pub level: String,
    pub message: String,
}

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    SessionStart(SessionStart),
    SessionCommand(SessionCommand),
    SessionEnd(SessionEnd),
    SystemLog(SystemLog),
    AttackAlert(AttackAlert),
    SystemAlert(SystemAlert),
    /// Any `type` this crate does not model. Kept verbatim for raw consumers.
    Unrecognized { event_type: String, payload: Value },
}

impl StreamEvent {
    /// The wire discriminator of this event.
    pub fn event_type(&self) -> &str {
        match self {
            StreamEvent::SessionStart(_) => SESSION_START,
            StreamEvent::SessionCommand(_) => SESSION_COMMAND,
            StreamEvent::SessionEnd(_) => SESSION_END,
            StreamEvent::SystemLog(_) => SYSTEM_LOG,
            StreamEvent::AttackAlert(alert) if alert.kind == ATTACK_ALERT => ATTACK_ALERT,
            StreamEvent::AttackAlert(_) => WAF_BYPASS,
            StreamEvent::SystemAlert(_) => SYSTEM_ALERT,
            StreamEvent::Unrecognized { event_type, .. } => event_type,
        }
    }

    /// The session this event belongs to, for session lifecycle events.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            StreamEvent::SessionStart(e) => Some(&e.session_id),
            StreamEvent::SessionCommand(e) => Some(&e.session_id),
            StreamEvent::SessionEnd(e) => Some(&e.session_id),
            _ => None,
        }
    }

    /// Re-encodes the event as a wire envelope.
    pub fn to_envelope(&self) -> Value {
        let payload = match self {
            StreamEvent::SessionStart(e) => serde_json::to_value(e),
            StreamEvent::SessionCommand(e) => serde_json::to_value(e),
            StreamEvent::SessionEnd(e) => serde_json::to_value(e),
            StreamEvent::SystemLog(e) => serde_json::to_value(e),
            StreamEvent::AttackAlert(e) => serde_json::to_value(e),
            StreamEvent::SystemAlert(e) => serde_json::to_value(e),
            StreamEvent::Unrecognized { payload, .. } => Ok(payload.clone()),
        }
        .unwrap_or(Value::Null);

        serde_json::json!({
            "type": self.event_type(),
            "payload": payload,
        })
    }
}
