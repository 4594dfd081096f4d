use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::events::Command;

/// A session as persisted by the authoritative store.
///
/// Timestamps are kept as the strings the store sends; the backend emits naive
/// ISO-8601 values without an offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedSession {
    pub session_id: String,
    #[serde(default)]
    pub honeypot_id: String,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    pub attacker_ip: String,
    /// The store keeps commands as free-form objects. Log-derived entries use
    /// `command`/`response` instead of `input`/`output`.
    #[serde(default, deserialize_with = "lenient_commands")]
    pub commands: Vec<Command>,
}

impl RecordedSession {
    pub fn is_closed(&self) -> bool {
        self.end_time.is_some()
    }
}

fn lenient_commands<'de, D>(deserializer: D) -> Result<Vec<Command>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(entries
        .unwrap_or_default()
        .iter()
        .filter_map(recorded_command)
        .collect())
}

/// Entries that are not objects are skipped; missing fields become empty.
fn recorded_command(entry: &Value) -> Option<Command> {
    let entry = entry.as_object()?;
    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| entry.get(*key).and_then(Value::as_str))
            .map(str::to_string)
    };

    Some(Command {
        input: text(&["input", "command"]).unwrap_or_default(),
        output: text(&["output", "response"]).unwrap_or_default(),
        timestamp: text(&["timestamp"]),
    })
}
