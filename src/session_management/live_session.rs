use serde::Serialize;

use crate::events::{Command, SessionCommand, SessionStart};

/// Placeholder for metadata a late subscriber never saw.
pub const UNKNOWN: &str = "Unknown";

/// An attacker session believed to be still open.
///
/// The transcript is append-only while the session is open; insertion order is
/// arrival order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveSession {
    pub session_id: String,
    pub attacker_ip: String,
    pub started_at: String,
    pub commands: Vec<Command>,
    /// Built from a command because the `session_start` event was missed.
    /// Cleared once a late start event supplies the real metadata.
    pub synthesized: bool,
}

impl LiveSession {
    /// A fresh session with an empty transcript.
    pub fn open(start: &SessionStart) -> Self {
        Self {
            session_id: start.session_id.clone(),
            attacker_ip: start.attacker_ip.clone(),
            started_at: start.started_at.clone(),
            commands: Vec::new(),
            synthesized: false,
        }
    }

    /// A session rebuilt from its first observed command, seeded with that command.
    pub fn synthesize(event: &SessionCommand) -> Self {
        let started_at = event
            .started_at
            .clone()
            .or_else(|| event.command.timestamp.clone())
            .unwrap_or_else(|| UNKNOWN.to_string());

        Self {
            session_id: event.session_id.clone(),
            attacker_ip: event
                .attacker_ip
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string()),
            started_at,
            commands: vec![event.command.clone()],
            synthesized: true,
        }
    }

    /// Replaces placeholder metadata with the start event's. The transcript is kept.
    pub fn reconcile(&mut self, start: &SessionStart) {
        self.attacker_ip = start.attacker_ip.clone();
        self.started_at = start.started_at.clone();
        self.synthesized = false;
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }
}
