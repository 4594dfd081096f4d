//! Query criteria for recorded sessions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionFilter {
    /// Restrict to sessions captured by one honeypot.
    pub honeypot_id: Option<String>,
}

impl SessionFilter {
    /// Query string pairs understood by the store endpoint.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref id) = self.honeypot_id {
            pairs.push(("honeypot_id", id.clone()));
        }
        pairs
    }
}

/// Build a `SessionFilter` that matches sessions of one honeypot.
pub fn by_honeypot<S: Into<String>>(honeypot_id: S) -> SessionFilter {
    SessionFilter {
        honeypot_id: Some(honeypot_id.into()),
    }
}
