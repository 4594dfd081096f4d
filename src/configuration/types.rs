use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_STREAM_URL: &str = "ws://localhost:8000/api/v1/ws/events";
pub const DEFAULT_STORE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_SESSIONS_PATH: &str = "/observability/sessions";

/// `[stream]`: where the event stream lives and how to get it back.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamConfig {
    pub url: String,
    /// Fixed delay before each reconnection attempt.
    pub reconnect_delay_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            reconnect_delay_ms: 3000,
        }
    }
}

impl StreamConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// `[store]`: the authoritative recorded-session API.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub base_url: String,
    pub sessions_path: String,
    /// Bearer token sent with every store request.
    pub token: Option<String>,
    /// Only show recorded sessions of this honeypot.
    pub honeypot_id: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STORE_URL.to_string(),
            sessions_path: DEFAULT_SESSIONS_PATH.to_string(),
            token: None,
            honeypot_id: None,
            timeout_secs: 10,
        }
    }
}

/// `[web_ui]`: the read-only JSON API.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebUiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

impl Default for WebUiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// `[feed]`: how much alert and log history the monitor keeps.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    pub alert_capacity: usize,
    pub log_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            alert_capacity: 5,
            log_capacity: 100,
        }
    }
}
