use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::Parser;
use log::{debug, info};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Application configuration that defines all runtime parameters.
///
/// Loaded from a TOML file whose sections all have defaults, then patched with
/// command-line and environment overrides, then validated.
///
/// # Examples
///
/// ```
/// use haas_live::configuration::config::Config;
///
/// let config = Config::from_toml_str(r#"
///     [stream]
///     url = "ws://10.0.0.1:8000/api/v1/ws/events"
///
///     [web_ui]
///     enabled = true
///     port = 9090
/// "#).unwrap();
///
/// assert_eq!(config.stream.reconnect_delay_ms, 3000);
/// assert!(config.validate().is_ok());
/// ```
///
/// # Sections
///
/// - `stream`: event stream URL and the fixed reconnection delay
/// - `store`: recorded-session API location, token, honeypot filter and timeout
/// - `web_ui`: whether to serve the JSON API, and where
/// - `feed`: capacity of the alert and system-log feeds
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub stream: StreamConfig,
    pub store: StoreConfig,
    pub web_ui: WebUiConfig,
    pub feed: FeedConfig,
}

/// Command-line interface of the `haas-live` binary.
///
/// Every override also reads from an environment variable so the binary can run
/// in a container without a configuration file.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "haas-live")]
#[command(version)]
#[command(about = "Live attacker-session monitor for the honeypot platform")]
pub struct CommandLine {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    pub config_file: Option<PathBuf>,

    /// Event stream URL (`ws://` or `wss://`)
    ///
    /// # Command Line
    /// Use `--stream-url <URL>` or the `HAAS_STREAM_URL` environment variable
    #[arg(long, env = "HAAS_STREAM_URL")]
    pub stream_url: Option<String>,

    /// Base URL of the platform API serving recorded sessions
    ///
    /// # Command Line
    /// Use `--store-url <URL>` or the `HAAS_STORE_URL` environment variable
    #[arg(long, env = "HAAS_STORE_URL")]
    pub store_url: Option<String>,

    /// Bearer token for the platform API
    #[arg(long, env = "HAAS_STORE_TOKEN", hide_env_values = true)]
    pub store_token: Option<String>,

    /// Only show recorded sessions of this honeypot
    #[arg(long)]
    pub honeypot_id: Option<String>,

    /// Serve the JSON API on this port. Implies `--web-ui-enabled`.
    #[arg(long)]
    pub web_ui_port: Option<u16>,

    /// Enable the JSON API
    ///
    /// This is a boolean flag that doesn't take a value - its presence enables the feature
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub web_ui_enabled: bool,
}

impl Config {
    /// Reads and parses a TOML configuration file. The result is not validated.
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        info!("Reading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    /// File (or defaults), then command-line overrides, then validation.
    pub fn load(cli: &CommandLine) -> Result<Config, ConfigError> {
        let mut config = match cli.config_file {
            Some(ref path) => Self::from_file(path)?,
            None => {
                info!("No configuration file given, using defaults");
                Config::default()
            }
        };
        config.apply_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, cli: &CommandLine) {
        if let Some(ref url) = cli.stream_url {
            debug!("Stream URL overridden: {}", url);
            self.stream.url = url.clone();
        }
        if let Some(ref url) = cli.store_url {
            debug!("Store URL overridden: {}", url);
            self.store.base_url = url.clone();
        }
        if let Some(ref token) = cli.store_token {
            self.store.token = Some(token.clone());
        }
        if let Some(ref id) = cli.honeypot_id {
            self.store.honeypot_id = Some(id.clone());
        }
        if let Some(port) = cli.web_ui_port {
            self.web_ui.port = port;
            self.web_ui.enabled = true;
        }
        if cli.web_ui_enabled {
            self.web_ui.enabled = true;
        }
    }

    /// Checks every value the runtime relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("stream.url", &self.stream.url, &["ws", "wss"])?;
        check_url("store.base_url", &self.store.base_url, &["http", "https"])?;

        if self.stream.reconnect_delay_ms == 0 {
            return Err(ConfigError::NotInRange(
                "stream.reconnect_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.store.timeout_secs == 0 {
            return Err(ConfigError::NotInRange(
                "store.timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.web_ui
            .bind_address
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::BadIPFormatting(format!("{}: {}", self.web_ui.bind_address, e))
            })?;
        // IANA reserved ports are refused
        if self.web_ui.enabled && self.web_ui.port < 1024 {
            return Err(ConfigError::NotInRange(format!(
                "web_ui.port must be in 1024-65535, got {}",
                self.web_ui.port
            )));
        }

        if self.feed.alert_capacity == 0 || self.feed.log_capacity == 0 {
            return Err(ConfigError::NotInRange(
                "feed capacities must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_url(field: &str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(value)
        .map_err(|e| ConfigError::BadUrl(format!("{} = {:?}: {}", field, value, e)))?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::BadUrl(format!(
            "{} must use one of {:?}, got {:?}",
            field,
            schemes,
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::BadUrl(format!("{} has no host", field)));
    }
    Ok(())
}
