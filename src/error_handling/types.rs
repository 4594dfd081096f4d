use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadUrl(String),
    BadIPFormatting(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadUrl(e) => write!(f, "URL error: {}", e),
            ConfigError::BadIPFormatting(e) => write!(f, "IP formatting error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// A single inbound stream message could not be turned into a [`StreamEvent`].
///
/// Never fatal: the message is logged and dropped.
///
/// [`StreamEvent`]: crate::events::StreamEvent
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Not JSON, not an object, or no string `type` discriminator.
    Malformed(String),
    /// The envelope is fine but its payload does not match the announced type.
    InvalidPayload { event_type: String, reason: String },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed(e) => write!(f, "Malformed stream message: {}", e),
            DecodeError::InvalidPayload { event_type, reason } => {
                write!(f, "Invalid payload for `{}` event: {}", event_type, reason)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionError {
    ConnectFailed(String),
    ConnectionLost(String),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::ConnectFailed(e) => write!(f, "Stream connection failed: {}", e),
            ConnectionError::ConnectionLost(e) => write!(f, "Stream connection lost: {}", e),
        }
    }
}

impl std::error::Error for ConnectionError {}

#[derive(Debug)]
pub enum StoreError {
    ClientBuild(String),
    Request(String),
    Status(u16),
    Decode(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ClientBuild(e) => write!(f, "Store client setup failed: {}", e),
            StoreError::Request(e) => write!(f, "Store request failed: {}", e),
            StoreError::Status(code) => write!(f, "Store answered with HTTP {}", code),
            StoreError::Decode(e) => write!(f, "Store response could not be decoded: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web interface bind failed: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    StoreError(StoreError),
    WebError(WebError),
    InitializationFailed(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::StoreError(e) => write!(f, "Store error: {}", e),
            ControllerError::WebError(e) => write!(f, "Web error: {}", e),
            ControllerError::InitializationFailed(e) => write!(f, "Initialization failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<StoreError> for ControllerError {
    fn from(err: StoreError) -> Self {
        ControllerError::StoreError(err)
    }
}

impl From<WebError> for ControllerError {
    fn from(err: WebError) -> Self {
        ControllerError::WebError(err)
    }
}
