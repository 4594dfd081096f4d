pub mod types;

pub use types::{
    ConfigError, ConnectionError, ControllerError, DecodeError, StoreError, WebError,
};
