//! Stream events and their wire decoding.

pub mod decoder;
pub mod types;

pub use decoder::decode;
pub use types::{
    AttackAlert, Command, SessionCommand, SessionEnd, SessionStart, StreamEvent, SystemAlert,
    SystemLog,
};
