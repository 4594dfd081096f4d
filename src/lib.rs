//! Live attacker-session monitor for the honeypot platform.
//!
//! Subscribes to the platform's event stream, rebuilds the sessions in progress from
//! their lifecycle events, and keeps a cached view of recorded sessions fresh from
//! the session store.

pub mod configuration;
pub mod connection;
pub mod controller;
pub mod error_handling;
pub mod events;
pub mod monitor;
pub mod session_management;
pub mod storage;
pub mod web_interface;
