//! Recorded-session store
//!
//! This module provides the read side of the authoritative session store, an
//! external service reachable by request/response calls.
//!
//! Components:
//! - `storage_trait`: the `SessionStore` trait defining a uniform API.
//! - `http_storage`: reqwest-based implementation against the platform API.
//! - `session_filter`: query criteria for recorded sessions.

pub mod http_storage;
pub mod session_filter;
pub mod storage_trait;

pub use http_storage::HttpSessionStore;
pub use session_filter::SessionFilter;
pub use storage_trait::SessionStore;
