//! Session Store Trait
//!
//! This module defines the `SessionStore` trait, the read side of the authoritative
//! recorded-session store.
//!
//! The store is an external service: implementors only fetch, they never persist.
//! All methods return a `Result` so callers can decide how stale data is handled.

use async_trait::async_trait;

use crate::error_handling::types::StoreError;
use crate::session_management::RecordedSession;
use crate::storage::session_filter::SessionFilter;

/// Read access to recorded sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Retrieves recorded sessions, in the order the store returns them.
    async fn get_sessions(
        &self,
        filter: &SessionFilter,
    ) -> Result<Vec<RecordedSession>, StoreError>;
}
