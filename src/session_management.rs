//! Session reconstruction core.
//!
//! This module turns the ordered stream of session lifecycle events into the set of
//! attacker sessions currently in progress, each with its command transcript.
//!
//! - `session_reconstructor`: the pure reducer and its [`Reduction`] outcomes.
//! - `live_session`: the in-memory session model.
//! - `recorded_session`: the authoritative model returned by the session store.

/// Submodule for the live (in-memory) session model.
pub mod live_session;
/// Submodule for sessions as persisted by the store.
pub mod recorded_session;
/// Submodule for the event reducer.
pub mod session_reconstructor;

pub use live_session::{LiveSession, UNKNOWN};
pub use recorded_session::RecordedSession;
pub use session_reconstructor::{Reduction, SessionReconstructor};
