//! Live monitoring of attacker sessions.
//!
//! - `live_monitor`: binds the stream connection to the session reconstructor and
//!   caches the recorded-session view.
//! - `feed`: bounded newest-first histories for alerts and system logs.

pub mod feed;
pub mod live_monitor;

pub use feed::{Alert, BoundedFeed};
pub use live_monitor::{LiveMonitor, MonitorStatus};
