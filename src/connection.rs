//! Event stream connectivity.
//!
//! - `connection_manager`: the reconnecting subscription owner.
//! - `transport`: the `Connector`/`Subscription` seam.
//! - `ws_transport`: WebSocket implementation of that seam.
//! - `types`: the connectivity signal.

pub mod connection_manager;
pub mod transport;
pub mod types;
pub mod ws_transport;

pub use connection_manager::{ConnectionManager, DEFAULT_RETRY_DELAY};
pub use transport::{Connector, Subscription};
pub use types::ConnectionState;
pub use ws_transport::WsConnector;
