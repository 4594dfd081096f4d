//! Transport seam of the connection manager.
//!
//! The manager never talks to a socket directly: a [`Connector`] opens a
//! [`Subscription`], which yields whole text messages until the remote side goes away.

use async_trait::async_trait;

use crate::error_handling::types::ConnectionError;

/// Opens subscriptions to the event stream.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Box<dyn Subscription>, ConnectionError>;
}

/// One established subscription.
#[async_trait]
pub trait Subscription: Send {
    /// Next inbound message.
    ///
    /// - `Some(Ok(text))`: one whole message, in arrival order.
    /// - `Some(Err(_))`: the transport became unusable.
    /// - `None`: the remote side closed the subscription.
    ///
    /// Must be cancel safe: the manager races it against its shutdown signal.
    async fn recv(&mut self) -> Option<Result<String, ConnectionError>>;

    /// Closes the subscription from our side. Errors are swallowed.
    async fn close(&mut self);
}
