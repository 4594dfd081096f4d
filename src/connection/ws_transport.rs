//! WebSocket transport over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, warn};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::transport::{Connector, Subscription};
use crate::error_handling::types::ConnectionError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to a `ws://` or `wss://` event stream.
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Subscription>, ConnectionError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| ConnectionError::ConnectFailed(e.to_string()))?;
        debug!("WebSocket handshake with {} answered {}", url, response.status());
        Ok(Box::new(WsSubscription { stream }))
    }
}

pub struct WsSubscription {
    stream: WsStream,
}

#[async_trait]
impl Subscription for WsSubscription {
    async fn recv(&mut self) -> Option<Result<String, ConnectionError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => return Some(Ok(text.to_owned())),
                    Err(e) => warn!("Dropping non UTF-8 binary frame: {}", e),
                },
                Ok(Message::Close(frame)) => {
                    debug!("Close frame received: {:?}", frame);
                    return None;
                }
                // ping/pong are answered by tungstenite itself
                Ok(_) => continue,
                Err(e) => return Some(Err(ConnectionError::ConnectionLost(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("WebSocket close did not complete cleanly: {}", e);
        }
    }
}
