use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::info;

use super::routes::routes;
use crate::configuration::types::WebUiConfig;
use crate::error_handling::types::WebError;
use crate::monitor::LiveMonitor;

/// Web server for the read-only JSON API and landing page
pub struct WebServer {
    monitor: Arc<LiveMonitor>,
    address: SocketAddr,
}

impl WebServer {
    pub fn new(monitor: Arc<LiveMonitor>, config: &WebUiConfig) -> Result<Self, WebError> {
        let ip: IpAddr = config
            .bind_address
            .parse()
            .map_err(|e| WebError::BindFailed(format!("{}: {}", config.bind_address, e)))?;

        Ok(Self {
            monitor,
            address: SocketAddr::new(ip, config.port),
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Serves until the returned future is dropped or its task aborted.
    ///
    /// The address is probed first so an occupied port is reported as an error
    /// instead of a panic inside the server.
    pub async fn run(self) -> Result<(), WebError> {
        std::net::TcpListener::bind(self.address)
            .map_err(|e| WebError::BindFailed(format!("{}: {}", self.address, e)))?;

        info!("Web interface listening on http://{}", self.address);
        warp::serve(routes(self.monitor)).run(self.address).await;
        Ok(())
    }
}
