use std::future::Future;
use std::sync::Arc;

use log::{error, info, warn};

use crate::configuration::config::Config;
use crate::connection::{ConnectionManager, WsConnector};
use crate::error_handling::types::*;
use crate::monitor::LiveMonitor;
use crate::storage::{HttpSessionStore, SessionFilter};
use crate::web_interface::WebServer;

/// Wires the configured components together and runs them until shutdown.
pub struct Controller {
    config: Config,
    monitor: Arc<LiveMonitor>,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        let store = HttpSessionStore::new(&config.store)?;
        info!("Recorded sessions read from {}", store.sessions_url());

        let connection = ConnectionManager::new(
            config.stream.url.clone(),
            config.stream.retry_delay(),
            Arc::new(WsConnector::new()),
        );
        let filter = SessionFilter {
            honeypot_id: config.store.honeypot_id.clone(),
        };
        let monitor = LiveMonitor::new(connection, Arc::new(store), filter, &config.feed);

        Ok(Self {
            config,
            monitor: Arc::new(monitor),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn monitor(&self) -> Arc<LiveMonitor> {
        Arc::clone(&self.monitor)
    }

    /// Runs until Ctrl-C.
    pub async fn run(&self) -> Result<(), ControllerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Unable to listen for Ctrl-C: {}", e);
            }
        })
        .await
    }

    /// Starts the monitor (and the web interface when enabled), then waits for
    /// `shutdown` or for the web interface to fail.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), ControllerError>
    where
        F: Future<Output = ()>,
    {
        self.monitor.start();

        let mut web = if self.config.web_ui.enabled {
            let server = WebServer::new(self.monitor(), &self.config.web_ui)?;
            Some(tokio::spawn(server.run()))
        } else {
            info!("Web interface disabled");
            None
        };

        let web_exit = async {
            match web.as_mut() {
                Some(handle) => handle.await,
                None => futures::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            _ = shutdown => {
                info!("Shutdown requested");
                Ok(())
            }
            exit = web_exit => match exit {
                Ok(Ok(())) => {
                    warn!("Web interface exited");
                    Ok(())
                }
                Ok(Err(e)) => Err(ControllerError::WebError(e)),
                Err(e) => Err(ControllerError::InitializationFailed(format!(
                    "web interface task failed: {}",
                    e
                ))),
            },
        };

        if let Some(handle) = web.take() {
            handle.abort();
        }
        self.shutdown().await;
        outcome
    }

    pub async fn shutdown(&self) {
        info!("Stopping live monitor");
        self.monitor.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use tokio_test::{assert_err, assert_ok};

    fn offline_config() -> Config {
        let mut config = Config::default();
        // Nothing listens on the discard port.
        config.stream.url = "ws://127.0.0.1:9/api/v1/ws/events".to_string();
        config.store.base_url = "http://127.0.0.1:9/api/v1".to_string();
        config.store.honeypot_id = Some("shellm-1".to_string());
        config
    }

    #[tokio::test]
    async fn test_new_builds_monitor_from_config() {
        let controller = Controller::new(offline_config()).unwrap();
        let status = controller.monitor().snapshot_status();
        assert_eq!(status.stream_url, "ws://127.0.0.1:9/api/v1/ws/events");
        assert_eq!(status.connection, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn shutdown_stops_the_connection() {
        let controller = Controller::new(offline_config()).unwrap();
        let result = controller
            .run_until(tokio::time::sleep(std::time::Duration::from_millis(50)))
            .await;
        assert_ok!(result);
        assert_eq!(
            controller.monitor().connection_state(),
            ConnectionState::Disconnected
        );
    }

    #[tokio::test]
    async fn occupied_web_port_fails_the_run() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = offline_config();
        config.web_ui.enabled = true;
        config.web_ui.port = taken.local_addr().unwrap().port();

        let controller = Controller::new(config).unwrap();
        let result = controller.run_until(futures::future::pending()).await;
        assert!(matches!(
            assert_err!(result),
            ControllerError::WebError(WebError::BindFailed(_))
        ));
    }
}
