//! # Connection Manager
//!
//! Owns one logical subscription to the event stream and keeps it alive.
//!
//! ```text
//!                 start()
//!  Disconnected ──────────▶ Connecting ──── connect ok ───▶ Connected
//!       ▲   ▲                   │                             │
//!       │   └── connect failed ─┘                             │
//!       │                                                     │
//!       └─────── remote close / transport error ──────────────┘
//!                (retry after a fixed delay, forever)
//! ```
//!
//! A single supervisor task drives the transitions, so there is never more than one
//! attempt in flight. Inbound messages are decoded at this boundary; malformed ones
//! are logged and dropped without touching the connection. Decoded events are handed
//! to every registered consumer one at a time, in arrival order.
//!
//! The manager is a scoped resource: one instance per subscriber context. `stop()`
//! tears it down gracefully and dropping it cancels the supervisor, so a retry timer
//! never outlives its owner.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use haas_live::connection::{ConnectionManager, WsConnector, DEFAULT_RETRY_DELAY};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = ConnectionManager::new(
//!         "ws://localhost:8000/api/v1/ws/events",
//!         DEFAULT_RETRY_DELAY,
//!         Arc::new(WsConnector::new()),
//!     );
//!     let mut events = manager.subscribe();
//!     manager.start();
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{}", event.event_type());
//!     }
//!     manager.stop().await;
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::transport::{Connector, Subscription};
use super::types::ConnectionState;
use crate::error_handling::types::ConnectionError;
use crate::events::{decode, StreamEvent};

/// Delay between losing the stream and the next connection attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Keeps one subscription to the event stream alive and fans its events out.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

/// State shared between the manager handle and its supervisor task.
struct Shared {
    id: Uuid,
    url: String,
    retry_delay: Duration,
    connector: Arc<dyn Connector>,
    state: watch::Sender<ConnectionState>,
    latest: watch::Sender<Option<StreamEvent>>,
    consumers: Mutex<Vec<mpsc::UnboundedSender<StreamEvent>>>,
    retry_now: Notify,
    shutdown: CancellationToken,
}

enum PumpExit {
    Shutdown,
    ClosedByRemote,
    Lost(ConnectionError),
}

impl ConnectionManager {
    /// Creates a manager in the `Disconnected` state. Nothing happens until [`start`].
    ///
    /// [`start`]: ConnectionManager::start
    pub fn new(
        url: impl Into<String>,
        retry_delay: Duration,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (latest, _) = watch::channel(None);
        let shared = Shared {
            id: Uuid::new_v4(),
            url: url.into(),
            retry_delay,
            connector,
            state,
            latest,
            consumers: Mutex::new(Vec::new()),
            retry_now: Notify::new(),
            shutdown: CancellationToken::new(),
        };
        debug!("[{}] ConnectionManager created for {}", shared.id, shared.url);

        Self {
            shared: Arc::new(shared),
            supervisor: Mutex::new(None),
        }
    }

    /// Begins a subscription attempt unless one is already `Connecting`/`Connected`.
    ///
    /// Idempotent. When the manager is `Disconnected` and waiting out its retry delay,
    /// the wait is cut short and the next attempt starts immediately. Has no effect
    /// once the manager has been stopped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.shared.shutdown.is_cancelled() {
            warn!("[{}] start() on a stopped connection manager, ignoring", self.shared.id);
            return;
        }

        let mut supervisor = self.supervisor.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = supervisor.as_ref() {
            if !handle.is_finished() {
                if self.current_state() == ConnectionState::Disconnected {
                    debug!("[{}] start() while waiting to retry, retrying now", self.shared.id);
                    // Only an armed retry wait may consume this; no permit is stored.
                    self.shared.retry_now.notify_waiters();
                }
                return;
            }
        }

        info!("[{}] Starting stream subscription to {}", self.shared.id, self.shared.url);
        self.shared.set_state(ConnectionState::Connecting);
        *supervisor = Some(tokio::spawn(supervise(Arc::clone(&self.shared))));
    }

    /// Cancels any pending retry, closes the active subscription and waits for the
    /// supervisor to exit. The manager cannot be restarted afterwards.
    pub async fn stop(&self) {
        self.shared.shutdown.cancel();

        let handle = self
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!("[{}] Stream supervisor panicked: {:?}", self.shared.id, e);
                }
            }
        }

        self.shared.set_state(ConnectionState::Disconnected);
        info!("[{}] Connection manager stopped", self.shared.id);
    }

    /// Registers a consumer. Every event decoded after this call is delivered to it
    /// exactly once, in arrival order. Dropping the receiver unregisters it.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .consumers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Watch handle on the connectivity signal.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.current_state().is_connected()
    }

    /// Watch handle on the most recently decoded event.
    pub fn latest_event(&self) -> watch::Receiver<Option<StreamEvent>> {
        self.shared.latest.subscribe()
    }

    pub fn last_event(&self) -> Option<StreamEvent> {
        self.shared.latest.borrow().clone()
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // The supervisor observes the token at its next await point and exits.
        self.shared.shutdown.cancel();
    }
}

impl Shared {
    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!("[{}] {} -> {}", self.id, previous, next);
        }
    }

    fn publish(&self, event: StreamEvent) {
        debug!("[{}] Publishing {} event", self.id, event.event_type());
        self.latest.send_replace(Some(event.clone()));

        let mut consumers = self.consumers.lock().unwrap_or_else(PoisonError::into_inner);
        consumers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    async fn pump(&self, subscription: &mut dyn Subscription) -> PumpExit {
        loop {
            let inbound = tokio::select! {
                _ = self.shutdown.cancelled() => return PumpExit::Shutdown,
                inbound = subscription.recv() => inbound,
            };

            match inbound {
                Some(Ok(text)) => match decode(&text) {
                    Ok(event) => self.publish(event),
                    Err(e) => warn!("[{}] Dropping stream message: {}", self.id, e),
                },
                Some(Err(e)) => return PumpExit::Lost(e),
                None => return PumpExit::ClosedByRemote,
            }
        }
    }
}

async fn supervise(shared: Arc<Shared>) {
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;
        shared.set_state(ConnectionState::Connecting);
        debug!("[{}] Connecting to {} (attempt {})", shared.id, shared.url, attempt);

        let connected = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            result = shared.connector.connect(&shared.url) => result,
        };

        match connected {
            Ok(mut subscription) => {
                shared.set_state(ConnectionState::Connected);
                info!("[{}] Connected to {}", shared.id, shared.url);
                attempt = 0;

                match shared.pump(subscription.as_mut()).await {
                    PumpExit::Shutdown => {
                        subscription.close().await;
                        break;
                    }
                    PumpExit::ClosedByRemote => {
                        info!("[{}] Stream closed by remote", shared.id)
                    }
                    PumpExit::Lost(e) => warn!("[{}] {}", shared.id, e),
                }
            }
            Err(e) => warn!("[{}] {}", shared.id, e),
        }

        // Armed before the state flips so a start() that sees Disconnected
        // always reaches this wait.
        let retry_now = shared.retry_now.notified();
        tokio::pin!(retry_now);
        retry_now.as_mut().enable();

        shared.set_state(ConnectionState::Disconnected);
        info!(
            "[{}] Reconnecting in {:?}",
            shared.id, shared.retry_delay
        );

        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = &mut retry_now => {
                debug!("[{}] Retry delay cut short", shared.id)
            }
            _ = tokio::time::sleep(shared.retry_delay) => {}
        }
    }

    shared.set_state(ConnectionState::Disconnected);
    debug!("[{}] Supervisor exited", shared.id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;
    use tokio::time::Instant;

    type Line = Result<String, ConnectionError>;
    type Script = mpsc::UnboundedSender<Result<ScriptedSubscription, ConnectionError>>;

    /// Connector whose attempts block until the test hands it an outcome.
    struct ScriptedConnector {
        attempts: AtomicUsize,
        outcomes: AsyncMutex<mpsc::UnboundedReceiver<Result<ScriptedSubscription, ConnectionError>>>,
    }

    struct ScriptedSubscription {
        lines: mpsc::UnboundedReceiver<Line>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn Subscription>, ConnectionError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let outcome = self.outcomes.lock().await.recv().await;
            match outcome {
                Some(Ok(subscription)) => Ok(Box::new(subscription)),
                Some(Err(e)) => Err(e),
                None => std::future::pending().await,
            }
        }
    }

    #[async_trait]
    impl Subscription for ScriptedSubscription {
        async fn recv(&mut self) -> Option<Line> {
            self.lines.recv().await
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
            self.lines.close();
        }
    }

    /// Live side of one scripted subscription. Dropping `lines` closes it abruptly.
    struct Remote {
        lines: mpsc::UnboundedSender<Line>,
        closed: Arc<AtomicBool>,
    }

    impl Remote {
        fn send(&self, text: &str) {
            self.lines.send(Ok(text.to_string())).unwrap();
        }
    }

    fn accept(script: &Script) -> Remote {
        let (lines_tx, lines_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        script
            .send(Ok(ScriptedSubscription {
                lines: lines_rx,
                closed: Arc::clone(&closed),
            }))
            .unwrap();
        Remote {
            lines: lines_tx,
            closed,
        }
    }

    fn manager(delay: Duration) -> (ConnectionManager, Arc<ScriptedConnector>, Script) {
        let _ = env_logger::builder().is_test(true).try_init();
        let (script, outcomes) = mpsc::unbounded_channel();
        let connector = Arc::new(ScriptedConnector {
            attempts: AtomicUsize::new(0),
            outcomes: AsyncMutex::new(outcomes),
        });
        let manager = ConnectionManager::new("ws://test/events", delay, connector.clone());
        (manager, connector, script)
    }

    const START: &str = r#"{"type":"session_start","payload":{"session_id":"abc","attacker_ip":"10.0.0.5","started_at":"T0"}}"#;
    const COMMAND: &str = r#"{"type":"session_command","payload":{"session_id":"abc","command":{"input":"ls","output":"file.txt"}}}"#;

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_fixed_delay_across_repeated_failures() {
        let (manager, connector, script) = manager(DEFAULT_RETRY_DELAY);
        let mut state = manager.state();

        assert_eq!(manager.current_state(), ConnectionState::Disconnected);
        manager.start();
        assert_eq!(manager.current_state(), ConnectionState::Connecting);

        for round in 1..=4 {
            let remote = accept(&script);
            state.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();
            assert_eq!(connector.attempts.load(Ordering::SeqCst), round);

            // abrupt close
            drop(remote);
            state.wait_for(|s| *s == ConnectionState::Disconnected).await.unwrap();
            let lost_at = Instant::now();

            state.wait_for(|s| *s == ConnectionState::Connecting).await.unwrap();
            let waited = lost_at.elapsed();
            assert!(waited >= DEFAULT_RETRY_DELAY, "retried after {:?}", waited);
            assert!(waited < DEFAULT_RETRY_DELAY + Duration::from_millis(50));
        }

        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_is_retried_like_a_lost_connection() {
        let (manager, connector, script) = manager(DEFAULT_RETRY_DELAY);
        let mut state = manager.state();
        manager.start();

        script
            .send(Err(ConnectionError::ConnectFailed("refused".to_string())))
            .unwrap();
        state.wait_for(|s| *s == ConnectionState::Disconnected).await.unwrap();

        let _remote = accept(&script);
        state.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);

        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent_while_connected() {
        let (manager, connector, script) = manager(DEFAULT_RETRY_DELAY);
        let mut state = manager.state();
        let _remote = accept(&script);

        manager.start();
        state.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();
        manager.start();
        manager.start();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
        assert!(manager.is_connected());
        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_waiting_to_retry_cuts_the_delay_short() {
        let (manager, connector, script) = manager(Duration::from_secs(60));
        let mut state = manager.state();
        manager.start();

        let remote = accept(&script);
        state.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();
        drop(remote);
        state.wait_for(|s| *s == ConnectionState::Disconnected).await.unwrap();
        let lost_at = Instant::now();

        manager.start();
        let _remote = accept(&script);
        state.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();

        assert!(lost_at.elapsed() < Duration::from_secs(1));
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_at_the_retry_deadline_keeps_the_next_delay() {
        let (manager, connector, script) = manager(DEFAULT_RETRY_DELAY);
        let mut state = manager.state();
        manager.start();

        for round in 1..=20 {
            let remote = accept(&script);
            state.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();
            assert_eq!(connector.attempts.load(Ordering::SeqCst), round);

            drop(remote);
            state.wait_for(|s| *s == ConnectionState::Disconnected).await.unwrap();
            let lost_at = Instant::now();

            if round % 2 == 1 {
                // race start() against the retry timer firing
                tokio::time::advance(DEFAULT_RETRY_DELAY).await;
                manager.start();
            }

            state.wait_for(|s| *s == ConnectionState::Connecting).await.unwrap();
            let waited = lost_at.elapsed();
            assert!(
                waited >= DEFAULT_RETRY_DELAY,
                "round {} retried after {:?}",
                round,
                waited
            );
        }

        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_events_in_order_and_drops_malformed_messages() {
        let (manager, _connector, script) = manager(DEFAULT_RETRY_DELAY);
        let mut events = manager.subscribe();
        let mut state = manager.state();
        manager.start();

        let remote = accept(&script);
        state.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();
        remote.send(START);
        remote.send("{not json");
        remote.send(r#"{"type":"session_command","payload":{}}"#);
        remote.send(COMMAND);

        let first = events.recv().await.unwrap();
        let second = events.recv().await.unwrap();
        assert!(matches!(first, StreamEvent::SessionStart(_)));
        assert!(matches!(second, StreamEvent::SessionCommand(_)));
        assert!(events.try_recv().is_err());

        assert!(manager.is_connected());
        assert_eq!(manager.last_event(), Some(second));
        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_counts_as_connection_loss() {
        let (manager, _connector, script) = manager(DEFAULT_RETRY_DELAY);
        let mut state = manager.state();
        manager.start();

        let remote = accept(&script);
        state.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();
        remote
            .lines
            .send(Err(ConnectionError::ConnectionLost("reset by peer".to_string())))
            .unwrap();

        state.wait_for(|s| *s == ConnectionState::Disconnected).await.unwrap();
        state.wait_for(|s| *s == ConnectionState::Connecting).await.unwrap();
        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_closes_subscription_and_cancels_retries() {
        let (manager, connector, script) = manager(DEFAULT_RETRY_DELAY);
        let mut state = manager.state();
        manager.start();

        let remote = accept(&script);
        state.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();

        manager.stop().await;
        assert!(remote.closed.load(Ordering::SeqCst));
        assert_eq!(manager.current_state(), ConnectionState::Disconnected);

        manager.start();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(manager.current_state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_manager_cancels_the_pending_retry() {
        let (manager, connector, script) = manager(DEFAULT_RETRY_DELAY);
        let mut state = manager.state();
        manager.start();

        let remote = accept(&script);
        state.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();
        drop(remote);
        state.wait_for(|s| *s == ConnectionState::Disconnected).await.unwrap();

        drop(manager);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
    }
}
