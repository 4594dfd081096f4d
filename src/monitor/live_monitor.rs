//! # Live Monitor
//!
//! Binds a [`ConnectionManager`] to a [`SessionReconstructor`] and keeps what a
//! dashboard needs: the live sessions, a cached view of recorded sessions, and the
//! most recent alerts and system logs.
//!
//! Events are folded one at a time by a single task. Every session end schedules a
//! refresh of the recorded view from the [`SessionStore`]; the refresh is spawned
//! only after the live entry has been removed, and a refresh that completes after a
//! newer one is discarded. A failed refresh keeps the previous view.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::feed::{Alert, BoundedFeed};
use crate::configuration::types::FeedConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::events::{StreamEvent, SystemLog};
use crate::session_management::{LiveSession, RecordedSession, Reduction, SessionReconstructor};
use crate::storage::{SessionFilter, SessionStore};

pub struct LiveMonitor {
    connection: ConnectionManager,
    view: Arc<LiveView>,
    fold: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

/// Everything readers see. Shared with the fold task and with refresh tasks.
struct LiveView {
    store: Arc<dyn SessionStore>,
    filter: SessionFilter,
    state: RwLock<MonitorState>,
    recorded: RwLock<RecordedView>,
    refresh_seq: AtomicU64,
    refreshes_completed: watch::Sender<u64>,
}

struct MonitorState {
    sessions: SessionReconstructor,
    alerts: BoundedFeed<Alert>,
    logs: BoundedFeed<SystemLog>,
    last_event: Option<StreamEvent>,
    last_event_at: Option<DateTime<Utc>>,
    events_seen: u64,
}

#[derive(Default)]
struct RecordedView {
    generation: u64,
    sessions: Vec<RecordedSession>,
    refreshed_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    /// Refresh that produced `last_error`.
    error_generation: u64,
}

/// Point-in-time summary served by `/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorStatus {
    pub monitor_id: String,
    pub stream_url: String,
    pub connection: ConnectionState,
    pub connected: bool,
    pub live_sessions: usize,
    pub recorded_sessions: usize,
    pub events_seen: u64,
    pub last_event_at: Option<DateTime<Utc>>,
    pub recorded_refreshed_at: Option<DateTime<Utc>>,
    pub last_refresh_error: Option<String>,
}

impl LiveMonitor {
    pub fn new(
        connection: ConnectionManager,
        store: Arc<dyn SessionStore>,
        filter: SessionFilter,
        feed: &FeedConfig,
    ) -> Self {
        let (refreshes_completed, _) = watch::channel(0);
        let view = LiveView {
            store,
            filter,
            state: RwLock::new(MonitorState {
                sessions: SessionReconstructor::new(),
                alerts: BoundedFeed::new(feed.alert_capacity),
                logs: BoundedFeed::new(feed.log_capacity),
                last_event: None,
                last_event_at: None,
                events_seen: 0,
            }),
            recorded: RwLock::new(RecordedView::default()),
            refresh_seq: AtomicU64::new(0),
            refreshes_completed,
        };

        Self {
            connection,
            view: Arc::new(view),
            fold: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    /// Populates the recorded view, attaches to the stream and starts folding.
    ///
    /// Calling it again only forwards to [`ConnectionManager::start`]. Has no
    /// effect once the monitor has been stopped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.stopped.load(Ordering::SeqCst) {
            warn!("[{}] start() on a stopped live monitor, ignoring", self.connection.id());
            return;
        }

        let mut fold = self.fold.lock().unwrap_or_else(PoisonError::into_inner);
        if fold.is_none() {
            info!(
                "[{}] Live monitor starting on {}",
                self.connection.id(),
                self.connection.url()
            );
            LiveView::spawn_refresh(&self.view);

            let mut events = self.connection.subscribe();
            let view = Arc::clone(&self.view);
            *fold = Some(tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    view.fold(&event);
                }
                debug!("Event fold task finished");
            }));
        }
        self.connection.start();
    }

    /// Stops the stream subscription and the fold task. In-flight refreshes may
    /// still land in the recorded view afterwards.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.connection.stop().await;
        let fold = self.fold.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(fold) = fold {
            fold.abort();
        }
        info!("[{}] Live monitor stopped", self.connection.id());
    }

    /// Folds one event as if it had arrived on the stream.
    ///
    /// Must be called from within a tokio runtime whenever the event can end a
    /// session, since that spawns a refresh of the recorded view.
    pub fn handle_event(&self, event: &StreamEvent) -> Reduction {
        self.view.fold(event)
    }

    /// Schedules a refresh of the recorded view.
    ///
    /// Must be called from within a tokio runtime.
    pub fn refresh_recorded(&self) {
        LiveView::spawn_refresh(&self.view);
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.current_state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// The most recently folded event.
    pub fn last_event(&self) -> Option<StreamEvent> {
        self.view.read_state().last_event.clone()
    }

    /// Open sessions, oldest first.
    pub fn list_live(&self) -> Vec<LiveSession> {
        self.view.read_state().sessions.list_live().cloned().collect()
    }

    pub fn get(&self, session_id: &str) -> Option<LiveSession> {
        self.view.read_state().sessions.get(session_id).cloned()
    }

    pub fn recorded_sessions(&self) -> Vec<RecordedSession> {
        self.view.read_recorded().sessions.clone()
    }

    /// Newest first.
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.view.read_state().alerts.to_vec()
    }

    /// Newest first.
    pub fn recent_logs(&self) -> Vec<SystemLog> {
        self.view.read_state().logs.to_vec()
    }

    /// Counter bumped whenever a refresh finishes, whatever its outcome.
    pub fn refreshes_completed(&self) -> watch::Receiver<u64> {
        self.view.refreshes_completed.subscribe()
    }

    pub fn snapshot_status(&self) -> MonitorStatus {
        let connection = self.connection_state();
        let state = self.view.read_state();
        let recorded = self.view.read_recorded();

        MonitorStatus {
            monitor_id: self.connection.id().to_string(),
            stream_url: self.connection.url().to_string(),
            connection,
            connected: connection.is_connected(),
            live_sessions: state.sessions.len(),
            recorded_sessions: recorded.sessions.len(),
            events_seen: state.events_seen,
            last_event_at: state.last_event_at,
            recorded_refreshed_at: recorded.refreshed_at,
            last_refresh_error: recorded.last_error.clone(),
        }
    }
}

impl Drop for LiveMonitor {
    fn drop(&mut self) {
        if let Some(fold) = self.fold.lock().unwrap_or_else(PoisonError::into_inner).take() {
            fold.abort();
        }
    }
}

impl LiveView {
    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, MonitorState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_recorded(&self) -> std::sync::RwLockReadGuard<'_, RecordedView> {
        self.recorded.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn fold(self: &Arc<Self>, event: &StreamEvent) -> Reduction {
        let reduction = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let reduction = state.sessions.apply(event);

            match event {
                StreamEvent::AttackAlert(alert) => {
                    warn!("{} from {}: {}", alert.kind, alert.source_ip, alert.payload);
                    state.alerts.push(Alert::Attack(alert.clone()));
                }
                StreamEvent::SystemAlert(alert) => {
                    warn!("System alert ({}): {}", alert.level, alert.message);
                    state.alerts.push(Alert::System(alert.clone()));
                }
                StreamEvent::SystemLog(line) => state.logs.push(line.clone()),
                StreamEvent::Unrecognized { event_type, .. } => {
                    debug!("Ignoring unrecognized {} event", event_type)
                }
                _ => {}
            }

            state.last_event = Some(event.clone());
            state.last_event_at = Some(Utc::now());
            state.events_seen += 1;
            reduction
        };

        match reduction {
            Reduction::Opened(ref id) => info!("Session {} opened", id),
            Reduction::Synthesized(ref id) => {
                info!("Session {} joined mid-flight, metadata unknown", id)
            }
            Reduction::Closed(ref id) => info!("Session {} closed", id),
            _ => {}
        }

        // The removal is committed above, so the refreshed view can never show
        // a session as both live and recorded.
        if reduction.requires_refresh() {
            Self::spawn_refresh(self);
        }
        reduction
    }

    fn spawn_refresh(view: &Arc<Self>) -> JoinHandle<()> {
        let generation = view.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let view = Arc::clone(view);
        tokio::spawn(async move { view.refresh(generation).await })
    }

    async fn refresh(&self, generation: u64) {
        debug!("Refreshing recorded sessions (#{})", generation);
        let result = self.store.get_sessions(&self.filter).await;

        {
            let mut recorded = self.recorded.write().unwrap_or_else(PoisonError::into_inner);
            match result {
                Ok(sessions) if generation > recorded.generation => {
                    debug!(
                        "Recorded view #{} holds {} sessions",
                        generation,
                        sessions.len()
                    );
                    recorded.generation = generation;
                    recorded.sessions = sessions;
                    recorded.refreshed_at = Some(Utc::now());
                    if generation > recorded.error_generation {
                        recorded.last_error = None;
                    }
                }
                Ok(_) => debug!(
                    "Discarding refresh #{}, view already at #{}",
                    generation, recorded.generation
                ),
                Err(e) => {
                    warn!("Unable to refresh recorded sessions: {}", e);
                    if generation > recorded.generation && generation > recorded.error_generation {
                        recorded.error_generation = generation;
                        recorded.last_error = Some(e.to_string());
                    }
                }
            }
        }

        self.refreshes_completed.send_modify(|n| *n += 1);
    }
}
