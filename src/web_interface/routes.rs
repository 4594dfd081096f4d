use std::convert::Infallible;
use std::sync::Arc;

use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::types::ApiError;
use crate::monitor::LiveMonitor;

/// Every route of the read-only API.
pub fn routes(
    monitor: Arc<LiveMonitor>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    dashboard_route()
        .or(status_route(monitor.clone()))
        .or(live_session_route(monitor.clone()))
        .or(list_live_sessions_route(monitor.clone()))
        .or(recorded_sessions_route(monitor.clone()))
        .or(latest_event_route(monitor.clone()))
        .or(alerts_route(monitor.clone()))
        .or(logs_route(monitor))
}

fn with_monitor(
    monitor: Arc<LiveMonitor>,
) -> impl Filter<Extract = (Arc<LiveMonitor>,), Error = Infallible> + Clone {
    warp::any().map(move || monitor.clone())
}

/// GET /
pub fn dashboard_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path::end().and(warp::get()).map(|| {
        reply::html(
            r#"<html><head><title>HaaS Live</title></head>
                <body><h1>HaaS live monitor is running</h1>
                <p>See /status, /sessions/live, /sessions/recorded, /alerts and /logs for JSON.</p>
                </body></html>"#,
        )
    })
}

/// GET /status
pub fn status_route(
    monitor: Arc<LiveMonitor>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("status")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_monitor(monitor))
        .map(|monitor: Arc<LiveMonitor>| reply::json(&monitor.snapshot_status()))
}

/// GET /sessions/live
pub fn list_live_sessions_route(
    monitor: Arc<LiveMonitor>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("sessions" / "live")
        .and(warp::get())
        .and(with_monitor(monitor))
        .map(|monitor: Arc<LiveMonitor>| reply::json(&monitor.list_live()))
}

/// GET /sessions/live/:id
pub fn live_session_route(
    monitor: Arc<LiveMonitor>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("sessions" / "live" / String)
        .and(warp::get())
        .and(with_monitor(monitor))
        .map(|id: String, monitor: Arc<LiveMonitor>| match monitor.get(&id) {
            Some(session) => reply::with_status(reply::json(&session), StatusCode::OK),
            None => reply::with_status(
                reply::json(&ApiError::new(format!("No live session {}", id))),
                StatusCode::NOT_FOUND,
            ),
        })
}

/// GET /sessions/recorded
pub fn recorded_sessions_route(
    monitor: Arc<LiveMonitor>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("sessions" / "recorded")
        .and(warp::get())
        .and(with_monitor(monitor))
        .map(|monitor: Arc<LiveMonitor>| reply::json(&monitor.recorded_sessions()))
}

/// GET /events/latest, the last event re-encoded as a wire envelope, or `null`.
pub fn latest_event_route(
    monitor: Arc<LiveMonitor>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("events" / "latest")
        .and(warp::get())
        .and(with_monitor(monitor))
        .map(|monitor: Arc<LiveMonitor>| {
            reply::json(&monitor.last_event().map(|event| event.to_envelope()))
        })
}

/// GET /alerts
pub fn alerts_route(
    monitor: Arc<LiveMonitor>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("alerts")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_monitor(monitor))
        .map(|monitor: Arc<LiveMonitor>| reply::json(&monitor.recent_alerts()))
}

/// GET /logs
pub fn logs_route(
    monitor: Arc<LiveMonitor>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("logs")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_monitor(monitor))
        .map(|monitor: Arc<LiveMonitor>| reply::json(&monitor.recent_logs()))
}
