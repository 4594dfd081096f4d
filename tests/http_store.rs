use haas_live::configuration::types::StoreConfig;
use haas_live::error_handling::types::StoreError;
use haas_live::storage::session_filter::by_honeypot;
use haas_live::storage::{HttpSessionStore, SessionFilter, SessionStore};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_for(server: &MockServer, token: Option<&str>) -> HttpSessionStore {
    let config = StoreConfig {
        base_url: format!("{}/api/v1/", server.uri()),
        token: token.map(str::to_string),
        timeout_secs: 5,
        ..StoreConfig::default()
    };
    HttpSessionStore::new(&config).unwrap()
}

#[tokio::test]
async fn fetches_recorded_sessions_with_filter_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/observability/sessions"))
        .and(query_param("honeypot_id", "shellm-1"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "session_id": "abc",
                "honeypot_id": "shellm-1",
                "start_time": "2025-01-01T00:00:00",
                "end_time": "2025-01-01T00:04:00",
                "attacker_ip": "203.0.113.9",
                "commands": [{"input": "ls", "output": "bin etc"}]
            },
            {
                "session_id": "def",
                "start_time": "2025-01-01T01:00:00",
                "attacker_ip": "198.51.100.4"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server, Some("secret"));
    assert_eq!(
        store.sessions_url(),
        format!("{}/api/v1/observability/sessions", server.uri())
    );

    let sessions = assert_ok!(store.get_sessions(&by_honeypot("shellm-1")).await);
    assert_eq!(sessions.len(), 2);
    assert!(sessions[0].is_closed());
    assert_eq!(sessions[0].commands[0].output, "bin etc");
    assert!(!sessions[1].is_closed());
    assert!(sessions[1].commands.is_empty());
}

#[tokio::test]
async fn log_shaped_commands_and_broken_records_do_not_fail_the_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/observability/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "session_id": "abc",
                "start_time": "2025-01-01T00:00:00",
                "attacker_ip": "203.0.113.9",
                "commands": [{"input": "ls", "output": "bin etc"}]
            },
            {
                "session_id": "loki-1",
                "start_time": "2025-01-01T02:00:00",
                "attacker_ip": "198.51.100.4",
                "commands": [{"timestamp": "t", "command": "id", "response": ""}]
            },
            {"session_id": "no-start-time", "attacker_ip": "192.0.2.1"}
        ])))
        .mount(&server)
        .await;

    let sessions = assert_ok!(
        store_for(&server, None)
            .get_sessions(&SessionFilter::default())
            .await
    );
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[1].session_id, "loki-1");
    assert_eq!(sessions[1].commands[0].input, "id");
    assert_eq!(sessions[1].commands[0].timestamp.as_deref(), Some("t"));
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = store_for(&server, None)
        .get_sessions(&SessionFilter::default())
        .await;
    assert!(matches!(result, Err(StoreError::Status(500))));
}

#[tokio::test]
async fn unexpected_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "nope"})))
        .mount(&server)
        .await;

    let result = store_for(&server, None)
        .get_sessions(&SessionFilter::default())
        .await;
    assert!(matches!(result, Err(StoreError::Decode(_))));
}

#[tokio::test]
async fn unreachable_store_is_a_request_error() {
    let config = StoreConfig {
        base_url: "http://127.0.0.1:9/api/v1".to_string(),
        timeout_secs: 2,
        ..StoreConfig::default()
    };
    let result = HttpSessionStore::new(&config)
        .unwrap()
        .get_sessions(&SessionFilter::default())
        .await;
    assert!(matches!(assert_err!(result), StoreError::Request(_)));
}
