//! HTTP-backed [`SessionStore`] talking to the platform API.
//!
//! Issues `GET {base_url}{sessions_path}` with an optional `honeypot_id` query and
//! an optional bearer token, and decodes the JSON array of recorded sessions.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;

use crate::configuration::types::StoreConfig;
use crate::error_handling::types::StoreError;
use crate::session_management::RecordedSession;
use crate::storage::session_filter::SessionFilter;
use crate::storage::storage_trait::SessionStore;

pub struct HttpSessionStore {
    client: reqwest::Client,
    sessions_url: String,
    token: Option<String>,
}

impl HttpSessionStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::ClientBuild(e.to_string()))?;

        let sessions_url = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            config.sessions_path.trim_start_matches('/')
        );
        info!("HttpSessionStore reading recorded sessions from {}", sessions_url);

        Ok(Self {
            client,
            sessions_url,
            token: config.token.clone(),
        })
    }

    pub fn sessions_url(&self) -> &str {
        &self.sessions_url
    }
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn get_sessions(
        &self,
        filter: &SessionFilter,
    ) -> Result<Vec<RecordedSession>, StoreError> {
        let mut request = self
            .client
            .get(&self.sessions_url)
            .query(&filter.query_pairs());
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }

        let entries: Vec<Value> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        // One bad record must not hide the others.
        let total = entries.len();
        let sessions: Vec<RecordedSession> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!("Skipping unreadable recorded session: {}", e);
                    None
                }
            })
            .collect();
        debug!("Fetched {} of {} recorded sessions", sessions.len(), total);
        Ok(sessions)
    }
}
