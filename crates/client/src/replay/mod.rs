//! Replay of queued mutations against their drain endpoints.
//!
//! Each record is delivered as an HTTP `POST` of its JSON payload. The record
//! id travels in `x-harbor-sync-id` so the server can drop duplicates of a
//! replay whose acknowledgement was lost.

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use url::Url;

use harbor_core::{AppConfig, Error, ReplayTarget};

pub const SYNC_ID_HEADER: &str = "x-harbor-sync-id";
pub const SYNC_TAG_HEADER: &str = "x-harbor-sync-tag";

/// Configuration for the replay client.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// User agent string (default: "harbor/0.1")
    pub user_agent: String,

    /// Per-record request timeout (default: 20s)
    pub timeout: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { user_agent: "harbor/0.1".to_string(), timeout: Duration::from_millis(20_000) }
    }
}

impl From<&AppConfig> for ReplayConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.replay_timeout() }
    }
}

/// HTTP replay client.
pub struct ReplayClient {
    http: Client,
}

impl ReplayClient {
    pub fn new(config: ReplayConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl ReplayTarget for ReplayClient {
    async fn replay(
        &self, endpoint: &Url, record_id: &str, tag: &str, payload: &serde_json::Value,
    ) -> Result<(), Error> {
        let start = Instant::now();
        let response = self
            .http
            .post(endpoint.clone())
            .header(SYNC_ID_HEADER, record_id)
            .header(SYNC_TAG_HEADER, tag)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::NetworkUnavailable(format!("{endpoint}: {e}")))?;

        let status = response.status();
        tracing::debug!(
            record_id,
            tag,
            status = status.as_u16(),
            replay_ms = start.elapsed().as_millis() as u64,
            "replayed sync record"
        );

        if status.is_success() {
            Ok(())
        } else {
            Err(Error::ReplayRejected { record_id: record_id.to_string(), status: status.as_u16() })
        }
    }
}
