//! HTTP fetch pipeline behind the engine's [`Network`] seam.
//!
//! ### URL Canonicalization
//! - Trim whitespace, resolve against the serving origin
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Limits
//! - Max redirects: 5
//! - No overall request timeout: an intercepted fetch waits as long as the
//!   network does, and the caller abandons it by dropping the future.

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, Method, header};
use std::time::Instant;

pub use url::{UrlError, canonicalize};

use harbor_core::{AppConfig, Error, InterceptedRequest, Network, NetworkResponse};

/// Headers that describe the wire encoding rather than the decoded body we keep.
const DROPPED_HEADERS: [&str; 3] = ["content-encoding", "content-length", "transfer-encoding"];

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "harbor/0.1")
    pub user_agent: String,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "harbor/0.1".to_string(), max_redirects: 5 }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), ..Default::default() }
    }
}

/// HTTP fetch client used for intercepted requests and cache warming.
pub struct FetchClient {
    http: Client,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: &FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

/// Flatten a header map, skipping values that are not valid UTF-8.
pub(crate) fn header_pairs(headers: &header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| !DROPPED_HEADERS.contains(&name.as_str()))
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}

#[async_trait]
impl Network for FetchClient {
    /// Perform the request and buffer the whole body.
    ///
    /// Any HTTP status is a response, whatever its size; only transport
    /// failures are errors. Size limits apply when a copy is cached.
    async fn fetch(&self, request: &InterceptedRequest) -> Result<NetworkResponse, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {e}", request.method)))?;

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::NetworkUnavailable(format!("{}: {e}", request.url)))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers = header_pairs(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkUnavailable(format!("failed to read response: {e}")))?;

        tracing::debug!(
            url = %request.url,
            final_url = %final_url,
            status,
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "network fetch"
        );

        Ok(NetworkResponse { status, headers, body, url: final_url })
    }
}
