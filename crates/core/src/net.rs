//! Network seams between the engine and the outside world.
//!
//! The engine never talks to HTTP directly. Intercepted fetches go through
//! [`Network`] and queued mutations are replayed through [`ReplayTarget`], so
//! tests can substitute in-process doubles.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::Error;
use crate::cache::StoredResponse;

/// A request seen by the interception layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl InterceptedRequest {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self { method: method.into().to_ascii_uppercase(), url, headers: Vec::new() }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A response as it came back from the network (or was synthesized).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Final URL after redirects.
    pub url: Url,
}

impl NetworkResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Copy suitable for persisting in a cache namespace.
    pub fn to_stored(&self) -> StoredResponse {
        StoredResponse { status: self.status, headers: self.headers.clone(), body: self.body.to_vec() }
    }

    /// Rebuild a response from a stored copy.
    pub fn from_stored(stored: StoredResponse, url: Url) -> Self {
        Self { status: stored.status, headers: stored.headers, body: Bytes::from(stored.body), url }
    }
}

/// Outbound fetch used by the strategies.
///
/// A non-2xx status is still `Ok`; only a rejected fetch (no response at all)
/// is `Err(Error::NetworkUnavailable)`.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<NetworkResponse, Error>;
}

/// Endpoint that accepts replayed sync records.
#[async_trait]
pub trait ReplayTarget: Send + Sync {
    /// Deliver one record's payload.
    ///
    /// Returns `Error::ReplayRejected` for a non-2xx answer and
    /// `Error::NetworkUnavailable` when the endpoint cannot be reached.
    async fn replay(&self, endpoint: &Url, record_id: &str, tag: &str, payload: &serde_json::Value)
    -> Result<(), Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16) -> NetworkResponse {
        NetworkResponse {
            status,
            headers: vec![("Content-Type".into(), "text/css".into())],
            body: Bytes::from_static(b"body{}"),
            url: Url::parse("https://example.com/app.css").unwrap(),
        }
    }

    #[test]
    fn test_success_range() {
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(304).is_success());
        assert!(!response(503).is_success());
    }

    #[test]
    fn test_stored_conversion() {
        let original = response(200);
        let stored = original.to_stored();
        assert_eq!(stored.body, b"body{}".to_vec());

        let rebuilt = NetworkResponse::from_stored(stored, original.url.clone());
        assert_eq!(rebuilt, original);
        assert_eq!(rebuilt.header("content-type"), Some("text/css"));
    }

    #[test]
    fn test_request_method_uppercased() {
        let request = InterceptedRequest::new("post", Url::parse("https://example.com/").unwrap());
        assert_eq!(request.method, "POST");
    }
}
