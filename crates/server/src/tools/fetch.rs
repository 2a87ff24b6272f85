//! fetch tool implementation.
//!
//! Routes one request through interception exactly as a page load would.

use std::collections::BTreeMap;

use harbor_client::canonicalize;
use harbor_core::{Error, InterceptedRequest};
use harbor_engine::{EngineHandle, OFFLINE_HEADER, ResponseSource};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use super::json_result;

fn default_method() -> String {
    "GET".to_string()
}

/// Parameters for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// Absolute URL, or a path resolved against the origin.
    pub url: String,

    /// HTTP method (default: GET). Anything but GET passes through uncached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Output from the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchOutput {
    /// Canonical request URL.
    pub url: String,
    pub status: u16,
    /// Where the response came from.
    pub source: String,
    /// Whether the response carries the offline marker header.
    pub offline: bool,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
    pub body_len: usize,
}

/// Implementation of the fetch tool.
pub async fn fetch_impl(handle: &EngineHandle, origin: &Url, params: FetchParams) -> Result<CallToolResult, McpError> {
    let url = canonicalize(origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let mut request = InterceptedRequest::new(params.method, url);
    for (name, value) in params.headers {
        request = request.with_header(name, value);
    }

    let canonical = request.url.to_string();
    let served = handle.fetch(request).await?;
    let response = served.response;

    let output = FetchOutput {
        url: canonical,
        status: response.status,
        source: source_name(served.source),
        offline: response.header(OFFLINE_HEADER).is_some(),
        body: String::from_utf8_lossy(&response.body).into_owned(),
        body_len: response.body.len(),
        headers: response.headers,
    };
    json_result(&output)
}

fn source_name(source: ResponseSource) -> String {
    serde_json::to_value(source)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}
