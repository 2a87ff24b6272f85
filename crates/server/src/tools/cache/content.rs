//! cache_content tool implementation.

use harbor_engine::{ControlMessage, ControlReply, EngineHandle};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_content tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheContentParams {
    /// URLs or origin-relative paths to fetch and store.
    pub urls: Vec<String>,
}

/// Implementation of the cache_content tool.
///
/// Replies `CONTENT_CACHED` with the URLs that were stored, skipped as
/// pass-through, or failed to fetch.
pub async fn content_impl(handle: &EngineHandle, params: CacheContentParams) -> Result<CallToolResult, McpError> {
    let reply: ControlReply = handle.message(ControlMessage::CacheContent { urls: params.urls }).await?;
    json_result(&reply)
}
