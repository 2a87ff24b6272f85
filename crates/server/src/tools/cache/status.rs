//! get_cache_status tool implementation.

use harbor_engine::{ControlMessage, EngineHandle};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the get_cache_status tool (none).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusParams {}

/// Implementation of the get_cache_status tool.
pub async fn status_impl(handle: &EngineHandle, _params: CacheStatusParams) -> Result<CallToolResult, McpError> {
    let reply = handle.message(ControlMessage::GetCacheStatus).await?;
    json_result(&reply)
}
