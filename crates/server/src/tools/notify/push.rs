//! push tool implementation.
//!
//! Delivers a push message as the push service would.

use harbor_engine::{EngineHandle, PushPayload};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the push tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PushParams {
    /// Push payload. Missing fields fall back to the configured defaults.
    #[serde(default)]
    pub payload: PushPayload,
}

/// Implementation of the push tool. Returns the notification as shown.
pub async fn push_impl(handle: &EngineHandle, params: PushParams) -> Result<CallToolResult, McpError> {
    let notification = handle.push(params.payload).await?;
    json_result(&notification)
}
