//! sync_reset tool implementation.

use harbor_engine::SyncQueue;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the sync_reset tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncResetParams {
    /// Record to return to pending with its attempts and backoff cleared.
    pub id: String,
}

/// Implementation of the sync_reset tool.
pub async fn reset_impl(queue: &SyncQueue, params: SyncResetParams) -> Result<CallToolResult, McpError> {
    let record = queue.reset(&params.id).await?;
    tracing::info!(id = %record.id, tag = %record.tag, "sync record reset");
    json_result(&record)
}
