//! sync_enqueue tool implementation.
//!
//! Persists a mutation the foreground made while offline. Nothing is sent
//! until the tag is drained.

use harbor_core::SyncRecord;
use harbor_engine::SyncQueue;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the sync_enqueue tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncEnqueueParams {
    /// Sync tag; must name a configured target.
    pub tag: String,

    /// JSON payload replayed verbatim to the tag's endpoint.
    pub payload: serde_json::Value,

    /// Caller-chosen record id. Re-enqueueing the same id is a no-op.
    #[serde(default)]
    pub id: Option<String>,
}

/// Output from the sync_enqueue tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEnqueueOutput {
    pub record: SyncRecord,
    /// Pending records for the tag, this one included.
    pub pending: u64,
}

/// Implementation of the sync_enqueue tool.
pub async fn enqueue_impl(queue: &SyncQueue, params: SyncEnqueueParams) -> Result<CallToolResult, McpError> {
    let record = queue.enqueue(&params.tag, params.payload, params.id).await?;
    let pending = queue.len(&params.tag).await?;
    json_result(&SyncEnqueueOutput { record, pending })
}
