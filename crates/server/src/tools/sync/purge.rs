//! sync_purge tool implementation.

use std::time::Duration;

use harbor_engine::SyncQueue;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the sync_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SyncPurgeParams {
    /// Only purge records completed more than this many seconds ago (default: 0).
    #[serde(default)]
    pub older_than_secs: u64,
}

/// Output from the sync_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncPurgeOutput {
    pub purged: u64,
}

/// Implementation of the sync_purge tool. Pending and failed records are never purged.
pub async fn purge_impl(queue: &SyncQueue, params: SyncPurgeParams) -> Result<CallToolResult, McpError> {
    let purged = queue.purge_completed(Duration::from_secs(params.older_than_secs)).await?;
    json_result(&SyncPurgeOutput { purged })
}
