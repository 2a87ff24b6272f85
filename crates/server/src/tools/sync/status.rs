//! sync_status tool implementation.

use harbor_core::{Error, SyncRecord};
use harbor_engine::{SyncQueue, TagStatus};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the sync_status tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SyncStatusParams {
    /// Restrict counts to one tag.
    #[serde(default)]
    pub tag: Option<String>,

    /// Also return this record.
    #[serde(default)]
    pub id: Option<String>,
}

/// Output from the sync_status tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatusOutput {
    pub tags: Vec<TagStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<SyncRecord>,
}

/// Implementation of the sync_status tool.
pub async fn status_impl(queue: &SyncQueue, params: SyncStatusParams) -> Result<CallToolResult, McpError> {
    let tags = queue.status(params.tag.as_deref()).await?;
    let record = match params.id {
        Some(id) => Some(
            queue
                .get(&id)
                .await?
                .ok_or_else(|| Error::InvalidInput(format!("unknown sync record: {id}")))?,
        ),
        None => None,
    };
    json_result(&SyncStatusOutput { tags, record })
}
