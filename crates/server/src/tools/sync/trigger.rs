//! sync_trigger tool implementation.
//!
//! Delivers a sync event for one tag, or a periodic sync event that drains
//! every tag and asks open clients to resume their own sync.

use harbor_engine::{DrainReport, EngineHandle};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Tag reported to clients for a periodic sync event.
pub const PERIODIC_TAG: &str = "periodic-sync";

/// Parameters for the sync_trigger tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SyncTriggerParams {
    /// Tag to drain. When omitted, a periodic sync drains every tag.
    #[serde(default)]
    pub tag: Option<String>,
}

/// Output from the sync_trigger tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTriggerOutput {
    pub reports: Vec<DrainReport>,
}

/// Implementation of the sync_trigger tool.
pub async fn trigger_impl(handle: &EngineHandle, params: SyncTriggerParams) -> Result<CallToolResult, McpError> {
    let reports = match params.tag {
        Some(tag) => vec![handle.sync(tag).await?],
        None => handle.periodic_sync(PERIODIC_TAG).await?,
    };
    json_result(&SyncTriggerOutput { reports })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{harness, output};
    use harbor_engine::ClientMessage;
    use serde_json::json;

    #[tokio::test]
    async fn test_trigger_one_tag() {
        let h = harness().await;
        let queue = h.engine.queue();
        queue.enqueue("review-sync", json!({"n": 1}), Some("r1".into())).await.unwrap();
        queue.enqueue("review-sync", json!({"n": 2}), Some("r2".into())).await.unwrap();
        queue.enqueue("progress-sync", json!({"n": 3}), Some("p1".into())).await.unwrap();

        let params = SyncTriggerParams { tag: Some("review-sync".to_string()) };
        let result = trigger_impl(&h.handle, params).await.unwrap();
        let out: SyncTriggerOutput = output(&result);

        assert_eq!(out.reports.len(), 1);
        assert_eq!(out.reports[0].completed, 2);
        assert_eq!(out.reports[0].remaining, 0);
        assert_eq!(h.replay.delivered_ids(), vec!["r1".to_string(), "r2".to_string()]);
        assert_eq!(queue.len("progress-sync").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_trigger_rejected_keeps_records() {
        let h = harness().await;
        h.replay.set_status(503);
        h.engine.queue().enqueue("review-sync", json!({}), Some("r1".into())).await.unwrap();

        let params = SyncTriggerParams { tag: Some("review-sync".to_string()) };
        let out: SyncTriggerOutput = output(&trigger_impl(&h.handle, params).await.unwrap());
        assert_eq!(out.reports[0].failed, 1);
        assert_eq!(out.reports[0].remaining, 1);
    }

    #[tokio::test]
    async fn test_periodic_trigger_notifies_clients() {
        let h = harness().await;
        let client = h.clients.connect(&h.origin, true).await;

        let out: SyncTriggerOutput = output(&trigger_impl(&h.handle, SyncTriggerParams::default()).await.unwrap());
        assert_eq!(out.reports.len(), 3);

        let messages = h.clients.take_messages(&client.id).await.unwrap();
        assert_eq!(messages, vec![ClientMessage::SyncRequested { tag: PERIODIC_TAG.to_string() }]);
    }
}
