//! clear_cache tool implementation.

use harbor_engine::{ControlMessage, EngineHandle};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the clear_cache tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ClearCacheParams {
    /// Namespace to clear. When omitted, every current namespace is cleared.
    #[serde(default)]
    pub cache_name: Option<String>,
}

/// Implementation of the clear_cache tool.
pub async fn clear_impl(handle: &EngineHandle, params: ClearCacheParams) -> Result<CallToolResult, McpError> {
    let reply = handle.message(ControlMessage::ClearCache { cache_name: params.cache_name }).await?;
    json_result(&reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{harness, output};
    use harbor_engine::ControlReply;

    #[tokio::test]
    async fn test_clear_one_namespace() {
        let h = harness().await;

        let params = ClearCacheParams { cache_name: Some("harbor-shell-v1".to_string()) };
        let result = clear_impl(&h.handle, params).await.unwrap();
        let reply: ControlReply = output(&result);
        assert_eq!(reply, ControlReply::CacheCleared { cleared: vec!["harbor-shell-v1".to_string()] });

        let status = h.engine.store().status().await.unwrap();
        assert_eq!(status["harbor-shell-v1"].count, 0);
    }

    #[tokio::test]
    async fn test_clear_unknown_namespace() {
        let h = harness().await;
        let params = ClearCacheParams { cache_name: Some("other-app-v9".to_string()) };
        assert!(clear_impl(&h.handle, params).await.is_err());
    }
}
