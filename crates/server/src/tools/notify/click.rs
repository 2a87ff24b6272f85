//! notification_click tool implementation.

use harbor_engine::EngineHandle;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the notification_click tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickParams {
    /// Tag of the clicked notification.
    pub tag: String,

    /// Action button id, if a button was clicked rather than the body.
    #[serde(default)]
    pub action: Option<String>,
}

/// Implementation of the notification_click tool.
///
/// Navigates and focuses an open same-origin client when there is one,
/// otherwise opens a new window at the notification's action URL.
pub async fn click_impl(handle: &EngineHandle, params: NotificationClickParams) -> Result<CallToolResult, McpError> {
    let outcome = handle.notification_click(params.tag, params.action).await?;
    json_result(&outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::notify::push::{PushParams, push_impl};
    use crate::tools::testing::{harness, output};
    use harbor_engine::{ClickOutcome, PushPayload};

    async fn push_tagged(h: &crate::tools::testing::Harness, tag: &str) {
        let payload = PushPayload { tag: Some(tag.to_string()), ..Default::default() };
        push_impl(&h.handle, PushParams { payload }).await.unwrap();
    }

    #[tokio::test]
    async fn test_click_opens_window_without_clients() {
        let h = harness().await;
        push_tagged(&h, "reviews").await;

        let params = NotificationClickParams { tag: "reviews".to_string(), action: None };
        let outcome: ClickOutcome = output(&click_impl(&h.handle, params).await.unwrap());
        let ClickOutcome::Opened { url, .. } = outcome else { panic!("expected a new window") };
        assert_eq!(url, "https://app.example.com/");
    }

    #[tokio::test]
    async fn test_click_focuses_open_client() {
        let h = harness().await;
        let client = h.clients.connect(&h.origin, false).await;
        push_tagged(&h, "reviews").await;

        let params = NotificationClickParams { tag: "reviews".to_string(), action: None };
        let outcome: ClickOutcome = output(&click_impl(&h.handle, params).await.unwrap());
        assert_eq!(outcome, ClickOutcome::Focused { client_id: client.id, url: "https://app.example.com/".to_string() });
    }

    #[tokio::test]
    async fn test_click_dismiss() {
        let h = harness().await;
        push_tagged(&h, "reviews").await;

        let params = NotificationClickParams { tag: "reviews".to_string(), action: Some("dismiss".to_string()) };
        let outcome: ClickOutcome = output(&click_impl(&h.handle, params).await.unwrap());
        assert_eq!(outcome, ClickOutcome::Dismissed);
    }
}
