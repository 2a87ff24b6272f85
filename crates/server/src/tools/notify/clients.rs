//! client_connect and client_poll tool implementations.
//!
//! A foreground window registers itself once, then polls for the messages
//! the engine posted to it (sync requests after a periodic sync).

use harbor_client::canonicalize;
use harbor_core::Error;
use harbor_engine::{ClientInfo, ClientMessage, ClientRegistry};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::tools::json_result;

fn default_focused() -> bool {
    true
}

/// Parameters for the client_connect tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientConnectParams {
    /// URL the client is showing; paths resolve against the origin.
    pub url: String,

    /// Whether the client has focus (default: true).
    #[serde(default = "default_focused")]
    pub focused: bool,
}

/// Parameters for the client_poll tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientPollParams {
    pub client_id: String,

    /// Unregister the client after draining its inbox.
    #[serde(default)]
    pub disconnect: bool,
}

/// Output from the client_poll tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientPollOutput {
    /// The client as the engine sees it now (it may have been navigated).
    pub client: ClientInfo,
    pub messages: Vec<ClientMessage>,
}

/// Implementation of the client_connect tool.
pub async fn connect_impl(
    registry: &ClientRegistry, origin: &Url, params: ClientConnectParams,
) -> Result<CallToolResult, McpError> {
    let url = canonicalize(origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let client = registry.connect(&url, params.focused).await;
    tracing::debug!(client_id = %client.id, url = %client.url, "client connected");
    json_result(&client)
}

/// Implementation of the client_poll tool.
pub async fn poll_impl(registry: &ClientRegistry, params: ClientPollParams) -> Result<CallToolResult, McpError> {
    let client = registry
        .get(&params.client_id)
        .await
        .ok_or_else(|| Error::InvalidInput(format!("unknown client: {}", params.client_id)))?;
    let messages = registry.take_messages(&params.client_id).await?;

    if params.disconnect {
        registry.disconnect(&params.client_id).await;
    }
    json_result(&ClientPollOutput { client, messages })
}
