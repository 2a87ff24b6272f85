//! MCP server handler implementation.
//!
//! Routes tool calls to the engine. Lifecycle, interception, control and
//! sync events go through the event loop handle; queue maintenance and
//! client bookkeeping use the shared engine and registry directly.
use std::sync::Arc;

use crate::tools::cache::{CacheContentParams, CacheStatusParams, ClearCacheParams, clear_impl, content_impl, status_impl};
use crate::tools::fetch::{FetchParams, fetch_impl};
use crate::tools::notify::{
    ClientConnectParams, ClientPollParams, NotificationClickParams, PushParams, click_impl, connect_impl, poll_impl,
    push_impl,
};
use crate::tools::sync::{
    SyncEnqueueParams, SyncPurgeParams, SyncResetParams, SyncStatusParams, SyncTriggerParams, enqueue_impl,
    purge_impl, reset_impl, status_impl as sync_status_impl, trigger_impl,
};

use harbor_engine::{ClientRegistry, Engine, EngineHandle};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use url::Url;

/// The main MCP server handler for harbor.
#[derive(Clone)]
pub struct HarborServer {
    tool_router: ToolRouter<Self>,
    engine: Arc<Engine>,
    handle: EngineHandle,
    clients: Arc<ClientRegistry>,
    origin: Url,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl HarborServer {
    pub fn new(engine: Arc<Engine>, handle: EngineHandle, clients: Arc<ClientRegistry>) -> Self {
        let origin = engine.classifier().origin().clone();
        Self { tool_router: Self::tool_router(), engine, handle, clients, origin }
    }

    #[tool(
        description = "Intercept one request. Same-origin GETs are served cache-first (static assets), network-first (API) or stale-while-revalidate (documents); everything else passes through."
    )]
    async fn fetch(&self, params: Parameters<FetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.handle, &self.origin, params.0).await
    }

    #[tool(description = "Fetch the given URLs and store each successful response in the namespace its class selects.")]
    async fn cache_content(&self, params: Parameters<CacheContentParams>) -> Result<CallToolResult, McpError> {
        content_impl(&self.handle, params.0).await
    }

    #[tool(description = "Clear one cache namespace by name, or every current namespace when no name is given.")]
    async fn clear_cache(&self, params: Parameters<ClearCacheParams>) -> Result<CallToolResult, McpError> {
        clear_impl(&self.handle, params.0).await
    }

    #[tool(description = "Entry count and stored URLs for every cache namespace.")]
    async fn get_cache_status(&self, params: Parameters<CacheStatusParams>) -> Result<CallToolResult, McpError> {
        status_impl(&self.handle, params.0).await
    }

    #[tool(description = "Queue a mutation for background replay under a sync tag. Nothing is sent until the tag syncs.")]
    async fn sync_enqueue(&self, params: Parameters<SyncEnqueueParams>) -> Result<CallToolResult, McpError> {
        enqueue_impl(self.engine.queue(), params.0).await
    }

    #[tool(
        description = "Deliver a sync event for one tag, replaying its pending records in order. Without a tag, run a periodic sync over every tag."
    )]
    async fn sync_trigger(&self, params: Parameters<SyncTriggerParams>) -> Result<CallToolResult, McpError> {
        trigger_impl(&self.handle, params.0).await
    }

    #[tool(description = "Pending, completed and failed record counts per sync tag, optionally with one record.")]
    async fn sync_status(&self, params: Parameters<SyncStatusParams>) -> Result<CallToolResult, McpError> {
        sync_status_impl(self.engine.queue(), params.0).await
    }

    #[tool(description = "Return a sync record to pending with its attempts and backoff cleared.")]
    async fn sync_reset(&self, params: Parameters<SyncResetParams>) -> Result<CallToolResult, McpError> {
        reset_impl(self.engine.queue(), params.0).await
    }

    #[tool(description = "Delete completed sync records older than the given age.")]
    async fn sync_purge(&self, params: Parameters<SyncPurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(self.engine.queue(), params.0).await
    }

    #[tool(description = "Deliver a push message and show the resulting notification.")]
    async fn push(&self, params: Parameters<PushParams>) -> Result<CallToolResult, McpError> {
        push_impl(&self.handle, params.0).await
    }

    #[tool(description = "Click a shown notification, or one of its actions, and route to a client.")]
    async fn notification_click(&self, params: Parameters<NotificationClickParams>) -> Result<CallToolResult, McpError> {
        click_impl(&self.handle, params.0).await
    }

    #[tool(description = "Register a foreground client window showing the given URL.")]
    async fn client_connect(&self, params: Parameters<ClientConnectParams>) -> Result<CallToolResult, McpError> {
        connect_impl(&self.clients, &self.origin, params.0).await
    }

    #[tool(description = "Drain the messages the engine posted to a client.")]
    async fn client_poll(&self, params: Parameters<ClientPollParams>) -> Result<CallToolResult, McpError> {
        poll_impl(&self.clients, params.0).await
    }
}

impl ServerHandler for HarborServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "harbor".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
