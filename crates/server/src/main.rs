//! harbor server entry point.
//!
//! Boots the engine, runs its install and activate phases, then serves the
//! MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use harbor_client::{FetchClient, FetchConfig, ReplayClient, ReplayConfig};
use harbor_core::{AppConfig, HarborDb};
use harbor_engine::{ClientRegistry, Engine, EngineDeps, EventLoop, NotificationCenter};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod startup;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(origin = %config.origin, db_path = %config.db_path.display(), "Starting harbor on stdio transport");

    let db = HarborDb::open(&config.db_path).await?;
    let clients = Arc::new(ClientRegistry::default());
    let deps = EngineDeps {
        network: Arc::new(FetchClient::new(&FetchConfig::from(&config))?),
        replay: Arc::new(ReplayClient::new(ReplayConfig::from(&config))?),
        notifier: Arc::new(NotificationCenter::default()),
        clients: clients.clone(),
    };
    let engine = Arc::new(Engine::new(&config, db, deps)?);
    let (handle, event_loop) = EventLoop::spawn(Arc::clone(&engine));

    startup::bring_up(&handle).await;

    let handler = handler::HarborServer::new(engine, handle, clients);
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    event_loop.await?;
    Ok(())
}
