//! A live engine over the engine crate's doubles for tool tests.

use std::sync::Arc;

use harbor_core::{AppConfig, HarborDb};
use harbor_engine::testing::{FakeNetwork, FakeReplay, ok};
use harbor_engine::{ClientRegistry, Clients, Engine, EngineDeps, EngineHandle, EventLoop, NotificationCenter};
use rmcp::model::CallToolResult;
use serde::de::DeserializeOwned;
use url::Url;

pub const ORIGIN: &str = "https://app.example.com";

pub struct Harness {
    pub engine: Arc<Engine>,
    pub handle: EngineHandle,
    pub clients: Arc<ClientRegistry>,
    pub network: Arc<FakeNetwork>,
    pub replay: Arc<FakeReplay>,
    pub origin: Url,
}

/// A spawned engine in `parsed` state whose shell URLs all answer 200.
pub async fn spawn_engine(clients: Arc<dyn Clients>) -> (Arc<Engine>, EngineHandle, Arc<FakeNetwork>, Arc<FakeReplay>) {
    let config = AppConfig { origin: ORIGIN.into(), ..Default::default() };
    let db = HarborDb::open_in_memory().await.unwrap();

    let network = Arc::new(FakeNetwork::default());
    for path in &config.shell_urls {
        network.respond(path, ok("shell"));
    }
    let replay = Arc::new(FakeReplay::default());

    let deps = EngineDeps {
        network: network.clone(),
        replay: replay.clone(),
        notifier: Arc::new(NotificationCenter::default()),
        clients,
    };
    let engine = Arc::new(Engine::new(&config, db, deps).unwrap());
    let (handle, _task) = EventLoop::spawn(Arc::clone(&engine));
    (engine, handle, network, replay)
}

/// An installed and activated engine whose shell fetched cleanly.
pub async fn harness() -> Harness {
    let clients = Arc::new(ClientRegistry::default());
    let (engine, handle, network, replay) = spawn_engine(clients.clone()).await;
    handle.install().await.unwrap();
    handle.activate().await.unwrap();

    Harness { engine, handle, clients, network, replay, origin: Url::parse(ORIGIN).unwrap() }
}

/// Decode the JSON text content of a tool result.
pub fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val.get("text").and_then(|v| v.as_str()).expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
