//! Engine object and event loop.
//!
//! [`Engine`] owns every component and is built once per process with its
//! dependencies injected. [`EventLoop`] feeds it events from a channel:
//! lifecycle events run inline, so nothing else is dequeued until they
//! finish, while every other event runs as its own task. Callers talk to the
//! loop through a cloneable [`EngineHandle`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use harbor_core::{AppConfig, Error, HarborDb, InterceptedRequest, NamespaceCategory, Network, ReplayTarget};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use url::Url;

use crate::classify::Classifier;
use crate::control::{ControlChannel, ControlMessage, ControlReply};
use crate::notify::{ClickOutcome, Clients, Notification, NotificationDispatcher, Notifier, PushPayload};
use crate::store::CacheStore;
use crate::strategy::{EngineResponse, Strategies};
use crate::sync::{DrainReport, SyncQueue};

const EVENT_CAPACITY: usize = 256;

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub namespaces: Vec<String>,
    pub warmed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActivateReport {
    pub evicted: Vec<String>,
    pub claimed: usize,
}

/// External collaborators the engine is written against.
pub struct EngineDeps {
    pub network: Arc<dyn Network>,
    pub replay: Arc<dyn ReplayTarget>,
    pub notifier: Arc<dyn Notifier>,
    pub clients: Arc<dyn Clients>,
}

pub struct Engine {
    classifier: Classifier,
    store: CacheStore,
    strategies: Strategies,
    queue: SyncQueue,
    control: ControlChannel,
    dispatcher: NotificationDispatcher,
    network: Arc<dyn Network>,
    shell_urls: Vec<Url>,
    state: RwLock<WorkerState>,
}

impl Engine {
    pub fn new(config: &AppConfig, db: HarborDb, deps: EngineDeps) -> Result<Self, Error> {
        let classifier = Classifier::from_config(config)?;
        let origin = classifier.origin().clone();
        let resolve = |path: &str| origin.join(path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")));

        let shell_urls = config.shell_urls.iter().map(|path| resolve(path)).collect::<Result<Vec<_>, _>>()?;
        let offline_fallback = config.offline_fallback.as_deref().map(resolve).transpose()?;

        let store = CacheStore::from_config(db.clone(), config);
        let strategies = Strategies::new(store.clone(), Arc::clone(&deps.network), offline_fallback);
        let queue = SyncQueue::from_config(db, deps.replay, config)?;
        let control = ControlChannel::new(classifier.clone(), store.clone(), Arc::clone(&deps.network));
        let dispatcher = NotificationDispatcher::new(config, deps.notifier, deps.clients)?;

        Ok(Self {
            classifier,
            store,
            strategies,
            queue,
            control,
            dispatcher,
            network: deps.network,
            shell_urls,
            state: RwLock::new(WorkerState::Parsed),
        })
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Create the current namespaces and warm the app shell.
    ///
    /// Warming is all-or-nothing: every shell URL must fetch with a 2xx before
    /// any of them is stored. On failure the engine returns to `parsed`.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let mut state = self.state.write().await;
        if *state != WorkerState::Parsed {
            return Err(Error::Lifecycle(format!("cannot install while {}", *state)));
        }
        *state = WorkerState::Installing;
        tracing::info!(version = self.store.version(), "installing");

        match self.warm_shell().await {
            Ok(report) => {
                *state = WorkerState::Installed;
                tracing::info!(warmed = report.warmed.len(), "installed");
                Ok(report)
            }
            Err(e) => {
                *state = WorkerState::Parsed;
                tracing::warn!(error = %e, "install failed");
                Err(e)
            }
        }
    }

    async fn warm_shell(&self) -> Result<InstallReport, Error> {
        let namespaces = self.store.ensure_namespaces().await?;

        let mut fetched = Vec::with_capacity(self.shell_urls.len());
        for url in &self.shell_urls {
            let request = InterceptedRequest::get(url.clone());
            let response = self.network.fetch(&request).await?;
            if !response.is_success() {
                return Err(Error::NetworkUnavailable(format!("shell URL {url} returned {}", response.status)));
            }
            fetched.push((request, response));
        }

        let mut warmed = Vec::with_capacity(fetched.len());
        for (request, response) in &fetched {
            self.store.put(NamespaceCategory::Shell, request, response).await?;
            warmed.push(request.url.to_string());
        }
        Ok(InstallReport { namespaces, warmed })
    }

    /// Evict stale namespaces, then claim every client.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let mut state = self.state.write().await;
        if *state != WorkerState::Installed {
            return Err(Error::Lifecycle(format!("cannot activate while {}", *state)));
        }
        *state = WorkerState::Activating;

        let evicted = match self.store.evict_stale().await {
            Ok(evicted) => evicted,
            Err(e) => {
                *state = WorkerState::Installed;
                return Err(e);
            }
        };
        let claimed = match self.dispatcher.clients().claim().await {
            Ok(claimed) => claimed,
            Err(e) => {
                *state = WorkerState::Installed;
                return Err(e);
            }
        };

        *state = WorkerState::Activated;
        tracing::info!(evicted = evicted.len(), claimed, "activated");
        Ok(ActivateReport { evicted, claimed })
    }

    /// Serve an intercepted request.
    ///
    /// Until activation, and for requests the classifier rejects, the request
    /// goes straight to the network.
    pub async fn fetch(&self, request: InterceptedRequest) -> Result<EngineResponse, Error> {
        let state = self.state.read().await;
        if *state != WorkerState::Activated {
            return self.strategies.pass_through(&request).await;
        }

        match self.classifier.classify(&request.method, &request.url) {
            Some(class) => Ok(self.strategies.handle(class, &request).await),
            None => self.strategies.pass_through(&request).await,
        }
    }

    pub async fn message(&self, message: ControlMessage) -> Result<ControlReply, Error> {
        self.control.handle(message).await
    }

    /// Background-sync signal for one tag.
    pub async fn sync(&self, tag: &str) -> Result<DrainReport, Error> {
        self.queue.drain(tag).await
    }

    /// Periodic signal: drain every tag, then ask clients to resume their own sync.
    pub async fn periodic_sync(&self, tag: &str) -> Result<Vec<DrainReport>, Error> {
        let reports = self.queue.drain_all().await?;
        self.dispatcher.request_client_sync(tag).await?;
        Ok(reports)
    }

    pub async fn push(&self, payload: PushPayload) -> Result<Notification, Error> {
        self.dispatcher.push(payload).await
    }

    pub async fn notification_click(&self, tag: &str, action: Option<&str>) -> Result<ClickOutcome, Error> {
        self.dispatcher.click(tag, action).await
    }

    /// Wait for background revalidations to finish.
    pub async fn settle(&self) {
        self.strategies.settle().await;
    }
}

type Reply<T> = oneshot::Sender<Result<T, Error>>;

/// One event delivered to the engine.
pub enum WorkerEvent {
    Install { reply: Reply<InstallReport> },
    Activate { reply: Reply<ActivateReport> },
    Fetch { request: InterceptedRequest, reply: Reply<EngineResponse> },
    Message { message: ControlMessage, reply: Reply<ControlReply> },
    Sync { tag: String, reply: Reply<DrainReport> },
    PeriodicSync { tag: String, reply: Reply<Vec<DrainReport>> },
    Push { payload: PushPayload, reply: Reply<Notification> },
    NotificationClick { tag: String, action: Option<String>, reply: Reply<ClickOutcome> },
}

pub struct EventLoop {
    engine: Arc<Engine>,
    events: mpsc::Receiver<WorkerEvent>,
    tasks: JoinSet<()>,
}

impl EventLoop {
    pub fn new(engine: Arc<Engine>) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        (Self { engine, events: rx, tasks: JoinSet::new() }, EngineHandle { events: tx })
    }

    /// Run the loop on its own task.
    pub fn spawn(engine: Arc<Engine>) -> (EngineHandle, JoinHandle<()>) {
        let (event_loop, handle) = Self::new(engine);
        (handle, tokio::spawn(event_loop.run()))
    }

    /// Process events until every handle is dropped, then wait for in-flight tasks.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            while self.tasks.try_join_next().is_some() {}
            self.dispatch(event).await;
        }
        while self.tasks.join_next().await.is_some() {}
        tracing::debug!("event loop stopped");
    }

    async fn dispatch(&mut self, event: WorkerEvent) {
        let engine = Arc::clone(&self.engine);
        match event {
            WorkerEvent::Install { reply } => {
                let _ = reply.send(engine.install().await);
            }
            WorkerEvent::Activate { reply } => {
                let _ = reply.send(engine.activate().await);
            }
            WorkerEvent::Fetch { request, reply } => {
                self.respond(reply, async move { engine.fetch(request).await });
            }
            WorkerEvent::Message { message, reply } => {
                self.respond(reply, async move { engine.message(message).await });
            }
            WorkerEvent::Sync { tag, reply } => {
                self.respond(reply, async move { engine.sync(&tag).await });
            }
            WorkerEvent::PeriodicSync { tag, reply } => {
                self.respond(reply, async move { engine.periodic_sync(&tag).await });
            }
            WorkerEvent::Push { payload, reply } => {
                self.respond(reply, async move { engine.push(payload).await });
            }
            WorkerEvent::NotificationClick { tag, action, reply } => {
                self.respond(reply, async move { engine.notification_click(&tag, action.as_deref()).await });
            }
        }
    }

    /// Run `work` as a task. If the caller stops waiting, the work is dropped.
    fn respond<T, F>(&mut self, mut reply: Reply<T>, work: F)
    where
        T: Send + 'static,
        F: Future<Output = Result<T, Error>> + Send + 'static,
    {
        self.tasks.spawn(async move {
            let outcome = tokio::select! {
                result = work => Some(result),
                _ = reply.closed() => None,
            };
            match outcome {
                Some(result) => {
                    let _ = reply.send(result);
                }
                None => tracing::debug!("caller went away, event abandoned"),
            }
        });
    }
}

/// Cloneable sender side of the event loop.
#[derive(Clone)]
pub struct EngineHandle {
    events: mpsc::Sender<WorkerEvent>,
}

impl EngineHandle {
    async fn request<T>(&self, event: impl FnOnce(Reply<T>) -> WorkerEvent) -> Result<T, Error> {
        let (tx, rx) = oneshot::channel();
        self.events.send(event(tx)).await.map_err(|_| Error::ChannelClosed)?;
        rx.await.map_err(|_| Error::ChannelClosed)?
    }

    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.request(|reply| WorkerEvent::Install { reply }).await
    }

    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.request(|reply| WorkerEvent::Activate { reply }).await
    }

    pub async fn fetch(&self, request: InterceptedRequest) -> Result<EngineResponse, Error> {
        self.request(|reply| WorkerEvent::Fetch { request, reply }).await
    }

    pub async fn message(&self, message: ControlMessage) -> Result<ControlReply, Error> {
        self.request(|reply| WorkerEvent::Message { message, reply }).await
    }

    pub async fn sync(&self, tag: impl Into<String>) -> Result<DrainReport, Error> {
        let tag = tag.into();
        self.request(|reply| WorkerEvent::Sync { tag, reply }).await
    }

    pub async fn periodic_sync(&self, tag: impl Into<String>) -> Result<Vec<DrainReport>, Error> {
        let tag = tag.into();
        self.request(|reply| WorkerEvent::PeriodicSync { tag, reply }).await
    }

    pub async fn push(&self, payload: PushPayload) -> Result<Notification, Error> {
        self.request(|reply| WorkerEvent::Push { payload, reply }).await
    }

    pub async fn notification_click(&self, tag: impl Into<String>, action: Option<String>) -> Result<ClickOutcome, Error> {
        let tag = tag.into();
        self.request(|reply| WorkerEvent::NotificationClick { tag, action, reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{ClientMessage, ClientRegistry, NotificationCenter};
    use crate::strategy::{OFFLINE_HEADER, ResponseSource};
    use crate::testing::{FakeNetwork, FakeReplay, ok};
    use async_trait::async_trait;
    use bytes::Bytes;
    use harbor_core::{NetworkResponse, SyncStatus};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    const ORIGIN: &str = "https://app.example.com";

    struct Harness {
        engine: Arc<Engine>,
        handle: EngineHandle,
        network: Arc<FakeNetwork>,
        replay: Arc<FakeReplay>,
        clients: Arc<ClientRegistry>,
        db: HarborDb,
    }

    fn config(version: u32) -> AppConfig {
        AppConfig { origin: ORIGIN.into(), cache_version: version, ..Default::default() }
    }

    fn request(path: &str) -> InterceptedRequest {
        InterceptedRequest::get(Url::parse(ORIGIN).unwrap().join(path).unwrap())
    }

    fn online_network() -> Arc<FakeNetwork> {
        let network = Arc::new(FakeNetwork::default());
        network.respond("/", ok("<html>shell</html>"));
        network.respond("/offline.html", ok("<html>offline</html>"));
        network.respond("/manifest.json", ok("{}"));
        network
    }

    async fn harness_with(db: HarborDb, version: u32, network: Arc<FakeNetwork>) -> Harness {
        let replay = Arc::new(FakeReplay::default());
        let clients = Arc::new(ClientRegistry::default());
        let deps = EngineDeps {
            network: network.clone(),
            replay: replay.clone(),
            notifier: Arc::new(NotificationCenter::default()),
            clients: clients.clone(),
        };
        let engine = Arc::new(Engine::new(&config(version), db.clone(), deps).unwrap());
        let (handle, _join) = EventLoop::spawn(Arc::clone(&engine));
        Harness { engine, handle, network, replay, clients, db }
    }

    async fn activated() -> Harness {
        let db = HarborDb::open_in_memory().await.unwrap();
        let h = harness_with(db, 1, online_network()).await;
        h.handle.install().await.unwrap();
        h.handle.activate().await.unwrap();
        h
    }

    #[tokio::test]
    async fn test_lifecycle_order() {
        let db = HarborDb::open_in_memory().await.unwrap();
        let h = harness_with(db, 1, online_network()).await;
        assert_eq!(h.engine.state().await, WorkerState::Parsed);

        let result = h.handle.activate().await;
        assert!(matches!(result, Err(Error::Lifecycle(_))));

        let report = h.handle.install().await.unwrap();
        assert_eq!(report.namespaces.len(), 3);
        assert_eq!(report.warmed.len(), 3);
        assert_eq!(h.engine.state().await, WorkerState::Installed);

        h.handle.activate().await.unwrap();
        assert_eq!(h.engine.state().await, WorkerState::Activated);
        assert!(matches!(h.handle.install().await, Err(Error::Lifecycle(_))));
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let db = HarborDb::open_in_memory().await.unwrap();
        let network = online_network();
        network.fail("/manifest.json");
        let h = harness_with(db, 1, network).await;

        assert!(h.handle.install().await.is_err());
        assert_eq!(h.engine.state().await, WorkerState::Parsed);
        let status = h.engine.store().status().await.unwrap();
        assert_eq!(status["harbor-shell-v1"].count, 0);

        let h2 = harness_with(h.db.clone(), 1, online_network()).await;
        h2.handle.install().await.unwrap();
        assert_eq!(h2.engine.store().status().await.unwrap()["harbor-shell-v1"].count, 3);
    }

    #[tokio::test]
    async fn test_fetch_before_activation_passes_through() {
        let db = HarborDb::open_in_memory().await.unwrap();
        let h = harness_with(db, 1, online_network()).await;
        h.network.respond("/app.js", ok("js"));

        let response = h.handle.fetch(request("/app.js")).await.unwrap();
        assert_eq!(response.source, ResponseSource::PassThrough);
        assert!(h.engine.store().status().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_static_asset_scenario() {
        let h = activated().await;
        h.network.respond("/app.js", ok("console.log('v1')"));
        let before = h.network.calls();

        let first = h.handle.fetch(request("/app.js")).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network);
        assert_eq!(h.network.calls(), before + 1);

        h.network.go_offline();
        let second = h.handle.fetch(request("/app.js")).await.unwrap();
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.response.body, first.response.body);
        assert_eq!(h.network.calls(), before + 1);
    }

    #[tokio::test]
    async fn test_api_offline_scenario() {
        let h = activated().await;
        h.network.respond("/api/review/queue", ok(r#"{"due":3}"#));
        h.handle.fetch(request("/api/review/queue")).await.unwrap();

        h.network.go_offline();
        let response = h.handle.fetch(request("/api/review/queue")).await.unwrap();
        assert_eq!(response.source, ResponseSource::CacheStale);
        assert_eq!(response.response.body, Bytes::from_static(br#"{"due":3}"#));
        assert_eq!(response.response.header(OFFLINE_HEADER), Some("stale"));

        let uncached = h.handle.fetch(request("/api/statistics")).await.unwrap();
        assert_eq!(uncached.response.status, 503);
        assert_eq!(uncached.response.header(OFFLINE_HEADER), Some("uncached"));
    }

    #[tokio::test]
    async fn test_document_served_from_shell_and_revalidated_once() {
        let h = activated().await;
        let before = h.network.calls();
        h.network.respond("/", ok("<html>shell v2</html>"));

        let response = h.handle.fetch(request("/")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.response.body, Bytes::from_static(b"<html>shell</html>"));

        h.engine.settle().await;
        assert_eq!(h.network.calls(), before + 1);
        let cached = h.engine.store().get(NamespaceCategory::Shell, &request("/")).await.unwrap().unwrap();
        assert_eq!(cached.body, Bytes::from_static(b"<html>shell v2</html>"));
    }

    #[tokio::test]
    async fn test_non_get_and_cross_origin_pass_through() {
        let h = activated().await;
        let post = InterceptedRequest::new("POST", Url::parse(&format!("{ORIGIN}/api/review")).unwrap());
        assert_eq!(h.handle.fetch(post).await.unwrap().source, ResponseSource::PassThrough);

        let foreign = InterceptedRequest::get(Url::parse("https://cdn.example.com/lib.js").unwrap());
        assert_eq!(h.handle.fetch(foreign).await.unwrap().source, ResponseSource::PassThrough);
    }

    #[tokio::test]
    async fn test_activation_evicts_previous_version() {
        let db = HarborDb::open_in_memory().await.unwrap();
        let v1 = harness_with(db.clone(), 1, online_network()).await;
        v1.handle.install().await.unwrap();
        v1.handle.activate().await.unwrap();
        v1.network.respond("/app.js", ok("v1"));
        v1.handle.fetch(request("/app.js")).await.unwrap();

        let v2 = harness_with(db, 2, online_network()).await;
        v2.handle.install().await.unwrap();
        let report = v2.handle.activate().await.unwrap();
        assert!(report.evicted.contains(&"harbor-static-v1".to_string()));

        let status = v2.engine.store().status().await.unwrap();
        assert!(status.keys().all(|name| name.ends_with("-v2")));

        v2.network.go_offline();
        let response = v2.handle.fetch(request("/app.js")).await.unwrap();
        assert_ne!(response.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_activation_claims_clients() {
        let db = HarborDb::open_in_memory().await.unwrap();
        let h = harness_with(db, 1, online_network()).await;
        let client = h.clients.connect(&Url::parse(ORIGIN).unwrap(), true).await;

        h.handle.install().await.unwrap();
        let report = h.handle.activate().await.unwrap();
        assert_eq!(report.claimed, 1);
        assert!(h.clients.get(&client.id).await.unwrap().controlled);
    }

    #[tokio::test]
    async fn test_sync_drains_queue() {
        let h = activated().await;
        h.engine.queue().enqueue("review-sync", json!({"card": 1}), Some("r1".into())).await.unwrap();

        let report = h.handle.sync("review-sync").await.unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(h.engine.queue().get("r1").await.unwrap().unwrap().status, SyncStatus::Completed);

        let report = h.handle.sync("review-sync").await.unwrap();
        assert_eq!(report.attempted, 0);
        assert_eq!(h.replay.delivered_ids(), vec!["r1"]);
    }

    #[tokio::test]
    async fn test_periodic_sync_drains_and_notifies_clients() {
        let h = activated().await;
        let client = h.clients.connect(&Url::parse(ORIGIN).unwrap(), true).await;
        h.engine.queue().enqueue("progress-sync", json!({}), Some("p1".into())).await.unwrap();

        let reports = h.handle.periodic_sync("content-sync").await.unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(h.replay.delivered_ids(), vec!["p1"]);
        assert_eq!(
            h.clients.take_messages(&client.id).await.unwrap(),
            vec![ClientMessage::SyncRequested { tag: "content-sync".into() }]
        );
    }

    #[tokio::test]
    async fn test_push_and_click() {
        let h = activated().await;
        let payload: PushPayload =
            serde_json::from_value(json!({"title": "Reviews due", "tag": "reviews", "data": {"actionUrl": "/study"}}))
                .unwrap();
        let notification = h.handle.push(payload).await.unwrap();
        assert_eq!(notification.title, "Reviews due");

        let outcome = h.handle.notification_click("reviews", None).await.unwrap();
        assert!(matches!(outcome, ClickOutcome::Opened { ref url, .. } if url == "https://app.example.com/study"));
    }

    #[tokio::test]
    async fn test_message_get_cache_status() {
        let h = activated().await;
        let reply = h.handle.message(ControlMessage::GetCacheStatus).await.unwrap();
        let ControlReply::CacheStatus { data } = reply else { panic!("expected cache status") };
        assert_eq!(data["harbor-shell-v1"].count, 3);
    }

    struct StallingNetwork {
        dropped: Arc<AtomicBool>,
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Network for StallingNetwork {
        async fn fetch(&self, _request: &InterceptedRequest) -> Result<NetworkResponse, Error> {
            let _flag = DropFlag(Arc::clone(&self.dropped));
            std::future::pending::<()>().await;
            Err(Error::NetworkUnavailable("unreachable".into()))
        }
    }

    #[tokio::test]
    async fn test_abandoned_fetch_is_dropped() {
        let dropped = Arc::new(AtomicBool::new(false));
        let deps = EngineDeps {
            network: Arc::new(StallingNetwork { dropped: Arc::clone(&dropped) }),
            replay: Arc::new(FakeReplay::default()),
            notifier: Arc::new(NotificationCenter::default()),
            clients: Arc::new(ClientRegistry::default()),
        };
        let db = HarborDb::open_in_memory().await.unwrap();
        let engine = Arc::new(Engine::new(&config(1), db, deps).unwrap());
        let (handle, _join) = EventLoop::spawn(engine);

        let result = tokio::time::timeout(Duration::from_millis(50), handle.fetch(request("/app.js"))).await;
        assert!(result.is_err());

        for _ in 0..100 {
            if dropped.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_handle_reports_closed_loop() {
        let db = HarborDb::open_in_memory().await.unwrap();
        let h = harness_with(db, 1, online_network()).await;
        let (event_loop, handle) = EventLoop::new(Arc::clone(&h.engine));
        drop(event_loop);
        assert!(matches!(handle.install().await, Err(Error::ChannelClosed)));
    }
}
