//! Notification dispatcher.
//!
//! Renders push payloads as notifications and routes clicks to foreground
//! clients. It never replays sync records itself; it only asks clients to
//! resume their own sync logic.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use harbor_core::{AppConfig, Error};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

/// Action id that closes the notification without opening anything.
pub const DISMISS_ACTION: &str = "dismiss";

const DEFAULT_TAG: &str = "default";

/// Messages kept per client between polls; the oldest is dropped past this.
pub const INBOX_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NotificationData {
    #[serde(default, rename = "actionUrl", skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// Push payload as delivered by the push service. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PushPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub badge: Option<String>,
    #[serde(default)]
    pub data: NotificationData,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
    #[serde(default)]
    pub tag: Option<String>,
}

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

/// A foreground client (an open window or tab of the application).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ClientInfo {
    pub id: String,
    pub url: String,
    pub focused: bool,
    /// Whether this engine controls the client.
    pub controlled: bool,
}

/// Message posted from the engine to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    SyncRequested { tag: String },
}

/// What a notification click did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClickOutcome {
    Dismissed,
    Focused { client_id: String, url: String },
    Opened { client_id: String, url: String },
}

/// Displays notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show a notification, replacing any shown notification with the same tag.
    async fn show(&self, notification: Notification) -> Result<(), Error>;

    /// Close the notification with the given tag, returning it if it was shown.
    async fn close(&self, tag: &str) -> Result<Option<Notification>, Error>;
}

/// The foreground clients of the application.
#[async_trait]
pub trait Clients: Send + Sync {
    async fn match_all(&self) -> Result<Vec<ClientInfo>, Error>;
    async fn focus(&self, id: &str) -> Result<ClientInfo, Error>;
    async fn navigate(&self, id: &str, url: &Url) -> Result<ClientInfo, Error>;
    async fn open_window(&self, url: &Url) -> Result<ClientInfo, Error>;
    async fn post_message(&self, id: &str, message: ClientMessage) -> Result<(), Error>;
    /// Take control of every client. Returns the number of clients claimed.
    async fn claim(&self) -> Result<usize, Error>;
}

pub struct NotificationDispatcher {
    origin: Url,
    title: String,
    icon: String,
    badge: String,
    notifier: Arc<dyn Notifier>,
    clients: Arc<dyn Clients>,
}

impl NotificationDispatcher {
    pub fn new(
        config: &AppConfig, notifier: Arc<dyn Notifier>, clients: Arc<dyn Clients>,
    ) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            origin,
            title: config.notification_title.clone(),
            icon: config.notification_icon.clone(),
            badge: config.notification_badge.clone(),
            notifier,
            clients,
        })
    }

    pub fn clients(&self) -> &dyn Clients {
        self.clients.as_ref()
    }

    /// Fill in defaults for anything the payload leaves out.
    pub fn render(&self, payload: PushPayload) -> Notification {
        Notification {
            title: payload.title.unwrap_or_else(|| self.title.clone()),
            body: payload.body.unwrap_or_default(),
            icon: payload.icon.unwrap_or_else(|| self.icon.clone()),
            badge: payload.badge.unwrap_or_else(|| self.badge.clone()),
            tag: payload.tag.unwrap_or_else(|| DEFAULT_TAG.to_string()),
            data: payload.data,
            actions: payload.actions,
        }
    }

    pub async fn push(&self, payload: PushPayload) -> Result<Notification, Error> {
        let notification = self.render(payload);
        self.notifier.show(notification.clone()).await?;
        tracing::info!(tag = %notification.tag, "showed notification");
        Ok(notification)
    }

    /// Handle a click on the notification with `tag`, optionally on one of its actions.
    pub async fn click(&self, tag: &str, action: Option<&str>) -> Result<ClickOutcome, Error> {
        let notification = self
            .notifier
            .close(tag)
            .await?
            .ok_or_else(|| Error::InvalidInput(format!("no notification shown with tag {tag}")))?;

        if action == Some(DISMISS_ACTION) {
            return Ok(ClickOutcome::Dismissed);
        }

        let target = notification.data.action_url.as_deref().unwrap_or("/");
        let target = self
            .origin
            .join(target)
            .map_err(|e| Error::InvalidUrl(format!("{target}: {e}")))?;

        let mut candidates: Vec<ClientInfo> = self
            .clients
            .match_all()
            .await?
            .into_iter()
            .filter(|client| Url::parse(&client.url).is_ok_and(|url| url.origin() == self.origin.origin()))
            .collect();
        candidates.sort_by_key(|client| !client.focused);

        match candidates.first() {
            Some(client) => {
                self.clients.focus(&client.id).await?;
                let client = self.clients.navigate(&client.id, &target).await?;
                tracing::debug!(client_id = %client.id, url = %target, "focused client for notification");
                Ok(ClickOutcome::Focused { client_id: client.id, url: client.url })
            }
            None => {
                let client = self.clients.open_window(&target).await?;
                tracing::debug!(client_id = %client.id, url = %target, "opened client for notification");
                Ok(ClickOutcome::Opened { client_id: client.id, url: client.url })
            }
        }
    }

    /// Ask every client to resume its own sync logic for `tag`.
    ///
    /// Returns the number of clients notified.
    pub async fn request_client_sync(&self, tag: &str) -> Result<usize, Error> {
        let clients = self.clients.match_all().await?;
        for client in &clients {
            self.clients
                .post_message(&client.id, ClientMessage::SyncRequested { tag: tag.to_string() })
                .await?;
        }
        tracing::debug!(tag, clients = clients.len(), "requested client sync");
        Ok(clients.len())
    }
}

/// In-process notification tray.
#[derive(Default)]
pub struct NotificationCenter {
    shown: Mutex<Vec<Notification>>,
}

impl NotificationCenter {
    pub async fn shown(&self) -> Vec<Notification> {
        self.shown.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for NotificationCenter {
    async fn show(&self, notification: Notification) -> Result<(), Error> {
        let mut shown = self.shown.lock().await;
        shown.retain(|n| n.tag != notification.tag);
        shown.push(notification);
        Ok(())
    }

    async fn close(&self, tag: &str) -> Result<Option<Notification>, Error> {
        let mut shown = self.shown.lock().await;
        let index = shown.iter().position(|n| n.tag == tag);
        Ok(index.map(|i| shown.remove(i)))
    }
}

struct RegisteredClient {
    info: ClientInfo,
    inbox: VecDeque<ClientMessage>,
}

/// In-process registry of foreground clients with per-client message inboxes.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<Vec<RegisteredClient>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    /// Register a client at `url`. New clients are not controlled until claimed.
    pub async fn connect(&self, url: &Url, focused: bool) -> ClientInfo {
        let id = format!("client-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let info = ClientInfo { id, url: url.to_string(), focused, controlled: false };

        let mut clients = self.clients.lock().await;
        if focused {
            for client in clients.iter_mut() {
                client.info.focused = false;
            }
        }
        clients.push(RegisteredClient { info: info.clone(), inbox: VecDeque::new() });
        info
    }

    pub async fn disconnect(&self, id: &str) -> bool {
        let mut clients = self.clients.lock().await;
        let before = clients.len();
        clients.retain(|c| c.info.id != id);
        clients.len() != before
    }

    /// Drain the messages posted to a client.
    pub async fn take_messages(&self, id: &str) -> Result<Vec<ClientMessage>, Error> {
        let mut clients = self.clients.lock().await;
        let client = find(&mut clients, id)?;
        Ok(client.inbox.drain(..).collect())
    }

    pub async fn get(&self, id: &str) -> Option<ClientInfo> {
        self.clients.lock().await.iter().find(|c| c.info.id == id).map(|c| c.info.clone())
    }
}

fn find<'a>(clients: &'a mut [RegisteredClient], id: &str) -> Result<&'a mut RegisteredClient, Error> {
    clients
        .iter_mut()
        .find(|c| c.info.id == id)
        .ok_or_else(|| Error::InvalidInput(format!("unknown client: {id}")))
}

#[async_trait]
impl Clients for ClientRegistry {
    async fn match_all(&self) -> Result<Vec<ClientInfo>, Error> {
        Ok(self.clients.lock().await.iter().map(|c| c.info.clone()).collect())
    }

    async fn focus(&self, id: &str) -> Result<ClientInfo, Error> {
        let mut clients = self.clients.lock().await;
        find(&mut clients, id)?;
        for client in clients.iter_mut() {
            client.info.focused = client.info.id == id;
        }
        Ok(find(&mut clients, id)?.info.clone())
    }

    async fn navigate(&self, id: &str, url: &Url) -> Result<ClientInfo, Error> {
        let mut clients = self.clients.lock().await;
        let client = find(&mut clients, id)?;
        client.info.url = url.to_string();
        Ok(client.info.clone())
    }

    async fn open_window(&self, url: &Url) -> Result<ClientInfo, Error> {
        let mut info = self.connect(url, true).await;
        let mut clients = self.clients.lock().await;
        let client = find(&mut clients, &info.id)?;
        client.info.controlled = true;
        info.controlled = true;
        Ok(info)
    }

    async fn post_message(&self, id: &str, message: ClientMessage) -> Result<(), Error> {
        let mut clients = self.clients.lock().await;
        let inbox = &mut find(&mut clients, id)?.inbox;
        if inbox.len() >= INBOX_CAPACITY {
            inbox.pop_front();
            tracing::debug!(client = id, "client inbox full, dropped oldest message");
        }
        inbox.push_back(message);
        Ok(())
    }

    async fn claim(&self) -> Result<usize, Error> {
        let mut clients = self.clients.lock().await;
        for client in clients.iter_mut() {
            client.info.controlled = true;
        }
        Ok(clients.len())
    }
}
