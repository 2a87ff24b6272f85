//! Offline-first request interception and background sync engine.
//!
//! This crate provides:
//! - Request classification into static, API and document classes
//! - A cache store manager over versioned namespaces
//! - Cache-first, network-first and stale-while-revalidate strategies
//! - A durable, ordered sync queue with bounded retry backoff
//! - The control channel and notification dispatcher
//! - The engine object and the event loop that drives it

pub mod classify;
pub mod control;
pub mod notify;
pub mod store;
pub mod strategy;
pub mod sync;
pub mod worker;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use classify::{Classifier, RequestClass};
pub use control::{ControlChannel, ControlMessage, ControlReply};
pub use notify::{
    ClickOutcome, ClientInfo, ClientMessage, ClientRegistry, Clients, Notification, NotificationCenter,
    NotificationDispatcher, Notifier, PushPayload,
};
pub use store::CacheStore;
pub use strategy::{EngineResponse, OFFLINE_HEADER, ResponseSource, Strategies};
pub use sync::{BackoffPolicy, DrainReport, SyncQueue, TagStatus};
pub use worker::{ActivateReport, Engine, EngineDeps, EngineHandle, EventLoop, InstallReport, WorkerEvent, WorkerState};
