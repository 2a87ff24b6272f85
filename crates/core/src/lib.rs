//! Core types and shared functionality for harbor.
//!
//! This crate provides:
//! - Cache namespace and sync record storage with a SQLite backend
//! - Unified error types
//! - Configuration structures
//! - The network seams the engine is written against

pub mod cache;
pub mod config;
pub mod error;
pub mod net;
pub mod sync;

pub use cache::{HarborDb, NamespaceCategory, StoredResponse};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use net::{InterceptedRequest, Network, NetworkResponse, ReplayTarget};
pub use sync::{SyncRecord, SyncStatus};
