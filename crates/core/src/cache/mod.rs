//! SQLite-backed storage for versioned cache namespaces.
//!
//! This module provides the persistent half of the cache store manager,
//! using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Namespaces named `{prefix}-{category}-v{version}`
//! - Entries keyed by a SHA-256 request key, owned by one namespace
//! - Atomic eviction of every namespace outside the current set
//! - Automatic schema migrations and WAL mode

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod namespaces;

pub use crate::Error;

pub use connection::HarborDb;
pub use entries::{CachedEntry, NamespaceContents, StoredResponse};
pub use hash::request_key;
pub use namespaces::{CacheNamespace, NamespaceCategory};
