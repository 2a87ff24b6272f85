//! Unified error types for harbor.
//!
//! The first four variants are the engine's recovery taxonomy: network and cache misses are
//! recovered by the strategies, storage failures on cache writes are logged and swallowed,
//! replay rejections keep a sync record pending.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the harbor engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Fetch rejected before a response arrived (offline, DNS, TLS, reset).
    #[error("NETWORK_UNAVAILABLE: {0}")]
    NetworkUnavailable(String),

    /// No stored entry for the given request key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// The underlying persistent store rejected a read or write.
    #[error("STORAGE_FAILURE: {0}")]
    Storage(tokio_rusqlite::Error),

    /// The replay endpoint answered a queued mutation with a non-success status.
    #[error("REPLAY_REJECTED: status {status} for record {record_id}")]
    ReplayRejected { record_id: String, status: u16 },

    /// Migration failed to apply.
    #[error("STORAGE_FAILURE: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be decoded.
    #[error("STORAGE_FAILURE: corrupt row: {0}")]
    CorruptRow(String),

    /// Invalid input parameters (e.g., unknown sync tag).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Response body larger than a cache entry may be.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// A lifecycle phase was requested out of order.
    #[error("LIFECYCLE: {0}")]
    Lifecycle(String),

    /// The engine event loop is gone.
    #[error("CHANNEL_CLOSED")]
    ChannelClosed,
}

impl Error {
    /// Whether this error came from the persistent store.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::MigrationFailed(_) | Error::CorruptRow(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Storage(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Storage(tokio_rusqlite::Error::Close(c)),
            _ => Error::Storage(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Storage(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptRow(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::NetworkUnavailable(msg) => (-32000, msg.clone()),
            Error::CacheMiss(msg) => (-32001, msg.clone()),
            Error::Storage(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::CorruptRow(msg) => (-32002, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::ReplayRejected { .. } => (-32004, err.to_string()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::Lifecycle(msg) => (-32010, msg.clone()),
            Error::ChannelClosed => (-32011, "engine event loop is not running".to_string()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
