//! Cache control MCP tools.
//!
//! Each tool sends one control message to the engine and returns its reply.

pub mod clear;
pub mod content;
pub mod status;

pub use clear::{ClearCacheParams, clear_impl};
pub use content::{CacheContentParams, content_impl};
pub use status::{CacheStatusParams, status_impl};
