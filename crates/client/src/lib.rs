//! Client code for harbor.
//!
//! This crate provides the HTTP implementations of the engine's network seams:
//! the fetch pipeline used for intercepted requests and the replay client used
//! to drain the sync queue.

pub mod fetch;
pub mod replay;

pub use fetch::{FetchClient, FetchConfig, UrlError, canonicalize};
pub use replay::{ReplayClient, ReplayConfig};
