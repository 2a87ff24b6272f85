//! Background sync MCP tools.
//!
//! Enqueueing, status and maintenance go straight to the durable queue.
//! Triggering a drain goes through the event loop like any other event.

pub mod enqueue;
pub mod purge;
pub mod reset;
pub mod status;
pub mod trigger;

pub use enqueue::{SyncEnqueueParams, enqueue_impl};
pub use purge::{SyncPurgeParams, purge_impl};
pub use reset::{SyncResetParams, reset_impl};
pub use status::{SyncStatusParams, status_impl};
pub use trigger::{SyncTriggerParams, trigger_impl};
