//! Durable storage for queued offline mutations.
//!
//! Shares the [`HarborDb`](crate::cache::HarborDb) connection with the cache,
//! so records survive restarts alongside cached entries.

pub mod records;

pub use records::{SyncCounts, SyncRecord, SyncStatus};

/// Generate a time-ordered record id.
pub fn new_record_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
