//! Durable sync queue.
//!
//! Offline mutations are appended as pending records and replayed later, one
//! at a time and in insertion order, against the endpoint configured for
//! their tag. A record leaves `pending` only when the endpoint acknowledges
//! it, or when its tag has no endpoint at all.
//!
//! A tag's queue is head-of-line blocked: a drain stops at the first record
//! that fails or is still backing off, and every later record waits for it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use harbor_core::sync::{SyncCounts, new_record_id};
use harbor_core::{AppConfig, Error, HarborDb, ReplayTarget, SyncRecord};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

/// Exponential retry delay: `base * 2^(attempts - 1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Every drain retries every pending record.
    pub fn disabled() -> Self {
        Self { base: Duration::ZERO, max: Duration::ZERO }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(Duration::from_secs(config.backoff_base_secs), Duration::from_secs(config.backoff_max_secs))
    }

    /// Delay before the next attempt after `attempts` failures.
    pub fn delay(&self, attempts: u32) -> Duration {
        if attempts == 0 || self.base.is_zero() {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempts - 1);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// RFC 3339 timestamp before which the record must not be retried, if any.
    pub fn next_attempt_at(&self, attempts: u32, now: DateTime<Utc>) -> Option<String> {
        let delay = self.delay(attempts);
        if delay.is_zero() {
            return None;
        }
        let delay = chrono::Duration::from_std(delay).ok()?;
        Some((now + delay).to_rfc3339())
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(3600))
    }
}

/// Outcome of draining one tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DrainReport {
    pub tag: String,
    /// Records replayed during this drain.
    pub attempted: usize,
    pub completed: usize,
    /// Replays that failed; the records stay pending.
    pub failed: usize,
    /// Records not attempted because an earlier record failed or is still backing off.
    pub deferred: usize,
    /// Pending records left for the tag after the drain.
    pub remaining: u64,
}

/// Queue status for one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TagStatus {
    pub tag: String,
    pub endpoint: Option<String>,
    #[serde(flatten)]
    pub counts: SyncCounts,
}

pub struct SyncQueue {
    db: HarborDb,
    replay: Arc<dyn ReplayTarget>,
    targets: BTreeMap<String, Url>,
    backoff: BackoffPolicy,
    drain_lock: Mutex<()>,
}

impl SyncQueue {
    pub fn new(
        db: HarborDb, replay: Arc<dyn ReplayTarget>, targets: BTreeMap<String, Url>, backoff: BackoffPolicy,
    ) -> Self {
        Self { db, replay, targets, backoff, drain_lock: Mutex::new(()) }
    }

    /// Build a queue whose tag endpoints are resolved against the configured origin.
    pub fn from_config(db: HarborDb, replay: Arc<dyn ReplayTarget>, config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let mut targets = BTreeMap::new();
        for (tag, endpoint) in &config.sync_targets {
            let url = origin
                .join(endpoint)
                .map_err(|e| Error::InvalidUrl(format!("{tag}: {endpoint}: {e}")))?;
            targets.insert(tag.clone(), url);
        }
        Ok(Self::new(db, replay, targets, BackoffPolicy::from_config(config)))
    }

    /// Configured tags in name order.
    pub fn tags(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }

    /// Append a pending record.
    ///
    /// Supplying the id of an existing record returns that record unchanged.
    pub async fn enqueue(
        &self, tag: &str, payload: serde_json::Value, id: Option<String>,
    ) -> Result<SyncRecord, Error> {
        if !self.targets.contains_key(tag) {
            return Err(Error::InvalidInput(format!("unknown sync tag: {tag}")));
        }
        let id = match id {
            Some(id) if id.trim().is_empty() => return Err(Error::InvalidInput("record id must not be empty".into())),
            Some(id) => id,
            None => new_record_id(),
        };

        let record = self.db.insert_sync_record(&id, tag, &payload).await?;
        if record.tag != tag {
            return Err(Error::InvalidInput(format!("record {id} already queued under tag {}", record.tag)));
        }
        tracing::debug!(id = %record.id, tag, "enqueued sync record");
        Ok(record)
    }

    /// Replay pending records for a tag in insertion order, stopping at the
    /// first record that fails or is backing off.
    ///
    /// Drains are serialized, so a record completed by one drain is never
    /// replayed by the next.
    pub async fn drain(&self, tag: &str) -> Result<DrainReport, Error> {
        let _guard = self.drain_lock.lock().await;
        self.drain_locked(tag).await
    }

    /// Drain every configured tag in name order.
    pub async fn drain_all(&self) -> Result<Vec<DrainReport>, Error> {
        let mut reports = Vec::with_capacity(self.targets.len());
        for tag in self.targets.keys() {
            reports.push(self.drain(tag).await?);
        }
        Ok(reports)
    }

    async fn drain_locked(&self, tag: &str) -> Result<DrainReport, Error> {
        let pending = self.db.pending_sync_records(tag).await?;
        let mut report = DrainReport { tag: tag.to_string(), ..Default::default() };

        let Some(endpoint) = self.targets.get(tag) else {
            for record in &pending {
                if self.db.fail_sync_record(&record.id, "no drain target configured for tag").await? {
                    report.failed += 1;
                }
            }
            if report.failed > 0 {
                tracing::warn!(tag, failed = report.failed, "sync records without a drain target marked failed");
            }
            return Ok(report);
        };

        let now = Utc::now();
        for (index, record) in pending.iter().enumerate() {
            if record.is_backing_off(now) {
                report.deferred = pending.len() - index;
                tracing::debug!(tag, id = %record.id, deferred = report.deferred, "drain stopped at record in backoff");
                break;
            }

            report.attempted += 1;
            match self.replay.replay(endpoint, &record.id, tag, &record.payload).await {
                Ok(()) => {
                    if self.db.complete_sync_record(&record.id).await? {
                        report.completed += 1;
                    }
                }
                Err(e) => {
                    let next_attempt_at = self.backoff.next_attempt_at(record.attempts + 1, now);
                    self.db
                        .record_sync_failure(&record.id, &e.to_string(), next_attempt_at)
                        .await?;
                    report.failed += 1;
                    report.deferred = pending.len() - index - 1;
                    tracing::warn!(tag, id = %record.id, attempts = record.attempts + 1, error = %e, "replay failed");
                    break;
                }
            }
        }

        report.remaining = self.db.sync_counts(Some(tag)).await?.pending;
        tracing::info!(
            tag,
            attempted = report.attempted,
            completed = report.completed,
            failed = report.failed,
            remaining = report.remaining,
            "drained sync queue"
        );
        Ok(report)
    }

    /// Number of pending records for a tag.
    pub async fn len(&self, tag: &str) -> Result<u64, Error> {
        Ok(self.db.sync_counts(Some(tag)).await?.pending)
    }

    pub async fn get(&self, id: &str) -> Result<Option<SyncRecord>, Error> {
        self.db.get_sync_record(id).await
    }

    /// Status of one tag, or of every configured tag.
    pub async fn status(&self, tag: Option<&str>) -> Result<Vec<TagStatus>, Error> {
        let tags = match tag {
            Some(tag) => vec![tag.to_string()],
            None => self.tags(),
        };

        let mut statuses = Vec::with_capacity(tags.len());
        for tag in tags {
            let counts = self.db.sync_counts(Some(&tag)).await?;
            let endpoint = self.targets.get(&tag).map(|url| url.to_string());
            statuses.push(TagStatus { tag, endpoint, counts });
        }
        Ok(statuses)
    }

    /// Return a record to `pending` with no attempts and no backoff.
    pub async fn reset(&self, id: &str) -> Result<SyncRecord, Error> {
        let _guard = self.drain_lock.lock().await;
        self.db
            .reset_sync_record(id)
            .await?
            .ok_or_else(|| Error::InvalidInput(format!("unknown sync record: {id}")))
    }

    /// Delete completed records older than `older_than`.
    pub async fn purge_completed(&self, older_than: Duration) -> Result<u64, Error> {
        let age = chrono::Duration::from_std(older_than).map_err(|e| Error::InvalidInput(e.to_string()))?;
        let before = (Utc::now() - age).to_rfc3339();
        let purged = self.db.purge_completed_sync_records(&before).await?;
        if purged > 0 {
            tracing::info!(purged, "purged completed sync records");
        }
        Ok(purged)
    }
}
