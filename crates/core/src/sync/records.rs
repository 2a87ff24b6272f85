//! Sync record persistence.
//!
//! Records are appended with a monotonically increasing `seq` and always read
//! back in that order. Only the queue's drain routine changes their status.

use std::fmt;
use std::str::FromStr;

use crate::Error;
use crate::cache::HarborDb;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Lifecycle status of a queued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Completed,
    /// Can never be replayed as configured; only an explicit reset revives it.
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncStatus::Pending),
            "completed" => Ok(SyncStatus::Completed),
            "failed" => Ok(SyncStatus::Failed),
            other => Err(Error::CorruptRow(format!("unknown sync status: {other}"))),
        }
    }
}

/// A mutation made while offline, waiting to be replayed against the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SyncRecord {
    pub id: String,
    /// Background-sync tag selecting the drain target.
    pub tag: String,
    pub payload: serde_json::Value,
    pub status: SyncStatus,
    pub created_at: String,
    pub attempts: u32,
    /// Earliest time the next replay may be attempted (RFC 3339).
    pub next_attempt_at: Option<String>,
    pub last_error: Option<String>,
    pub completed_at: Option<String>,
}

impl SyncRecord {
    /// Whether the record is still inside its backoff window at `now`.
    pub fn is_backing_off(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.next_attempt_at
            .as_deref()
            .and_then(|at| chrono::DateTime::parse_from_rfc3339(at).ok())
            .is_some_and(|at| at.with_timezone(&chrono::Utc) > now)
    }
}

/// Pending/completed/failed counts for one tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SyncCounts {
    pub pending: u64,
    pub completed: u64,
    pub failed: u64,
}

const RECORD_COLUMNS: &str =
    "id, tag, payload_json, status, created_at, attempts, next_attempt_at, last_error, completed_at";

fn read_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        id: row.get(0)?,
        tag: row.get(1)?,
        payload_json: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        attempts: row.get(5)?,
        next_attempt_at: row.get(6)?,
        last_error: row.get(7)?,
        completed_at: row.get(8)?,
    })
}

struct RawRecord {
    id: String,
    tag: String,
    payload_json: String,
    status: String,
    created_at: String,
    attempts: u32,
    next_attempt_at: Option<String>,
    last_error: Option<String>,
    completed_at: Option<String>,
}

impl TryFrom<RawRecord> for SyncRecord {
    type Error = Error;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        Ok(SyncRecord {
            payload: serde_json::from_str(&raw.payload_json)?,
            status: raw.status.parse()?,
            id: raw.id,
            tag: raw.tag,
            created_at: raw.created_at,
            attempts: raw.attempts,
            next_attempt_at: raw.next_attempt_at,
            last_error: raw.last_error,
            completed_at: raw.completed_at,
        })
    }
}

fn select_record(conn: &rusqlite::Connection, id: &str) -> Result<Option<SyncRecord>, Error> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM sync_records WHERE id = ?1");
    match conn.query_row(&sql, params![id], read_record) {
        Ok(raw) => Ok(Some(raw.try_into()?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl HarborDb {
    /// Append a pending record.
    ///
    /// If a record with the same id already exists it is returned unchanged,
    /// which makes a retried enqueue harmless.
    pub async fn insert_sync_record(
        &self, id: &str, tag: &str, payload: &serde_json::Value,
    ) -> Result<SyncRecord, Error> {
        let id = id.to_string();
        let tag = tag.to_string();
        let payload_json = serde_json::to_string(payload)?;
        let created_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<SyncRecord, Error> {
                conn.execute(
                    "INSERT INTO sync_records (id, tag, payload_json, status, created_at, attempts)
                    VALUES (?1, ?2, ?3, 'pending', ?4, 0)
                    ON CONFLICT(id) DO NOTHING",
                    params![id, tag, payload_json, created_at],
                )?;
                select_record(conn, &id)?.ok_or_else(|| Error::CorruptRow(format!("sync record {id} vanished")))
            })
            .await
            .map_err(Error::from)
    }

    /// Get a record by id.
    pub async fn get_sync_record(&self, id: &str) -> Result<Option<SyncRecord>, Error> {
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<SyncRecord>, Error> { select_record(conn, &id) })
            .await
            .map_err(Error::from)
    }

    /// Pending records for a tag in insertion order.
    pub async fn pending_sync_records(&self, tag: &str) -> Result<Vec<SyncRecord>, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<SyncRecord>, Error> {
                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM sync_records WHERE tag = ?1 AND status = 'pending' ORDER BY seq ASC"
                );
                let mut stmt = conn.prepare(&sql)?;
                let raws = stmt
                    .query_map(params![tag], read_record)?
                    .collect::<Result<Vec<RawRecord>, _>>()?;
                raws.into_iter().map(SyncRecord::try_from).collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Mark a pending record completed.
    ///
    /// Returns false if the record was not pending (already completed by an
    /// earlier drain, or reset to failed), so it is never counted twice.
    pub async fn complete_sync_record(&self, id: &str) -> Result<bool, Error> {
        let id = id.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let updated = conn.execute(
                    "UPDATE sync_records
                    SET status = 'completed', completed_at = ?2, next_attempt_at = NULL, last_error = NULL
                    WHERE id = ?1 AND status = 'pending'",
                    params![id, now],
                )?;
                Ok(updated > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Record a failed replay: bump attempts, keep the record pending.
    ///
    /// Returns the new attempt count, or None if the record was not pending.
    pub async fn record_sync_failure(
        &self, id: &str, error: &str, next_attempt_at: Option<String>,
    ) -> Result<Option<u32>, Error> {
        let id = id.to_string();
        let error = error.to_string();
        self.conn
            .call(move |conn| -> Result<Option<u32>, Error> {
                let updated = conn.execute(
                    "UPDATE sync_records
                    SET attempts = attempts + 1, last_error = ?2, next_attempt_at = ?3
                    WHERE id = ?1 AND status = 'pending'",
                    params![id, error, next_attempt_at],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let attempts: u32 =
                    conn.query_row("SELECT attempts FROM sync_records WHERE id = ?1", params![id], |row| row.get(0))?;
                Ok(Some(attempts))
            })
            .await
            .map_err(Error::from)
    }

    /// Move a pending record to `failed` with a reason.
    pub async fn fail_sync_record(&self, id: &str, reason: &str) -> Result<bool, Error> {
        let id = id.to_string();
        let reason = reason.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let updated = conn.execute(
                    "UPDATE sync_records SET status = 'failed', last_error = ?2, next_attempt_at = NULL
                    WHERE id = ?1 AND status = 'pending'",
                    params![id, reason],
                )?;
                Ok(updated > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Return a record to `pending` with a clean retry history.
    pub async fn reset_sync_record(&self, id: &str) -> Result<Option<SyncRecord>, Error> {
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<SyncRecord>, Error> {
                conn.execute(
                    "UPDATE sync_records
                    SET status = 'pending', attempts = 0, next_attempt_at = NULL, last_error = NULL, completed_at = NULL
                    WHERE id = ?1",
                    params![id],
                )?;
                select_record(conn, &id)
            })
            .await
            .map_err(Error::from)
    }

    /// Status counts for one tag, or across all tags when `tag` is None.
    pub async fn sync_counts(&self, tag: Option<&str>) -> Result<SyncCounts, Error> {
        let tag = tag.map(str::to_string);
        self.conn
            .call(move |conn| -> Result<SyncCounts, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, COUNT(*) FROM sync_records WHERE ?1 IS NULL OR tag = ?1 GROUP BY status",
                )?;
                let rows = stmt
                    .query_map(params![tag], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                    .collect::<Result<Vec<(String, i64)>, _>>()?;

                let mut counts = SyncCounts::default();
                for (status, count) in rows {
                    let count = count as u64;
                    match status.parse::<SyncStatus>()? {
                        SyncStatus::Pending => counts.pending = count,
                        SyncStatus::Completed => counts.completed = count,
                        SyncStatus::Failed => counts.failed = count,
                    }
                }
                Ok(counts)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete completed records older than `before` (RFC 3339).
    ///
    /// Returns the number of deleted records.
    pub async fn purge_completed_sync_records(&self, before: &str) -> Result<u64, Error> {
        let before = before.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM sync_records WHERE status = 'completed' AND completed_at < ?1",
                    params![before],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = HarborDb::open_in_memory().await.unwrap();
        let record = db.insert_sync_record("r1", "review-sync", &json!({"card": 7})).await.unwrap();

        assert_eq!(record.id, "r1");
        assert_eq!(record.status, SyncStatus::Pending);
        assert_eq!(record.attempts, 0);
        assert_eq!(record.payload, json!({"card": 7}));

        let fetched = db.get_sync_record("r1").await.unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_is_idempotent() {
        let db = HarborDb::open_in_memory().await.unwrap();
        db.insert_sync_record("r1", "review-sync", &json!(1)).await.unwrap();
        let again = db.insert_sync_record("r1", "review-sync", &json!(2)).await.unwrap();

        assert_eq!(again.payload, json!(1));
        assert_eq!(db.pending_sync_records("review-sync").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_in_insertion_order() {
        let db = HarborDb::open_in_memory().await.unwrap();
        db.insert_sync_record("b", "review-sync", &json!(1)).await.unwrap();
        db.insert_sync_record("a", "review-sync", &json!(2)).await.unwrap();
        db.insert_sync_record("c", "progress-sync", &json!(3)).await.unwrap();

        let ids: Vec<String> = db
            .pending_sync_records("review-sync")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_complete_only_once() {
        let db = HarborDb::open_in_memory().await.unwrap();
        db.insert_sync_record("r1", "review-sync", &json!({})).await.unwrap();

        assert!(db.complete_sync_record("r1").await.unwrap());
        assert!(!db.complete_sync_record("r1").await.unwrap());

        let record = db.get_sync_record("r1").await.unwrap().unwrap();
        assert_eq!(record.status, SyncStatus::Completed);
        assert!(record.completed_at.is_some());
        assert!(db.pending_sync_records("review-sync").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_failure_keeps_pending() {
        let db = HarborDb::open_in_memory().await.unwrap();
        db.insert_sync_record("r2", "review-sync", &json!({})).await.unwrap();

        let attempts = db.record_sync_failure("r2", "status 500", None).await.unwrap();
        assert_eq!(attempts, Some(1));

        let record = db.get_sync_record("r2").await.unwrap().unwrap();
        assert_eq!(record.status, SyncStatus::Pending);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.last_error.as_deref(), Some("status 500"));
    }

    #[tokio::test]
    async fn test_fail_and_reset() {
        let db = HarborDb::open_in_memory().await.unwrap();
        db.insert_sync_record("r3", "unknown-sync", &json!({})).await.unwrap();
        db.record_sync_failure("r3", "boom", None).await.unwrap();

        assert!(db.fail_sync_record("r3", "no drain target").await.unwrap());
        assert_eq!(db.get_sync_record("r3").await.unwrap().unwrap().status, SyncStatus::Failed);

        let reset = db.reset_sync_record("r3").await.unwrap().unwrap();
        assert_eq!(reset.status, SyncStatus::Pending);
        assert_eq!(reset.attempts, 0);
        assert!(reset.last_error.is_none());

        assert!(db.reset_sync_record("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_counts_and_purge() {
        let db = HarborDb::open_in_memory().await.unwrap();
        db.insert_sync_record("a", "review-sync", &json!({})).await.unwrap();
        db.insert_sync_record("b", "review-sync", &json!({})).await.unwrap();
        db.insert_sync_record("c", "progress-sync", &json!({})).await.unwrap();
        db.complete_sync_record("a").await.unwrap();

        let review = db.sync_counts(Some("review-sync")).await.unwrap();
        assert_eq!(review, SyncCounts { pending: 1, completed: 1, failed: 0 });
        let all = db.sync_counts(None).await.unwrap();
        assert_eq!(all.pending, 2);

        let future = (chrono::Utc::now() + chrono::Duration::seconds(60)).to_rfc3339();
        assert_eq!(db.purge_completed_sync_records(&future).await.unwrap(), 1);
        assert!(db.get_sync_record("a").await.unwrap().is_none());
    }

    #[test]
    fn test_backing_off() {
        let now = chrono::Utc::now();
        let mut record = SyncRecord {
            id: "r".into(),
            tag: "review-sync".into(),
            payload: json!({}),
            status: SyncStatus::Pending,
            created_at: now.to_rfc3339(),
            attempts: 1,
            next_attempt_at: None,
            last_error: None,
            completed_at: None,
        };
        assert!(!record.is_backing_off(now));

        record.next_attempt_at = Some((now + chrono::Duration::seconds(30)).to_rfc3339());
        assert!(record.is_backing_off(now));

        record.next_attempt_at = Some((now - chrono::Duration::seconds(1)).to_rfc3339());
        assert!(!record.is_backing_off(now));
    }
}
