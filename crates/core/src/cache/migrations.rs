//! Schema migrations for the harbor store.
//!
//! Applied versions are recorded in `_migrations`. Each pending migration runs
//! in its own transaction together with its version row, so a failed batch
//! leaves the schema at the last good version.

use super::Error;
use tokio_rusqlite::{Connection, params, rusqlite};

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ordered by version; every batch uses CREATE ... IF NOT EXISTS.
const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "cache", sql: include_str!("../../migrations/001_cache.sql") },
    Migration { version: 2, name: "sync_queue", sql: include_str!("../../migrations/002_sync_queue.sql") },
];

/// Latest schema version this build knows about.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Apply every migration newer than the recorded schema version.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current = current_version(conn)?;
        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(migration.sql)
                .map_err(|e| Error::MigrationFailed(format!("{} ({}): {e}", migration.version, migration.name)))?;
            tx.execute(
                "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version = migration.version, name = migration.name, "applied migration");
        }
        Ok(())
    })
    .await
    .map_err(Error::from)
}

/// Recorded schema version, 0 for a fresh database.
pub async fn schema_version(conn: &Connection) -> Result<i64, Error> {
    conn.call(|conn| -> Result<i64, Error> { Ok(current_version(conn)?) })
        .await
        .map_err(Error::from)
}

fn current_version(conn: &rusqlite::Connection) -> Result<i64, rusqlite::Error> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_twice() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let tables: Vec<String> = conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('namespaces', 'entries', 'sync_records') ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<Result<Vec<String>, _>>()
            })
            .await
            .unwrap();

        assert_eq!(tables, vec!["entries", "namespaces", "sync_records"]);
        assert_eq!(schema_version(&conn).await.unwrap(), latest_version());
    }

    #[tokio::test]
    async fn test_resumes_from_recorded_version() {
        let conn = Connection::open_in_memory().await.unwrap();
        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE _migrations (version INTEGER PRIMARY KEY, name TEXT NOT NULL, applied_at TEXT NOT NULL);",
            )?;
            conn.execute_batch(include_str!("../../migrations/001_cache.sql"))?;
            conn.execute("INSERT INTO _migrations VALUES (1, 'cache', 'then')", [])
        })
        .await
        .unwrap();

        run(&conn).await.unwrap();

        let names: Vec<String> = conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT name FROM _migrations ORDER BY version")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<Result<Vec<String>, _>>()
            })
            .await
            .unwrap();
        assert_eq!(names, vec!["cache", "sync_queue"]);
    }
}
