//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! for performance and concurrency (WAL mode), and running migrations.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Storage handle shared by the cache namespaces and the sync queue.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread, so every call is a suspension point for the caller.
#[derive(Clone, Debug)]
pub struct HarborDb {
    pub(crate) conn: Connection,
}

impl HarborDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file (and its parent directory) if it doesn't exist, applies
    /// performance pragmas, and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::InvalidInput(format!("failed to create {}: {e}", parent.display())))?;
        }

        let conn = Connection::open(path).await.map_err(|e| Error::Storage(e.into()))?;
        Self::prepare(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Storage(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Storage)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }

    /// Schema version recorded by the migration runner.
    pub async fn schema_version(&self) -> Result<i64, Error> {
        migrations::schema_version(&self.conn).await
    }
}
