//! Versioned cache namespace operations.
//!
//! A namespace is a named partition of cached entries. Its name encodes the
//! category and version (`{prefix}-{category}-v{version}`), so a version bump
//! produces a new namespace and the old one becomes stale.

use std::fmt;
use std::str::FromStr;

use super::connection::HarborDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// The three kinds of namespace the engine keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceCategory {
    /// Content-hashed scripts, stylesheets, fonts, images.
    Static,
    /// API responses.
    Api,
    /// App shell and navigable documents.
    Shell,
}

impl NamespaceCategory {
    pub const ALL: [NamespaceCategory; 3] = [NamespaceCategory::Static, NamespaceCategory::Api, NamespaceCategory::Shell];

    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceCategory::Static => "static",
            NamespaceCategory::Api => "api",
            NamespaceCategory::Shell => "shell",
        }
    }

    /// Name of this category's namespace at `version`.
    pub fn namespace_name(&self, prefix: &str, version: u32) -> String {
        format!("{prefix}-{}-v{version}", self.as_str())
    }
}

impl fmt::Display for NamespaceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamespaceCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(NamespaceCategory::Static),
            "api" => Ok(NamespaceCategory::Api),
            "shell" => Ok(NamespaceCategory::Shell),
            other => Err(Error::CorruptRow(format!("unknown namespace category: {other}"))),
        }
    }
}

/// A registered cache namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheNamespace {
    pub name: String,
    pub category: NamespaceCategory,
    pub version: u32,
    pub created_at: String,
}

impl HarborDb {
    /// Register a namespace if it doesn't exist yet.
    ///
    /// Returns true if the namespace was created by this call.
    pub async fn ensure_namespace(&self, name: &str, category: NamespaceCategory, version: u32) -> Result<bool, Error> {
        let name = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let inserted = conn.execute(
                    "INSERT INTO namespaces (name, category, version, created_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(name) DO NOTHING",
                    params![name, category.as_str(), version, created_at],
                )?;
                Ok(inserted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Get a namespace by name.
    pub async fn get_namespace(&self, name: &str) -> Result<Option<CacheNamespace>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheNamespace>, Error> {
                let result = conn.query_row(
                    "SELECT name, category, version, created_at FROM namespaces WHERE name = ?1",
                    params![name],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, u32>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                );

                match result {
                    Ok((name, category, version, created_at)) => {
                        Ok(Some(CacheNamespace { name, category: category.parse()?, version, created_at }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// List every registered namespace, ordered by name.
    pub async fn list_namespaces(&self) -> Result<Vec<CacheNamespace>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<CacheNamespace>, Error> {
                let mut stmt = conn.prepare("SELECT name, category, version, created_at FROM namespaces ORDER BY name")?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, u32>(2)?, row.get(3)?))
                    })?
                    .collect::<Result<Vec<(String, String, u32, String)>, _>>()?;

                rows.into_iter()
                    .map(|(name, category, version, created_at)| {
                        Ok(CacheNamespace { name, category: category.parse()?, version, created_at })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a namespace and every entry it owns.
    ///
    /// Returns true if the namespace existed.
    pub async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM namespaces WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every namespace whose name is not in `keep`, in one transaction.
    ///
    /// Returns the names of the deleted namespaces.
    pub async fn evict_namespaces_except(&self, keep: &[String]) -> Result<Vec<String>, Error> {
        let keep = keep.to_vec();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let tx = conn.unchecked_transaction()?;
                let names = {
                    let mut stmt = tx.prepare("SELECT name FROM namespaces ORDER BY name")?;
                    stmt.query_map([], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<String>, _>>()?
                };

                let mut evicted = Vec::new();
                for name in names.into_iter().filter(|name| !keep.contains(name)) {
                    tx.execute("DELETE FROM namespaces WHERE name = ?1", params![name])?;
                    evicted.push(name);
                }
                tx.commit()?;
                Ok(evicted)
            })
            .await
            .map_err(Error::from)
    }
}
