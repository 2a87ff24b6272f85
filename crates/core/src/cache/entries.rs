//! Cached entry CRUD operations.
//!
//! Entries are stored responses keyed by `(namespace, request_key)`. Writes
//! to a namespace that is not registered fail with a foreign key violation,
//! so an evicted namespace can never be repopulated by a late write.

use super::connection::HarborDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A response as persisted in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl StoredResponse {
    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A cached response owned by exactly one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub namespace: String,
    pub request_key: String,
    pub method: String,
    pub url: String,
    pub response: StoredResponse,
    pub inserted_at: String,
}

/// Per-namespace entry count and URL listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceContents {
    pub count: usize,
    pub urls: Vec<String>,
}

impl HarborDb {
    /// Insert or replace a cached entry.
    ///
    /// `inserted_at` is refreshed on every write so the most recent copy wins.
    pub async fn put_entry(
        &self, namespace: &str, request_key: &str, method: &str, url: &str, response: &StoredResponse,
    ) -> Result<(), Error> {
        let namespace = namespace.to_string();
        let request_key = request_key.to_string();
        let method = method.to_ascii_uppercase();
        let url = url.to_string();
        let headers_json = serde_json::to_string(&response.headers)?;
        let status = response.status;
        let body = response.body.clone();
        let inserted_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (namespace, request_key, method, url, status, headers_json, body, inserted_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(namespace, request_key) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        inserted_at = excluded.inserted_at",
                    params![namespace, request_key, method, url, status, headers_json, body, inserted_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a cached entry.
    ///
    /// Returns None if the namespace doesn't exist or holds no entry for the key.
    pub async fn get_entry(&self, namespace: &str, request_key: &str) -> Result<Option<CachedEntry>, Error> {
        let namespace = namespace.to_string();
        let request_key = request_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT namespace, request_key, method, url, status, headers_json, body, inserted_at
                    FROM entries WHERE namespace = ?1 AND request_key = ?2",
                )?;

                let result = stmt.query_row(params![namespace, request_key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, u16>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, Vec<u8>>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                });

                match result {
                    Ok((namespace, request_key, method, url, status, headers_json, body, inserted_at)) => {
                        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                        Ok(Some(CachedEntry {
                            namespace,
                            request_key,
                            method,
                            url,
                            response: StoredResponse { status, headers, body },
                            inserted_at,
                        }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Count and list the URLs cached in a namespace, oldest first.
    pub async fn namespace_contents(&self, namespace: &str) -> Result<NamespaceContents, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<NamespaceContents, Error> {
                let mut stmt =
                    conn.prepare("SELECT url FROM entries WHERE namespace = ?1 ORDER BY inserted_at ASC, url ASC")?;
                let urls = stmt
                    .query_map(params![namespace], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(NamespaceContents { count: urls.len(), urls })
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry in a namespace, keeping the namespace registered.
    ///
    /// Returns the number of deleted entries.
    pub async fn clear_entries(&self, namespace: &str) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM entries WHERE namespace = ?1", params![namespace])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Purge oldest entries in a namespace until count <= max_entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn trim_entries(&self, namespace: &str, max_entries: usize) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        let max = max_entries as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE namespace = ?1", params![namespace], |row| {
                        row.get(0)
                    })?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE namespace = ?1 AND request_key IN (
                    SELECT request_key FROM entries WHERE namespace = ?1 ORDER BY inserted_at ASC LIMIT ?2
                )",
                    params![namespace, to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash::request_key;
    use crate::cache::namespaces::NamespaceCategory;

    fn response(body: &str) -> StoredResponse {
        StoredResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    async fn db_with_namespace(name: &str) -> HarborDb {
        let db = HarborDb::open_in_memory().await.unwrap();
        db.ensure_namespace(name, NamespaceCategory::Api, 1).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = db_with_namespace("harbor-api-v1").await;
        let url = "https://example.com/api/review/queue";
        let key = request_key("GET", url);

        db.put_entry("harbor-api-v1", &key, "get", url, &response("[1,2]")).await.unwrap();

        let entry = db.get_entry("harbor-api-v1", &key).await.unwrap().unwrap();
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.url, url);
        assert_eq!(entry.response.body, b"[1,2]".to_vec());
        assert_eq!(entry.response.header("Content-Type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = db_with_namespace("harbor-api-v1").await;
        let url = "https://example.com/api/stats";
        let key = request_key("GET", url);

        db.put_entry("harbor-api-v1", &key, "GET", url, &response("old")).await.unwrap();
        db.put_entry("harbor-api-v1", &key, "GET", url, &response("new")).await.unwrap();

        let entry = db.get_entry("harbor-api-v1", &key).await.unwrap().unwrap();
        assert_eq!(entry.response.body, b"new".to_vec());
        assert_eq!(db.namespace_contents("harbor-api-v1").await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_put_into_unknown_namespace_fails() {
        let db = HarborDb::open_in_memory().await.unwrap();
        let key = request_key("GET", "https://example.com/");
        let result = db.put_entry("harbor-api-v9", &key, "GET", "https://example.com/", &response("x")).await;
        assert!(matches!(result, Err(ref e) if e.is_storage()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = db_with_namespace("harbor-api-v1").await;
        assert!(db.get_entry("harbor-api-v1", "nonexistent").await.unwrap().is_none());
        assert!(db.get_entry("no-such-namespace", "nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entries_isolated_per_namespace() {
        let db = db_with_namespace("harbor-api-v1").await;
        db.ensure_namespace("harbor-shell-v1", NamespaceCategory::Shell, 1).await.unwrap();
        let key = request_key("GET", "https://example.com/");

        db.put_entry("harbor-api-v1", &key, "GET", "https://example.com/", &response("a")).await.unwrap();
        assert!(db.get_entry("harbor-shell-v1", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_namespace_cascades() {
        let db = db_with_namespace("harbor-api-v1").await;
        let key = request_key("GET", "https://example.com/api/a");
        db.put_entry("harbor-api-v1", &key, "GET", "https://example.com/api/a", &response("a")).await.unwrap();

        db.delete_namespace("harbor-api-v1").await.unwrap();
        assert!(db.get_entry("harbor-api-v1", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_and_contents() {
        let db = db_with_namespace("harbor-api-v1").await;
        for path in ["a", "b"] {
            let url = format!("https://example.com/api/{path}");
            db.put_entry("harbor-api-v1", &request_key("GET", &url), "GET", &url, &response(path)).await.unwrap();
        }

        let contents = db.namespace_contents("harbor-api-v1").await.unwrap();
        assert_eq!(contents.count, 2);
        assert!(contents.urls.contains(&"https://example.com/api/a".to_string()));

        assert_eq!(db.clear_entries("harbor-api-v1").await.unwrap(), 2);
        assert_eq!(db.namespace_contents("harbor-api-v1").await.unwrap().count, 0);
        assert!(db.get_namespace("harbor-api-v1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_trim_entries() {
        let db = db_with_namespace("harbor-api-v1").await;
        for path in ["a", "b", "c"] {
            let url = format!("https://example.com/api/{path}");
            db.put_entry("harbor-api-v1", &request_key("GET", &url), "GET", &url, &response(path)).await.unwrap();
        }

        assert_eq!(db.trim_entries("harbor-api-v1", 2).await.unwrap(), 1);
        assert_eq!(db.trim_entries("harbor-api-v1", 2).await.unwrap(), 0);
        assert_eq!(db.namespace_contents("harbor-api-v1").await.unwrap().count, 2);
    }
}
