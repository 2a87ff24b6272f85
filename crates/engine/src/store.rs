//! Cache store manager.
//!
//! Owns the current namespace of each category. Reads and writes only ever
//! target a current namespace, so once stale namespaces are evicted nothing
//! can be served from them.

use std::collections::BTreeMap;

use harbor_core::cache::{NamespaceContents, request_key};
use harbor_core::{AppConfig, Error, HarborDb, InterceptedRequest, NamespaceCategory, NetworkResponse};
use url::Url;

#[derive(Debug, Clone)]
pub struct CacheStore {
    db: HarborDb,
    prefix: String,
    version: u32,
    api_max_entries: Option<usize>,
    max_entry_bytes: Option<usize>,
}

/// URL used for keying: the request URL without its fragment.
pub fn cache_url(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

impl CacheStore {
    pub fn new(db: HarborDb, prefix: impl Into<String>, version: u32) -> Self {
        Self { db, prefix: prefix.into(), version, api_max_entries: None, max_entry_bytes: None }
    }

    pub fn from_config(db: HarborDb, config: &AppConfig) -> Self {
        let store = Self::new(db, config.cache_prefix.clone(), config.cache_version);
        Self { api_max_entries: Some(config.api_max_entries), max_entry_bytes: Some(config.max_bytes), ..store }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Name of the current namespace for a category.
    pub fn namespace_name(&self, category: NamespaceCategory) -> String {
        category.namespace_name(&self.prefix, self.version)
    }

    /// Names of all current namespaces.
    pub fn current_names(&self) -> Vec<String> {
        NamespaceCategory::ALL.iter().map(|c| self.namespace_name(*c)).collect()
    }

    /// Create the current namespace for a category if needed.
    pub async fn ensure_namespace(&self, category: NamespaceCategory) -> Result<String, Error> {
        let name = self.namespace_name(category);
        if self.db.ensure_namespace(&name, category, self.version).await? {
            tracing::info!(namespace = %name, "created cache namespace");
        }
        Ok(name)
    }

    /// Create every current namespace.
    pub async fn ensure_namespaces(&self) -> Result<Vec<String>, Error> {
        let mut names = Vec::with_capacity(NamespaceCategory::ALL.len());
        for category in NamespaceCategory::ALL {
            names.push(self.ensure_namespace(category).await?);
        }
        Ok(names)
    }

    /// Delete every namespace outside the current set.
    ///
    /// Returns the evicted names.
    pub async fn evict_stale(&self) -> Result<Vec<String>, Error> {
        let evicted = self.db.evict_namespaces_except(&self.current_names()).await?;
        if !evicted.is_empty() {
            tracing::info!(evicted = ?evicted, version = self.version, "evicted stale cache namespaces");
        }
        Ok(evicted)
    }

    /// Look up the stored response for a request in the category's current namespace.
    pub async fn get(
        &self, category: NamespaceCategory, request: &InterceptedRequest,
    ) -> Result<Option<NetworkResponse>, Error> {
        let url = cache_url(&request.url);
        let key = request_key(&request.method, url.as_str());
        let entry = self.db.get_entry(&self.namespace_name(category), &key).await?;
        Ok(entry.map(|entry| NetworkResponse::from_stored(entry.response, url)))
    }

    /// Store a response for a request in the category's current namespace.
    ///
    /// Bodies over the entry size limit are refused with `FetchTooLarge`.
    pub async fn put(
        &self, category: NamespaceCategory, request: &InterceptedRequest, response: &NetworkResponse,
    ) -> Result<(), Error> {
        if let Some(limit) = self.max_entry_bytes
            && response.body.len() > limit
        {
            return Err(Error::FetchTooLarge(format!(
                "{}: {} bytes exceeds {limit}",
                request.url,
                response.body.len()
            )));
        }

        let namespace = self.namespace_name(category);
        let url = cache_url(&request.url);
        let key = request_key(&request.method, url.as_str());
        self.db
            .put_entry(&namespace, &key, &request.method, url.as_str(), &response.to_stored())
            .await?;

        if category == NamespaceCategory::Api
            && let Some(max_entries) = self.api_max_entries
        {
            let trimmed = self.db.trim_entries(&namespace, max_entries).await?;
            if trimmed > 0 {
                tracing::debug!(namespace = %namespace, trimmed, "trimmed API namespace");
            }
        }
        Ok(())
    }

    /// Delete a namespace and its entries.
    pub async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        self.db.delete_namespace(name).await
    }

    /// Remove entries from one namespace, or from every registered namespace.
    ///
    /// Namespaces stay registered, so later writes still succeed. Returns the
    /// names that were cleared.
    pub async fn clear(&self, target: Option<&str>) -> Result<Vec<String>, Error> {
        let names: Vec<String> = match target {
            Some(name) => match self.db.get_namespace(name).await? {
                Some(namespace) => vec![namespace.name],
                None => return Err(Error::InvalidInput(format!("unknown cache namespace: {name}"))),
            },
            None => self.db.list_namespaces().await?.into_iter().map(|n| n.name).collect(),
        };

        for name in &names {
            let removed = self.db.clear_entries(name).await?;
            tracing::info!(namespace = %name, removed, "cleared cache namespace");
        }
        Ok(names)
    }

    /// Entry count and URLs for every registered namespace.
    pub async fn status(&self) -> Result<BTreeMap<String, NamespaceContents>, Error> {
        let mut status = BTreeMap::new();
        for namespace in self.db.list_namespaces().await? {
            let contents = self.db.namespace_contents(&namespace.name).await?;
            status.insert(namespace.name, contents);
        }
        Ok(status)
    }
}
