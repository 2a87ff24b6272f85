//! Control channel.
//!
//! Messages from the foreground application that act directly on the cache
//! store, bypassing interception. None of them touch the sync queue.

use std::collections::BTreeMap;
use std::sync::Arc;

use harbor_core::cache::NamespaceContents;
use harbor_core::{Error, InterceptedRequest, Network};
use serde::{Deserialize, Serialize};

use crate::classify::Classifier;
use crate::store::CacheStore;

/// A control message, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Fetch and store the given URLs.
    CacheContent { urls: Vec<String> },
    /// Clear one namespace, or all of them when no name is given.
    ClearCache {
        #[serde(default, rename = "cacheName", skip_serializing_if = "Option::is_none")]
        cache_name: Option<String>,
    },
    GetCacheStatus,
}

/// Reply to a control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    ContentCached { cached: Vec<String>, skipped: Vec<String>, failed: Vec<String> },
    CacheCleared { cleared: Vec<String> },
    CacheStatus { data: BTreeMap<String, NamespaceContents> },
}

pub struct ControlChannel {
    classifier: Classifier,
    store: CacheStore,
    network: Arc<dyn Network>,
}

impl ControlChannel {
    pub fn new(classifier: Classifier, store: CacheStore, network: Arc<dyn Network>) -> Self {
        Self { classifier, store, network }
    }

    pub async fn handle(&self, message: ControlMessage) -> Result<ControlReply, Error> {
        match message {
            ControlMessage::CacheContent { urls } => self.cache_content(&urls).await,
            ControlMessage::ClearCache { cache_name } => {
                let cleared = self.store.clear(cache_name.as_deref()).await?;
                Ok(ControlReply::CacheCleared { cleared })
            }
            ControlMessage::GetCacheStatus => Ok(ControlReply::CacheStatus { data: self.store.status().await? }),
        }
    }

    /// Fetch each URL and store 2xx responses in the namespace its class selects.
    ///
    /// URLs that would pass through interception are skipped. Fetch and write
    /// failures are reported per URL; only a bad URL fails the whole message.
    async fn cache_content(&self, urls: &[String]) -> Result<ControlReply, Error> {
        let mut cached = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();

        for raw in urls {
            let url = self
                .classifier
                .origin()
                .join(raw)
                .map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))?;
            let request = InterceptedRequest::get(url);
            let Some(class) = self.classifier.classify(&request.method, &request.url) else {
                skipped.push(raw.clone());
                continue;
            };

            let stored = match self.network.fetch(&request).await {
                Ok(response) if response.is_success() => self.store.put(class.category(), &request, &response).await,
                Ok(response) => Err(Error::NetworkUnavailable(format!("status {}", response.status))),
                Err(e) => Err(e),
            };
            match stored {
                Ok(()) => cached.push(raw.clone()),
                Err(e) => {
                    tracing::warn!(url = %request.url, error = %e, "failed to cache content");
                    failed.push(raw.clone());
                }
            }
        }

        tracing::info!(cached = cached.len(), skipped = skipped.len(), failed = failed.len(), "cached content");
        Ok(ControlReply::ContentCached { cached, skipped, failed })
    }
}
