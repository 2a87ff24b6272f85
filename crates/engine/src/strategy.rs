//! Caching strategies.
//!
//! - **Cache-first** for static assets: a hit never touches the network.
//! - **Network-first** for API reads: the network answer wins and refreshes
//!   the cache; the cache only answers when the network rejects.
//! - **Stale-while-revalidate** for documents: a hit is returned at once and
//!   exactly one background fetch refreshes the entry.
//!
//! Storage errors never fail a request. A failed write is logged and the
//! response is still returned; a failed read is logged and treated as a miss.
//!
//! Only `NetworkUnavailable` counts as offline. Any other fetch error gets a
//! synthetic 502 and never a cached or offline answer.

use std::sync::Arc;

use bytes::Bytes;
use harbor_core::{Error, InterceptedRequest, NamespaceCategory, Network, NetworkResponse};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use url::Url;

use crate::classify::RequestClass;
use crate::store::CacheStore;

/// Header marking responses produced while the network was unreachable.
pub const OFFLINE_HEADER: &str = "x-harbor-offline";

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    /// Cached copy served because the network rejected the fetch.
    CacheStale,
    OfflineFallback,
    Synthetic,
    PassThrough,
}

/// A response plus its provenance.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub response: NetworkResponse,
    pub source: ResponseSource,
}

impl EngineResponse {
    fn new(response: NetworkResponse, source: ResponseSource) -> Self {
        Self { response, source }
    }
}

pub struct Strategies {
    store: CacheStore,
    network: Arc<dyn Network>,
    offline_fallback: Option<Url>,
    revalidations: Mutex<JoinSet<()>>,
}

impl Strategies {
    pub fn new(store: CacheStore, network: Arc<dyn Network>, offline_fallback: Option<Url>) -> Self {
        Self { store, network, offline_fallback, revalidations: Mutex::new(JoinSet::new()) }
    }

    /// Serve a classified request with its class's strategy.
    pub async fn handle(&self, class: RequestClass, request: &InterceptedRequest) -> EngineResponse {
        let category = class.category();
        match class {
            RequestClass::Static => self.cache_first(category, request).await,
            RequestClass::Api => self.network_first(category, request).await,
            RequestClass::Document => self.stale_while_revalidate(category, request).await,
        }
    }

    /// Forward a request untouched. Network errors propagate to the caller.
    pub async fn pass_through(&self, request: &InterceptedRequest) -> Result<EngineResponse, Error> {
        let response = self.network.fetch(request).await?;
        Ok(EngineResponse::new(response, ResponseSource::PassThrough))
    }

    pub async fn cache_first(&self, category: NamespaceCategory, request: &InterceptedRequest) -> EngineResponse {
        if let Some(cached) = self.cached(category, request).await {
            tracing::debug!(url = %request.url, %category, "cache hit");
            return EngineResponse::new(cached, ResponseSource::Cache);
        }
        tracing::debug!(url = %request.url, %category, "cache miss");

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_copy(category, request, &response).await;
                }
                EngineResponse::new(response, ResponseSource::Network)
            }
            Err(e @ Error::NetworkUnavailable(_)) => {
                tracing::warn!(url = %request.url, error = %e, "fetch failed on cache miss");
                self.offline_fallback(request).await
            }
            Err(e) => fetch_error(request, &e),
        }
    }

    pub async fn network_first(&self, category: NamespaceCategory, request: &InterceptedRequest) -> EngineResponse {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_copy(category, request, &response).await;
                }
                EngineResponse::new(response, ResponseSource::Network)
            }
            Err(e @ Error::NetworkUnavailable(_)) => {
                tracing::warn!(url = %request.url, error = %e, "network unavailable, trying cache");
                match self.cached(category, request).await {
                    Some(mut cached) => {
                        cached.headers.push((OFFLINE_HEADER.to_string(), "stale".to_string()));
                        EngineResponse::new(cached, ResponseSource::CacheStale)
                    }
                    None => EngineResponse::new(offline_json(&request.url), ResponseSource::Synthetic),
                }
            }
            Err(e) => fetch_error(request, &e),
        }
    }

    pub async fn stale_while_revalidate(
        &self, category: NamespaceCategory, request: &InterceptedRequest,
    ) -> EngineResponse {
        if let Some(cached) = self.cached(category, request).await {
            tracing::debug!(url = %request.url, %category, "cache hit, revalidating");
            self.spawn_revalidation(category, request).await;
            return EngineResponse::new(cached, ResponseSource::Cache);
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_copy(category, request, &response).await;
                }
                EngineResponse::new(response, ResponseSource::Network)
            }
            Err(e @ Error::NetworkUnavailable(_)) => {
                tracing::warn!(url = %request.url, error = %e, "document fetch failed");
                self.offline_fallback(request).await
            }
            Err(e) => fetch_error(request, &e),
        }
    }

    /// Wait for every background revalidation started so far.
    pub async fn settle(&self) {
        let mut tasks = std::mem::take(&mut *self.revalidations.lock().await);
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "revalidation task failed");
            }
        }
    }

    async fn spawn_revalidation(&self, category: NamespaceCategory, request: &InterceptedRequest) {
        let store = self.store.clone();
        let network = Arc::clone(&self.network);
        let request = request.clone();

        let mut tasks = self.revalidations.lock().await;
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move { revalidate(&store, network.as_ref(), category, &request).await });
    }

    async fn cached(&self, category: NamespaceCategory, request: &InterceptedRequest) -> Option<NetworkResponse> {
        match self.store.get(category, request).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(url = %request.url, %category, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn store_copy(&self, category: NamespaceCategory, request: &InterceptedRequest, response: &NetworkResponse) {
        if let Err(e) = self.store.put(category, request, response).await {
            tracing::warn!(url = %request.url, %category, error = %e, "cache write failed");
        }
    }

    /// The cached offline document, or a synthetic 503.
    async fn offline_fallback(&self, request: &InterceptedRequest) -> EngineResponse {
        if let Some(fallback) = &self.offline_fallback {
            let fallback_request = InterceptedRequest::get(fallback.clone());
            if let Some(cached) = self.cached(NamespaceCategory::Shell, &fallback_request).await {
                return EngineResponse::new(cached, ResponseSource::OfflineFallback);
            }
        }
        EngineResponse::new(offline_text(&request.url), ResponseSource::Synthetic)
    }
}

async fn revalidate(store: &CacheStore, network: &dyn Network, category: NamespaceCategory, request: &InterceptedRequest) {
    match network.fetch(request).await {
        Ok(response) if response.is_success() => {
            if let Err(e) = store.put(category, request, &response).await {
                tracing::warn!(url = %request.url, error = %e, "revalidation write failed");
            } else {
                tracing::debug!(url = %request.url, "revalidated");
            }
        }
        Ok(response) => tracing::debug!(url = %request.url, status = response.status, "revalidation not stored"),
        Err(e) => tracing::debug!(url = %request.url, error = %e, "revalidation failed"),
    }
}

/// A fetch that failed while the network was reachable.
fn fetch_error(request: &InterceptedRequest, error: &Error) -> EngineResponse {
    tracing::warn!(url = %request.url, error = %error, "fetch failed");
    let response = NetworkResponse {
        status: 502,
        headers: vec![("content-type".to_string(), "text/plain; charset=utf-8".to_string())],
        body: Bytes::from_static(b"Bad Gateway"),
        url: request.url.clone(),
    };
    EngineResponse::new(response, ResponseSource::Synthetic)
}

fn offline_text(url: &Url) -> NetworkResponse {
    NetworkResponse {
        status: 503,
        headers: vec![
            ("content-type".to_string(), "text/plain; charset=utf-8".to_string()),
            (OFFLINE_HEADER.to_string(), "uncached".to_string()),
        ],
        body: Bytes::from_static(b"Offline"),
        url: url.clone(),
    }
}

fn offline_json(url: &Url) -> NetworkResponse {
    let body = serde_json::json!({"error": "offline", "offline": true, "cached": false});
    NetworkResponse {
        status: 503,
        headers: vec![
            ("content-type".to_string(), "application/json".to_string()),
            (OFFLINE_HEADER.to_string(), "uncached".to_string()),
        ],
        body: Bytes::from(body.to_string()),
        url: url.clone(),
    }
}
