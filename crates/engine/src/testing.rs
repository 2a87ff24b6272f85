//! In-process doubles for the network seams.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use harbor_core::{Error, InterceptedRequest, Network, NetworkResponse, ReplayTarget};
use url::Url;

/// 200 response with the given body.
pub fn ok(body: &str) -> NetworkResponse {
    NetworkResponse {
        status: 200,
        headers: vec![("content-type".to_string(), "text/plain".to_string())],
        body: Bytes::from(body.to_string()),
        url: Url::parse("https://app.example.com/").unwrap(),
    }
}

/// Network keyed by path. Unknown paths answer 404.
#[derive(Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, NetworkResponse>>,
    failing: Mutex<HashSet<String>>,
    too_large: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl FakeNetwork {
    pub fn respond(&self, path: &str, response: NetworkResponse) {
        self.routes.lock().unwrap().insert(path.to_string(), response);
    }

    /// Reject fetches for one path only.
    pub fn fail(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    /// Answer one path with `FetchTooLarge` while the network stays up.
    pub fn fail_too_large(&self, path: &str) {
        self.too_large.lock().unwrap().insert(path.to_string());
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<NetworkResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = request.url.path().to_string();

        if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&path) {
            return Err(Error::NetworkUnavailable(format!("{} unreachable", request.url)));
        }
        if self.too_large.lock().unwrap().contains(&path) {
            return Err(Error::FetchTooLarge(format!("{} over limit", request.url)));
        }

        let routed = self.routes.lock().unwrap().get(&path).cloned();
        let mut response = routed.unwrap_or_else(|| NetworkResponse { status: 404, ..ok("not found") });
        response.url = request.url.clone();
        Ok(response)
    }
}

/// Replay endpoint answering with a fixed status, recording every delivery.
pub struct FakeReplay {
    status: Mutex<u16>,
    rejected_ids: Mutex<HashSet<String>>,
    delivered: Mutex<Vec<(String, String, serde_json::Value)>>,
}

impl Default for FakeReplay {
    fn default() -> Self {
        Self { status: Mutex::new(200), rejected_ids: Mutex::default(), delivered: Mutex::default() }
    }
}

impl FakeReplay {
    pub fn set_status(&self, status: u16) {
        *self.status.lock().unwrap() = status;
    }

    pub fn reject(&self, id: &str) {
        self.rejected_ids.lock().unwrap().insert(id.to_string());
    }

    /// Record ids in delivery order.
    pub fn delivered_ids(&self) -> Vec<String> {
        self.delivered.lock().unwrap().iter().map(|(id, _, _)| id.clone()).collect()
    }

    /// Endpoint paths in delivery order.
    pub fn delivered_paths(&self) -> Vec<String> {
        self.delivered.lock().unwrap().iter().map(|(_, path, _)| path.clone()).collect()
    }
}

#[async_trait]
impl ReplayTarget for FakeReplay {
    async fn replay(
        &self, endpoint: &Url, record_id: &str, _tag: &str, payload: &serde_json::Value,
    ) -> Result<(), Error> {
        self.delivered
            .lock()
            .unwrap()
            .push((record_id.to_string(), endpoint.path().to_string(), payload.clone()));

        let status = *self.status.lock().unwrap();
        if status >= 300 || self.rejected_ids.lock().unwrap().contains(record_id) {
            let status = if status >= 300 { status } else { 500 };
            return Err(Error::ReplayRejected { record_id: record_id.to_string(), status });
        }
        Ok(())
    }
}
