//! In-memory snapshot source.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use routewatch_types::{AnalyticsDomain, Filter};

use super::{SnapshotPayload, SnapshotSource};
use crate::EngineError;

#[derive(Debug, Clone)]
enum Response {
    Payload(SnapshotPayload),
    Failure(EngineError),
}

/// Serves payloads set by the caller.
///
/// Domains without a configured response return an empty payload. Useful
/// for tests and for running the engine without a server.
#[derive(Debug, Default)]
pub struct MemorySource {
    responses: RwLock<BTreeMap<AnalyticsDomain, Response>>,
    delays: RwLock<BTreeMap<AnalyticsDomain, Duration>>,
    requests: AtomicU64,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `payload` for `domain`.
    pub fn set_payload(&self, domain: AnalyticsDomain, payload: SnapshotPayload) {
        self.responses
            .write()
            .insert(domain, Response::Payload(payload));
    }

    /// Fail every fetch of `domain` with `error`.
    pub fn set_failure(&self, domain: AnalyticsDomain, error: EngineError) {
        self.responses
            .write()
            .insert(domain, Response::Failure(error));
    }

    /// Delay responses for `domain`.
    pub fn set_delay(&self, domain: AnalyticsDomain, delay: Duration) {
        self.delays.write().insert(domain, delay);
    }

    /// Remove any configured response for `domain`.
    pub fn clear(&self, domain: AnalyticsDomain) {
        self.responses.write().remove(&domain);
        self.delays.write().remove(&domain);
    }

    /// Number of fetches served so far.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SnapshotSource for MemorySource {
    async fn fetch(
        &self,
        domain: AnalyticsDomain,
        _filter: &Filter,
    ) -> Result<SnapshotPayload, EngineError> {
        self.requests.fetch_add(1, Ordering::Relaxed);

        let delay = self.delays.read().get(&domain).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.responses.read().get(&domain) {
            Some(Response::Payload(payload)) => Ok(payload.clone()),
            Some(Response::Failure(error)) => Err(error.clone()),
            None => Ok(SnapshotPayload::default()),
        }
    }

    fn description(&self) -> &str {
        "memory"
    }
}
