//! Generation-checked, concurrent snapshot fetching.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use routewatch_types::{AnalyticsDomain, EngineState, FetchGeneration, Filter, MetricKey};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::source::{SnapshotPayload, SnapshotSource};
use crate::store::TimeSeriesStore;
use crate::EngineError;

/// Observable state of the fetcher.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchStatus {
    pub state: EngineState,
    /// Latest generation issued.
    pub generation: FetchGeneration,
    /// Filter the latest generation was issued under.
    pub filter: Filter,
    /// Failed domains of the latest generation, with their error message.
    pub errors: BTreeMap<AnalyticsDomain, String>,
}

/// What happened to one domain's response.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainOutcome {
    /// Written to the store.
    Applied,
    /// The request failed or timed out; the store was left untouched.
    Failed(EngineError),
    /// A newer generation was issued before the response arrived.
    Discarded,
}

/// Result of one fetch generation.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub generation: FetchGeneration,
    pub domains: BTreeMap<AnalyticsDomain, DomainOutcome>,
    /// A newer generation was issued while this one was in flight.
    pub superseded: bool,
}

impl FetchOutcome {
    /// Every domain was applied.
    pub fn is_success(&self) -> bool {
        self.domains
            .values()
            .all(|outcome| matches!(outcome, DomainOutcome::Applied))
    }

    /// Domains whose request failed.
    pub fn failed(&self) -> impl Iterator<Item = (AnalyticsDomain, &EngineError)> {
        self.domains.iter().filter_map(|(domain, outcome)| match outcome {
            DomainOutcome::Failed(err) => Some((*domain, err)),
            _ => None,
        })
    }
}

#[derive(Debug, Default)]
struct FetchState {
    latest: FetchGeneration,
    filter: Filter,
    state: EngineState,
    errors: BTreeMap<AnalyticsDomain, String>,
    /// Domain whose snapshot last populated each series.
    owners: BTreeMap<MetricKey, AnalyticsDomain>,
}

/// Issues one request per analytics domain and applies the responses.
///
/// Every call to [`begin`](Self::begin) issues a new generation. Responses
/// are checked against the latest generation and applied under the same
/// lock, so a response from a superseded generation can never overwrite
/// data from a newer one, whatever order the responses arrive in.
///
/// Applying a domain's snapshot merges in stream samples appended since the
/// generation began, and empties any series the domain populated before but
/// left out this time.
#[derive(Debug)]
pub struct SnapshotFetcher {
    source: Arc<dyn SnapshotSource>,
    store: Arc<TimeSeriesStore>,
    request_timeout: Duration,
    inner: Mutex<FetchState>,
    status_tx: watch::Sender<FetchStatus>,
}

impl SnapshotFetcher {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        store: Arc<TimeSeriesStore>,
        request_timeout: Duration,
    ) -> Self {
        let (status_tx, _) = watch::channel(FetchStatus::default());
        Self {
            source,
            store,
            request_timeout,
            inner: Mutex::new(FetchState::default()),
            status_tx,
        }
    }

    /// Issue a new generation under `filter` and enter `Loading`.
    pub fn begin(&self, filter: &Filter) -> FetchGeneration {
        let mut inner = self.inner.lock();
        inner.latest = inner.latest.next();
        inner.filter = filter.clone();
        inner.state = EngineState::Loading;
        inner.errors.clear();
        self.store.mark(inner.latest.get());
        self.publish(&inner);

        debug!(generation = %inner.latest, %filter, "Issued fetch generation");
        inner.latest
    }

    /// Fetch every domain for `generation` concurrently.
    ///
    /// A failing or slow domain never aborts the others. Each response is
    /// applied as soon as it arrives.
    pub async fn run(&self, generation: FetchGeneration, filter: &Filter) -> FetchOutcome {
        let requests = AnalyticsDomain::ALL.into_iter().map(|domain| async move {
            let result =
                match tokio::time::timeout(self.request_timeout, self.source.fetch(domain, filter))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(EngineError::Timeout),
                };
            (domain, self.apply(generation, domain, result))
        });

        let domains: BTreeMap<_, _> = join_all(requests).await.into_iter().collect();
        let superseded = !self.settle(generation);

        FetchOutcome {
            generation,
            domains,
            superseded,
        }
    }

    /// Issue a generation and run it to completion.
    pub async fn fetch(&self, filter: &Filter) -> FetchOutcome {
        let generation = self.begin(filter);
        self.run(generation, filter).await
    }

    fn apply(
        &self,
        generation: FetchGeneration,
        domain: AnalyticsDomain,
        result: Result<SnapshotPayload, EngineError>,
    ) -> DomainOutcome {
        let mut inner = self.inner.lock();
        if generation != inner.latest {
            let stale = EngineError::StaleResultDiscarded {
                generation: generation.get(),
                latest: inner.latest.get(),
            };
            debug!(%domain, "{stale}");
            return DomainOutcome::Discarded;
        }

        match result {
            Ok(payload) => {
                let series = payload.series.len();
                let dropped: Vec<MetricKey> = inner
                    .owners
                    .iter()
                    .filter(|(key, owner)| **owner == domain && !payload.series.contains_key(*key))
                    .map(|(key, _)| key.clone())
                    .collect();
                for key in dropped {
                    debug!(%domain, %key, "Series absent from snapshot, clearing");
                    inner.owners.remove(&key);
                    self.store.reconcile(&key, Vec::new(), generation.get());
                }
                for (key, samples) in payload.series {
                    self.store.reconcile(&key, samples, generation.get());
                    inner.owners.insert(key, domain);
                }
                self.store
                    .replace_aggregate(domain, payload.counters, generation.get());
                inner.errors.remove(&domain);

                debug!(%domain, %generation, series, "Applied snapshot");
                DomainOutcome::Applied
            }
            Err(err) => {
                warn!(%domain, %generation, error = %err, "Snapshot request failed");
                inner.errors.insert(domain, err.to_string());
                DomainOutcome::Failed(err)
            }
        }
    }

    /// Leave `Loading` if `generation` is still the latest. Returns false otherwise.
    fn settle(&self, generation: FetchGeneration) -> bool {
        let mut inner = self.inner.lock();
        if generation != inner.latest {
            return false;
        }

        inner.state = if inner.errors.is_empty() {
            EngineState::Ready
        } else {
            EngineState::PartialError
        };
        self.publish(&inner);

        info!(
            %generation,
            state = %inner.state,
            failed = inner.errors.len(),
            "Snapshot fetch settled"
        );
        true
    }

    fn publish(&self, inner: &FetchState) {
        self.status_tx.send_replace(FetchStatus {
            state: inner.state,
            generation: inner.latest,
            filter: inner.filter.clone(),
            errors: inner.errors.clone(),
        });
    }

    pub fn state(&self) -> EngineState {
        self.inner.lock().state
    }

    pub fn is_loading(&self) -> bool {
        self.state() == EngineState::Loading
    }

    pub fn latest_generation(&self) -> FetchGeneration {
        self.inner.lock().latest
    }

    /// Failed domains of the latest generation.
    pub fn domain_errors(&self) -> BTreeMap<AnalyticsDomain, String> {
        self.inner.lock().errors.clone()
    }

    pub fn status(&self) -> FetchStatus {
        self.status_tx.borrow().clone()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<FetchStatus> {
        self.status_tx.subscribe()
    }

    pub fn store(&self) -> &Arc<TimeSeriesStore> {
        &self.store
    }
}
