//! The engine facade wiring every component together.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use routewatch_types::{
    AnalyticsDomain, ConnectionState, ConnectionStatus, DashboardSnapshot, EngineState,
    FetchGeneration, Filter, MetricKey, MetricSample, RouterScope, TimeRange,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::composer::{DashboardComposer, RenderModel, Tab};
use crate::config::EngineConfig;
use crate::fetcher::{FetchOutcome, FetchStatus, SnapshotFetcher};
use crate::filter::FilterContext;
use crate::ingest::StreamIngester;
use crate::source::{HttpSnapshotSource, SnapshotSource};
use crate::store::TimeSeriesStore;
use crate::supervisor::{ChannelLease, ConnectionSupervisor, PushChannel};
use crate::transport::{self, PushTransport};
use crate::EngineError;

/// A fetch generation running in the background.
#[derive(Debug)]
pub struct FetchTicket {
    pub generation: FetchGeneration,
    handle: JoinHandle<FetchOutcome>,
}

impl FetchTicket {
    /// Wait for every domain of this generation to settle.
    pub async fn wait(self) -> Result<FetchOutcome, EngineError> {
        Ok(self.handle.await?)
    }
}

/// Couples filter changes with generation issuance.
///
/// Setting the filter and beginning its generation happen under one gate,
/// so generations are issued in the same order as the filters they carry.
#[derive(Debug)]
struct Refresher {
    fetcher: Arc<SnapshotFetcher>,
    filter: FilterContext,
    gate: Mutex<()>,
}

impl Refresher {
    fn refresh(&self) -> FetchTicket {
        let _gate = self.gate.lock();
        let filter = self.filter.current();
        let generation = self.fetcher.begin(&filter);
        self.spawn(generation, filter)
    }

    fn set_filter(&self, filter: Filter) -> Option<FetchTicket> {
        let _gate = self.gate.lock();
        if !self.filter.set(filter.clone()) {
            return None;
        }
        let generation = self.fetcher.begin(&filter);
        Some(self.spawn(generation, filter))
    }

    fn spawn(&self, generation: FetchGeneration, filter: Filter) -> FetchTicket {
        let fetcher = self.fetcher.clone();
        let handle = tokio::spawn(async move { fetcher.run(generation, &filter).await });
        FetchTicket { generation, handle }
    }
}

/// Client-side analytics engine for the router dashboards.
///
/// Reconciles full snapshots fetched per analytics domain with samples
/// pushed over a shared channel into bounded per-metric histories.
///
/// # Example
///
/// ```rust,no_run
/// use routewatch_engine::{AnalyticsEngine, EngineConfig, Tab};
/// use routewatch_types::{MetricKey, TimeRange};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut config = EngineConfig::default();
///     config.fetch.base_url = "http://localhost:8080".into();
///     config.push.address = Some("ws://localhost:8080/ws".into());
///
///     let engine = AnalyticsEngine::builder().config(config).build()?;
///     engine.start().wait().await?;
///
///     println!("{} latency samples", engine.read(&MetricKey::Latency).len());
///
///     if let Some(ticket) = engine.set_filter(TimeRange::LastDay, "edge-1") {
///         ticket.wait().await?;
///     }
///     let overview = engine.compose(Tab::Overview);
///     println!("{}", serde_json::to_string_pretty(&overview)?);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct AnalyticsEngine {
    config: EngineConfig,
    store: Arc<TimeSeriesStore>,
    ingester: Arc<StreamIngester>,
    refresher: Arc<Refresher>,
    channel: Option<Arc<PushChannel>>,
    lease: Mutex<Option<ChannelLease>>,
}

impl AnalyticsEngine {
    /// Create a builder for configuring the engine.
    pub fn builder() -> AnalyticsEngineBuilder {
        AnalyticsEngineBuilder::default()
    }

    /// Create an engine from explicit parts.
    ///
    /// Without a transport the engine runs on snapshots alone and always
    /// reports [`ConnectionStatus::Disconnected`].
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn SnapshotSource>,
        transport: Option<Arc<dyn PushTransport>>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let store = Arc::new(TimeSeriesStore::new(config.capacity));
        let ingester = Arc::new(StreamIngester::new(store.clone()));
        let fetcher = Arc::new(SnapshotFetcher::new(
            source,
            store.clone(),
            config.fetch.request_timeout(),
        ));
        let refresher = Arc::new(Refresher {
            fetcher,
            filter: FilterContext::new(config.initial_filter()),
            gate: Mutex::new(()),
        });

        let channel = transport.map(|transport| {
            let mut supervisor = ConnectionSupervisor::new(
                transport,
                ingester.clone(),
                config.push.reconnect.clone(),
            );
            if config.push.resync_on_reconnect {
                let refresher = refresher.clone();
                supervisor = supervisor.with_reconnect_hook(Arc::new(move || {
                    let ticket = refresher.refresh();
                    info!(generation = %ticket.generation, "Resyncing snapshots after reconnect");
                }));
            }
            PushChannel::new(supervisor)
        });

        Ok(Self {
            config,
            store,
            ingester,
            refresher,
            channel,
            lease: Mutex::new(None),
        })
    }

    /// Take the engine's own hold on the push channel and fetch the
    /// initial snapshot. Must be called from within a tokio runtime.
    pub fn start(&self) -> FetchTicket {
        if let Some(channel) = &self.channel {
            let mut lease = self.lease.lock();
            if lease.is_none() {
                *lease = Some(channel.acquire());
            }
        }
        debug!("Engine started");
        self.refresh()
    }

    /// Release the engine's hold on the push channel.
    ///
    /// The connection stays up while other leases are held.
    pub fn stop(&self) {
        if self.lease.lock().take().is_some() {
            debug!("Engine released push channel");
        }
    }

    /// Additional hold on the push channel, for a consumer that needs live
    /// updates independently of [`start`](Self::start).
    pub fn acquire_channel(&self) -> Option<ChannelLease> {
        self.channel.as_ref().map(|channel| channel.acquire())
    }

    /// Copy of one metric's history, oldest first.
    pub fn read(&self, key: &MetricKey) -> Vec<MetricSample> {
        self.store.read(key)
    }

    pub fn current_snapshot(&self) -> DashboardSnapshot {
        self.store.snapshot()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection_state().status()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel
            .as_ref()
            .map_or(ConnectionState::Closed, |channel| channel.state())
    }

    /// Subscribe to push channel state transitions.
    pub fn watch_connection(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.channel.as_ref().map(|channel| channel.subscribe_state())
    }

    /// Start a new fetch generation under the current filter.
    pub fn refresh(&self) -> FetchTicket {
        self.refresher.refresh()
    }

    /// Change the filter and re-fetch. Returns `None` when the filter is
    /// unchanged.
    pub fn set_filter(
        &self,
        time_range: TimeRange,
        router: impl Into<RouterScope>,
    ) -> Option<FetchTicket> {
        self.refresher.set_filter(Filter::new(time_range, router))
    }

    pub fn filter(&self) -> Filter {
        self.refresher.filter.current()
    }

    pub fn watch_filter(&self) -> watch::Receiver<Filter> {
        self.refresher.filter.subscribe()
    }

    pub fn state(&self) -> EngineState {
        self.refresher.fetcher.state()
    }

    pub fn is_loading(&self) -> bool {
        self.refresher.fetcher.is_loading()
    }

    /// Failed domains of the latest fetch generation.
    pub fn domain_errors(&self) -> BTreeMap<AnalyticsDomain, String> {
        self.refresher.fetcher.domain_errors()
    }

    pub fn watch_status(&self) -> watch::Receiver<FetchStatus> {
        self.refresher.fetcher.subscribe()
    }

    /// Compose one tab under the current filter.
    pub fn compose(&self, tab: Tab) -> RenderModel {
        DashboardComposer::compose(&self.store, &self.filter(), tab)
    }

    pub fn store(&self) -> &Arc<TimeSeriesStore> {
        &self.store
    }

    pub fn ingester(&self) -> &Arc<StreamIngester> {
        &self.ingester
    }

    pub fn channel(&self) -> Option<&Arc<PushChannel>> {
        self.channel.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Builder for AnalyticsEngine.
#[derive(Debug, Default)]
pub struct AnalyticsEngineBuilder {
    config: Option<EngineConfig>,
    source: Option<Arc<dyn SnapshotSource>>,
    transport: Option<Arc<dyn PushTransport>>,
}

impl AnalyticsEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use `source` instead of the HTTP client built from `config.fetch`.
    pub fn source(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Use `transport` instead of the one picked for `config.push.address`.
    pub fn transport(mut self, transport: Arc<dyn PushTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<AnalyticsEngine, EngineError> {
        let config = self.config.unwrap_or_default();

        let source = match self.source {
            Some(source) => source,
            None => Arc::new(HttpSnapshotSource::from_config(&config.fetch)?),
        };

        let transport = self.transport.or_else(|| {
            config
                .push
                .address
                .as_deref()
                .map(transport::for_address)
        });

        AnalyticsEngine::new(config, source, transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySource, SnapshotPayload};

    fn engine(source: Arc<MemorySource>) -> AnalyticsEngine {
        AnalyticsEngine::builder()
            .config(EngineConfig::default().with_capacity(5))
            .source(source)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_fetches_and_becomes_ready() {
        let source = Arc::new(MemorySource::new());
        source.set_payload(
            AnalyticsDomain::Traffic,
            SnapshotPayload::new()
                .with_series(MetricKey::Bandwidth, (1..=8).map(|t| MetricSample::new(t, 1.0)).collect()),
        );
        let engine = engine(source);
        assert_eq!(engine.state(), EngineState::Idle);

        let outcome = engine.start().wait().await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.read(&MetricKey::Bandwidth).len(), 5);
        assert_eq!(engine.connection_status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_same_filter_issues_no_generation() {
        let engine = engine(Arc::new(MemorySource::new()));
        assert!(engine.set_filter(TimeRange::LastHour, "all").is_none());

        let ticket = engine.set_filter(TimeRange::LastSixHours, "core-2").unwrap();
        assert_eq!(ticket.generation, FetchGeneration(1));
        ticket.wait().await.unwrap();
        assert_eq!(engine.filter().time_range, TimeRange::LastSixHours);
        assert_eq!(engine.compose(Tab::Traffic).filter, engine.filter());
    }

    #[tokio::test]
    async fn test_partial_error_is_reported_per_domain() {
        let source = Arc::new(MemorySource::new());
        source.set_failure(AnalyticsDomain::Impairment, EngineError::Timeout);
        let engine = engine(source);

        engine.refresh().wait().await.unwrap();
        assert_eq!(engine.state(), EngineState::PartialError);
        assert_eq!(
            engine.domain_errors().get(&AnalyticsDomain::Impairment).map(String::as_str),
            Some("Request timed out")
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = AnalyticsEngine::builder()
            .config(EngineConfig::default().with_capacity(0))
            .source(Arc::new(MemorySource::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
