//! # routewatch-engine
//!
//! Client-side analytics engine for router-platform dashboards.
//!
//! The engine reconciles two independently arriving data sources into
//! bounded per-metric histories:
//!
//! - full snapshots fetched per analytics domain, filtered by time range
//!   and router, and
//! - metric updates pushed over one shared long-lived channel.
//!
//! Read-side views compose their models from the same store without
//! re-deriving state or racing each other.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use routewatch_engine::{AnalyticsEngine, EngineConfig, Tab};
//! use routewatch_types::MetricKey;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Defaults, then routewatch.toml, then ROUTEWATCH_* variables
//!     let config = EngineConfig::load(Some("routewatch.toml".as_ref()))?;
//!     let engine = AnalyticsEngine::builder().config(config).build()?;
//!
//!     // Connect the push channel and fetch every domain
//!     engine.start().wait().await?;
//!
//!     let latency = engine.read(&MetricKey::Latency);
//!     println!("{} samples, {}", latency.len(), engine.connection_status());
//!
//!     let model = engine.compose(Tab::Convergence);
//!     println!("{}", serde_json::to_string(&model)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Bounded history**: one ring buffer per metric, oldest evicted first
//! - **Last generation wins**: responses of superseded fetches are discarded
//! - **No lost updates**: samples pushed while a fetch is in flight are merged
//!   after its snapshot
//! - **Partial failure**: each domain fails on its own, with its own error
//! - **One shared connection**: lease-counted, reconnects with capped backoff
//! - **Pluggable I/O**: snapshot sources and push transports (WebSocket,
//!   NDJSON over TCP, in-process) are traits

mod composer;
mod config;
mod engine;
mod error;
mod fetcher;
mod filter;
mod ingest;
mod store;
mod supervisor;

pub mod source;
pub mod transport;

pub use composer::{
    Bar, ConvergenceModel, ConvergenceSlice, DashboardComposer, ImpairmentModel, LineSeries,
    OverviewModel, PerformanceModel, RenderModel, ScatterPoint, SeriesSummary, ShapingModel,
    Tab, TabView, TrafficModel,
};
pub use config::{EngineConfig, FetchConfig, PushConfig, ReconnectPolicy};
pub use engine::{AnalyticsEngine, AnalyticsEngineBuilder, FetchTicket};
pub use error::EngineError;
pub use fetcher::{DomainOutcome, FetchOutcome, FetchStatus, SnapshotFetcher};
pub use filter::FilterContext;
pub use ingest::{FrameKind, IngestReport, IngestStats, StreamIngester, METRICS_UPDATE};
pub use store::{MetricSeries, TimeSeriesStore};
pub use supervisor::{ChannelLease, ConnectionSupervisor, PushChannel, ReconnectHook};

// Re-export types for convenience
pub use routewatch_types::{
    AnalyticsDomain, ConnectionState, ConnectionStatus, DashboardSnapshot, EngineState,
    FetchGeneration, Filter, MetricKey, MetricSample, RouterScope, TimeRange,
};
