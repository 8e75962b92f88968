use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use routewatch_engine::{AnalyticsEngine, EngineConfig, FetchOutcome, Tab};
use routewatch_types::{RouterScope, TimeRange};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "routewatch")]
#[command(about = "Headless client for the router-platform analytics dashboards")]
struct Args {
    /// Analytics server base URL (e.g. http://localhost:8080)
    #[arg(short, long)]
    server: Option<String>,

    /// Push feed for live updates (ws://host:port/ws, or host:port for NDJSON over TCP)
    #[arg(short, long)]
    push: Option<String>,

    /// Time range of the snapshots: 1h, 6h, 24h, 7d or 30d
    #[arg(short, long)]
    time_range: Option<TimeRange>,

    /// Router id, or "all"
    #[arg(short, long)]
    router: Option<String>,

    /// Samples kept per metric
    #[arg(long)]
    capacity: Option<usize>,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between printed views
    #[arg(short, long, default_value = "5")]
    interval: u64,

    /// Tab to compose: overview, traffic, performance, convergence, impairment, shaping
    #[arg(long, default_value = "overview")]
    tab: Tab,

    /// Fetch once, write the composed tab to this JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Log filter (e.g. "info", "routewatch_engine=debug"); defaults to RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Layer command-line overrides over the loaded configuration.
    fn apply(&self, mut config: EngineConfig) -> EngineConfig {
        if let Some(server) = &self.server {
            config.fetch.base_url = server.clone();
        }
        if let Some(push) = &self.push {
            config.push.address = Some(push.clone());
        }
        if let Some(time_range) = self.time_range {
            config.time_range = time_range;
        }
        if let Some(router) = &self.router {
            config.router = RouterScope::from(router.as_str());
        }
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        config
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let config = EngineConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    let config = args.apply(config);

    // Handle export mode (non-interactive)
    if let Some(export_path) = &args.export {
        return export_to_file(config, args.tab, export_path).await;
    }

    run(config, args.tab, Duration::from_secs(args.interval.max(1))).await
}

/// Fetch every domain once and write one composed tab as pretty JSON.
async fn export_to_file(mut config: EngineConfig, tab: Tab, export_path: &Path) -> Result<()> {
    // Snapshots only.
    config.push.address = None;

    let engine = AnalyticsEngine::builder().config(config).build()?;
    let outcome = engine.refresh().wait().await?;
    log_failures(&outcome);

    let model = engine.compose(tab);
    let json = serde_json::to_string_pretty(&model)?;
    std::fs::write(export_path, json)
        .with_context(|| format!("failed to write {}", export_path.display()))?;

    info!(path = %export_path.display(), %tab, "Exported dashboard view");
    Ok(())
}

/// Keep the engine running and print the composed tab every `interval`.
async fn run(config: EngineConfig, tab: Tab, interval: Duration) -> Result<()> {
    let engine = AnalyticsEngine::builder().config(config).build()?;
    info!(
        server = %engine.config().fetch.base_url,
        push = ?engine.config().push.address,
        filter = %engine.filter(),
        "Starting routewatch"
    );

    let initial = engine.start();

    let mut status = engine.watch_status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            info!(generation = %current.generation, state = %current.state, "Engine state");
        }
    });

    if let Some(mut connection) = engine.watch_connection() {
        tokio::spawn(async move {
            while connection.changed().await.is_ok() {
                let state = *connection.borrow_and_update();
                info!(%state, "Push channel");
            }
        });
    }

    log_failures(&initial.wait().await?);

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                info!(
                    state = %engine.state(),
                    connection = %engine.connection_status(),
                    samples = engine.store().keys().iter().map(|k| engine.store().len(k)).sum::<usize>(),
                    "Status"
                );
                let model = engine.compose(tab);
                println!("{}", serde_json::to_string(&model)?);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    engine.stop();
    Ok(())
}

fn log_failures(outcome: &FetchOutcome) {
    for (domain, err) in outcome.failed() {
        warn!(%domain, error = %err, "Domain unavailable");
    }
}
