//! Engine configuration.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration. Values are layered: defaults, then an optional
//! file (TOML, YAML or JSON by extension), then `ROUTEWATCH_*` environment
//! variables with `__` between nested keys, e.g.
//! `ROUTEWATCH_FETCH__BASE_URL=http://sim:8080`.

use std::path::Path;
use std::time::Duration;

use routewatch_types::{Filter, RouterScope, TimeRange, DEFAULT_CAPACITY};
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Samples kept per metric.
    pub capacity: usize,
    /// Initial time range of the dashboard filter.
    pub time_range: TimeRange,
    /// Initial router scope of the dashboard filter.
    pub router: RouterScope,
    pub fetch: FetchConfig,
    pub push: PushConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            time_range: TimeRange::default(),
            router: RouterScope::All,
            fetch: FetchConfig::default(),
            push: PushConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("ROUTEWATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.capacity == 0 {
            return Err(EngineError::Config("capacity must be at least 1".into()));
        }
        if self.fetch.request_timeout_ms == 0 {
            return Err(EngineError::Config(
                "fetch.request_timeout_ms must be positive".into(),
            ));
        }
        self.push.reconnect.validate()
    }

    /// The filter the engine starts with.
    pub fn initial_filter(&self) -> Filter {
        Filter::new(self.time_range, self.router.clone())
    }

    /// Set the per-metric capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the initial filter.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.time_range = filter.time_range;
        self.router = filter.router;
        self
    }
}

/// Snapshot endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Base URL of the analytics server.
    pub base_url: String,
    /// Deadline for each domain request.
    pub request_timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Push channel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Push feed: a `ws://` URL, or the `host:port` of a newline-delimited
    /// JSON feed. `None` disables live updates.
    pub address: Option<String>,
    /// Start a fresh snapshot fetch each time the channel reopens.
    pub resync_on_reconnect: bool,
    pub reconnect: ReconnectPolicy,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            address: None,
            resync_on_reconnect: true,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Capped exponential backoff between reconnect attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Consecutive failed attempts before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(64) as i32);
        let millis = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(millis as u64)
    }

    /// Whether another attempt is allowed after `failures` consecutive failures.
    pub fn allows(&self, failures: u32) -> bool {
        self.max_attempts.map_or(true, |max| failures < max)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if !(self.multiplier >= 1.0) {
            return Err(EngineError::Config(
                "push.reconnect.multiplier must be >= 1.0".into(),
            ));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(EngineError::Config(
                "push.reconnect.initial_delay_ms exceeds max_delay_ms".into(),
            ));
        }
        Ok(())
    }
}
