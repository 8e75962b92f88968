//! DashboardSnapshot - the aggregate counters behind the overview cards.

use std::collections::BTreeMap;

/// Point-in-time aggregate counters (total routers, active connections, ...).
///
/// Unlike a metric series a snapshot is never appended to: each fetch
/// replaces it wholesale. `generation` records which fetch produced it
/// (zero means nothing has been fetched yet).
///
/// # Example
///
/// ```rust
/// use routewatch_types::DashboardSnapshot;
///
/// let snapshot = DashboardSnapshot::builder()
///     .counter("totalRouters", 12.0)
///     .counter("activeConnections", 48.0)
///     .generation(3)
///     .build();
///
/// assert_eq!(snapshot.total_routers(), Some(12.0));
/// assert_eq!(snapshot.generation, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DashboardSnapshot {
    /// Fetch generation that produced these counters.
    pub generation: u64,

    /// Counter values keyed by their wire name.
    pub counters: BTreeMap<String, f64>,
}

impl DashboardSnapshot {
    pub const TOTAL_ROUTERS: &'static str = "totalRouters";
    pub const ACTIVE_CONNECTIONS: &'static str = "activeConnections";
    pub const AVERAGE_LATENCY: &'static str = "averageLatency";

    /// An empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for constructing snapshots.
    pub fn builder() -> DashboardSnapshotBuilder {
        DashboardSnapshotBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Look up a counter by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.counters.get(name).copied()
    }

    /// Counter value, or zero when the server did not report it.
    pub fn get_or_zero(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(0.0)
    }

    pub fn total_routers(&self) -> Option<f64> {
        self.get(Self::TOTAL_ROUTERS)
    }

    pub fn active_connections(&self) -> Option<f64> {
        self.get(Self::ACTIVE_CONNECTIONS)
    }

    pub fn average_latency(&self) -> Option<f64> {
        self.get(Self::AVERAGE_LATENCY)
    }

    /// Iterate over all counters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.counters.iter()
    }
}

/// Builder for constructing `DashboardSnapshot` instances.
#[derive(Debug, Default)]
pub struct DashboardSnapshotBuilder {
    generation: u64,
    counters: BTreeMap<String, f64>,
}

impl DashboardSnapshotBuilder {
    /// Set one counter.
    pub fn counter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.counters.insert(name.into(), value);
        self
    }

    /// Set several counters at once.
    pub fn counters<I, K>(mut self, counters: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        self.counters
            .extend(counters.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// Set the producing generation.
    pub fn generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn build(self) -> DashboardSnapshot {
        DashboardSnapshot {
            generation: self.generation,
            counters: self.counters,
        }
    }
}
