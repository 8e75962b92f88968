//! Bounded per-metric history buffers and the aggregate snapshot.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use routewatch_types::{AnalyticsDomain, DashboardSnapshot, MetricKey, MetricSample};

/// Ring buffer of samples for one metric.
///
/// Holds at most `capacity` samples; pushing onto a full buffer evicts the
/// oldest one.
///
/// Samples pushed live are also remembered, tagged with the epoch they
/// arrived in, so that a snapshot requested during that epoch can be merged
/// with them instead of erasing them.
#[derive(Debug)]
pub struct MetricSeries {
    samples: VecDeque<MetricSample>,
    capacity: usize,
    live: VecDeque<MetricSample>,
    live_epoch: u64,
}

impl MetricSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            live: VecDeque::new(),
            live_epoch: 0,
        }
    }

    pub fn push(&mut self, sample: MetricSample) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Replace the contents with the newest `capacity` entries of `samples`.
    pub fn replace(&mut self, samples: Vec<MetricSample>) {
        let skip = samples.len().saturating_sub(self.capacity);
        self.samples.clear();
        self.samples.extend(samples.into_iter().skip(skip));
    }

    /// Push a streamed sample received during `epoch`.
    pub fn push_live(&mut self, sample: MetricSample, epoch: u64) {
        if self.capacity == 0 {
            return;
        }
        if self.live_epoch != epoch {
            self.live.clear();
            self.live_epoch = epoch;
        }
        if self.live.len() == self.capacity {
            self.live.pop_front();
        }
        self.live.push_back(sample);
        self.push(sample);
    }

    /// Replace the contents with a snapshot requested during `epoch`.
    ///
    /// Live samples from the same epoch that are newer than the snapshot's
    /// last sample are kept after it.
    pub fn reconcile(&mut self, mut samples: Vec<MetricSample>, epoch: u64) {
        if self.live_epoch == epoch {
            let newest = samples.last().map(|s| s.timestamp);
            samples.extend(
                self.live
                    .iter()
                    .filter(|s| newest.map_or(true, |t| s.timestamp > t))
                    .copied(),
            );
        }
        self.replace(samples);
    }

    pub fn to_vec(&self) -> Vec<MetricSample> {
        self.samples.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<MetricSample> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }
}

#[derive(Debug, Default)]
struct Aggregate {
    counters: BTreeMap<String, f64>,
    generation: u64,
}

/// Owner of every metric buffer and of the per-domain aggregates.
///
/// Each buffer sits behind its own mutex so that stream appends and
/// snapshot resets on different metrics never contend. The map itself is
/// only write-locked when a key is seen for the first time.
#[derive(Debug)]
pub struct TimeSeriesStore {
    capacity: usize,
    epoch: AtomicU64,
    series: RwLock<BTreeMap<MetricKey, Arc<Mutex<MetricSeries>>>>,
    aggregates: RwLock<BTreeMap<AnalyticsDomain, Aggregate>>,
}

impl TimeSeriesStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            epoch: AtomicU64::new(0),
            series: RwLock::new(BTreeMap::new()),
            aggregates: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn get_or_create(&self, key: &MetricKey) -> Arc<Mutex<MetricSeries>> {
        // Fast path: check if it exists
        {
            let series = self.series.read();
            if let Some(buffer) = series.get(key) {
                return buffer.clone();
            }
        }

        // Slow path: create it
        let mut series = self.series.write();
        series
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(MetricSeries::new(self.capacity))))
            .clone()
    }

    fn get(&self, key: &MetricKey) -> Option<Arc<Mutex<MetricSeries>>> {
        self.series.read().get(key).cloned()
    }

    /// Start a new epoch. Appends from now on survive a
    /// [`reconcile`](Self::reconcile) for the same epoch.
    pub fn mark(&self, epoch: u64) {
        self.epoch.store(epoch, Ordering::Release);
    }

    /// Append one sample to the tail of `key`'s buffer.
    pub fn append(&self, key: &MetricKey, sample: MetricSample) {
        let epoch = self.epoch.load(Ordering::Acquire);
        self.get_or_create(key).lock().push_live(sample, epoch);
    }

    /// Replace `key`'s buffer wholesale.
    pub fn reset(&self, key: &MetricKey, samples: Vec<MetricSample>) {
        self.get_or_create(key).lock().replace(samples);
    }

    /// Replace `key`'s buffer with a snapshot requested during `epoch`,
    /// keeping newer samples appended since that epoch was marked.
    pub fn reconcile(&self, key: &MetricKey, samples: Vec<MetricSample>, epoch: u64) {
        self.get_or_create(key).lock().reconcile(samples, epoch);
    }

    /// Copy of `key`'s samples, oldest first. Unknown keys read as empty.
    pub fn read(&self, key: &MetricKey) -> Vec<MetricSample> {
        self.get(key)
            .map(|buffer| buffer.lock().to_vec())
            .unwrap_or_default()
    }

    pub fn latest(&self, key: &MetricKey) -> Option<MetricSample> {
        self.get(key).and_then(|buffer| buffer.lock().latest())
    }

    pub fn len(&self, key: &MetricKey) -> usize {
        self.get(key).map_or(0, |buffer| buffer.lock().len())
    }

    /// Every key that has a buffer, sorted.
    pub fn keys(&self) -> Vec<MetricKey> {
        self.series.read().keys().cloned().collect()
    }

    /// Replace the aggregate counters reported by one domain.
    pub fn replace_aggregate(
        &self,
        domain: AnalyticsDomain,
        counters: BTreeMap<String, f64>,
        generation: u64,
    ) {
        self.aggregates.write().insert(
            domain,
            Aggregate {
                counters,
                generation,
            },
        );
    }

    /// Union of every domain's counters.
    ///
    /// When two domains report the same counter the later domain in
    /// [`AnalyticsDomain::ALL`] order wins.
    pub fn snapshot(&self) -> DashboardSnapshot {
        let aggregates = self.aggregates.read();
        let mut snapshot = DashboardSnapshot::builder();
        let mut generation = 0;

        for aggregate in aggregates.values() {
            generation = generation.max(aggregate.generation);
            snapshot = snapshot.counters(
                aggregate
                    .counters
                    .iter()
                    .map(|(name, value)| (name.clone(), *value)),
            );
        }

        snapshot.generation(generation).build()
    }
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::new(routewatch_types::DEFAULT_CAPACITY)
    }
}
