//! Decoding of push-channel frames into store appends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use routewatch_types::{current_timestamp_ms, MetricKey, MetricSample};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::store::TimeSeriesStore;

/// Message type carrying metric samples.
pub const METRICS_UPDATE: &str = "metrics_update";

#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireValue {
    Sample(MetricSample),
    Number(f64),
    Batch(Vec<MetricSample>),
}

/// How a frame was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// A `metrics_update` message.
    MetricsUpdate,
    /// Valid message of another type.
    Ignored(String),
    /// Not a decodable message.
    Malformed(String),
}

/// Result of ingesting one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub frame: FrameKind,
    /// Samples appended to the store.
    pub applied: usize,
    /// Entries of the message that could not be decoded.
    pub skipped: usize,
}

impl IngestReport {
    fn empty(frame: FrameKind) -> Self {
        Self {
            frame,
            applied: 0,
            skipped: 0,
        }
    }
}

/// Running totals since the ingester was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestStats {
    pub frames: u64,
    pub applied: u64,
    pub skipped: u64,
    /// Malformed frames.
    pub dropped: u64,
}

/// Routes `metrics_update` messages into the store.
///
/// Ingestion is synchronous: a frame is fully applied before
/// [`ingest`](Self::ingest) returns, so frames read by one task are applied
/// in receipt order.
#[derive(Debug)]
pub struct StreamIngester {
    store: Arc<TimeSeriesStore>,
    frames: AtomicU64,
    applied: AtomicU64,
    skipped: AtomicU64,
    dropped: AtomicU64,
}

impl StreamIngester {
    pub fn new(store: Arc<TimeSeriesStore>) -> Self {
        Self {
            store,
            frames: AtomicU64::new(0),
            applied: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Decode one raw frame and append its samples.
    ///
    /// Never fails: malformed frames are logged and dropped, malformed
    /// entries are skipped while their well-formed siblings still apply.
    pub fn ingest(&self, frame: &[u8]) -> IngestReport {
        self.frames.fetch_add(1, Ordering::Relaxed);

        let frame: Frame = match serde_json::from_slice(frame) {
            Ok(frame) => frame,
            Err(e) => return self.drop_frame(e.to_string()),
        };

        if frame.kind != METRICS_UPDATE {
            trace!(kind = %frame.kind, "Ignoring push message");
            return IngestReport::empty(FrameKind::Ignored(frame.kind));
        }

        let Value::Object(entries) = frame.data else {
            return self.drop_frame("metrics_update data is not an object".to_string());
        };

        let received_at = current_timestamp_ms();
        let mut report = IngestReport::empty(FrameKind::MetricsUpdate);

        for (name, value) in entries {
            let key = MetricKey::from(name);
            match serde_json::from_value::<WireValue>(value) {
                Ok(WireValue::Sample(sample)) => {
                    self.store.append(&key, sample);
                    report.applied += 1;
                }
                Ok(WireValue::Number(value)) => {
                    self.store.append(&key, MetricSample::new(received_at, value));
                    report.applied += 1;
                }
                Ok(WireValue::Batch(samples)) => {
                    report.applied += samples.len();
                    for sample in samples {
                        self.store.append(&key, sample);
                    }
                }
                Err(e) => {
                    debug!(%key, error = %e, "Skipping malformed sample");
                    report.skipped += 1;
                }
            }
        }

        self.applied
            .fetch_add(report.applied as u64, Ordering::Relaxed);
        self.skipped
            .fetch_add(report.skipped as u64, Ordering::Relaxed);
        report
    }

    fn drop_frame(&self, reason: String) -> IngestReport {
        warn!(%reason, "Dropping malformed push frame");
        self.dropped.fetch_add(1, Ordering::Relaxed);
        IngestReport::empty(FrameKind::Malformed(reason))
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            frames: self.frames.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn store(&self) -> &Arc<TimeSeriesStore> {
        &self.store
    }
}
