//! Snapshot sources: where full per-domain snapshots come from.
//!
//! [`HttpSnapshotSource`] talks to the analytics server; [`MemorySource`]
//! serves canned payloads for tests and offline use.

mod http;
mod memory;

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use routewatch_types::{AnalyticsDomain, Filter, MetricKey, MetricSample};
use serde_json::Value;

pub use http::{HttpSnapshotSource, HttpSnapshotSourceBuilder};
pub use memory::MemorySource;

use crate::EngineError;

/// Provider of full snapshots for one analytics domain at a time.
#[async_trait]
pub trait SnapshotSource: Send + Sync + Debug {
    /// Fetch the current snapshot of `domain` under `filter`.
    async fn fetch(
        &self,
        domain: AnalyticsDomain,
        filter: &Filter,
    ) -> Result<SnapshotPayload, EngineError>;

    /// Short human-readable description (e.g. the base URL).
    fn description(&self) -> &str;
}

/// Decoded body of one domain endpoint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotPayload {
    /// Full histories, one per metric.
    pub series: BTreeMap<MetricKey, Vec<MetricSample>>,
    /// Scalar aggregate counters.
    pub counters: BTreeMap<String, f64>,
}

impl SnapshotPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a series.
    pub fn with_series(mut self, key: impl Into<MetricKey>, samples: Vec<MetricSample>) -> Self {
        self.series.insert(key.into(), samples);
        self
    }

    /// Add a counter.
    pub fn with_counter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.counters.insert(name.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty() && self.counters.is_empty()
    }

    /// Decode a raw response body.
    pub fn from_json(domain: AnalyticsDomain, body: &[u8]) -> Result<Self, EngineError> {
        let value: Value = serde_json::from_slice(body)?;
        Self::from_value(domain, value)
    }

    /// Decode an already-parsed response body.
    ///
    /// Accepted shapes, optionally wrapped in `{"status": .., "data": ..}`:
    /// a bare sample array (stored under the domain's primary key), or an
    /// object whose array members are series and whose numeric members are
    /// counters. Other members are ignored.
    pub fn from_value(domain: AnalyticsDomain, value: Value) -> Result<Self, EngineError> {
        match unwrap_envelope(value) {
            Value::Array(items) => {
                let key = domain.primary_key().ok_or_else(|| {
                    EngineError::Parse(format!("{domain} does not report a sample series"))
                })?;
                let samples = decode_samples(&key, Value::Array(items))?;
                Ok(Self::new().with_series(key, samples))
            }
            Value::Object(members) => {
                let mut payload = Self::new();
                for (name, member) in members {
                    match member {
                        Value::Array(_) => {
                            let key = MetricKey::from(name);
                            let samples = decode_samples(&key, member)?;
                            payload.series.insert(key, samples);
                        }
                        Value::Number(n) => {
                            if let Some(v) = n.as_f64() {
                                payload.counters.insert(name, v);
                            }
                        }
                        _ => {}
                    }
                }
                Ok(payload)
            }
            other => Err(EngineError::Parse(format!(
                "unexpected {domain} payload: {}",
                kind_of(&other)
            ))),
        }
    }
}

fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("status") && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode_samples(key: &MetricKey, value: Value) -> Result<Vec<MetricSample>, EngineError> {
    serde_json::from_value(value)
        .map_err(|e| EngineError::Parse(format!("series {key}: {e}")))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_array_goes_to_primary_key() {
        let body = br#"[{"timestamp": 1, "value": 10.0}, {"timestamp": 2, "value": 12.5}]"#;
        let payload = SnapshotPayload::from_json(AnalyticsDomain::Traffic, body).unwrap();
        assert_eq!(
            payload.series[&MetricKey::Bandwidth],
            vec![MetricSample::new(1, 10.0), MetricSample::new(2, 12.5)]
        );
        assert!(payload.counters.is_empty());
    }

    #[test]
    fn envelope_is_unwrapped() {
        let body = br#"{"status": "success", "data": {"totalRouters": 8, "activeConnections": 31}}"#;
        let payload = SnapshotPayload::from_json(AnalyticsDomain::Routing, body).unwrap();
        assert_eq!(payload.counters["totalRouters"], 8.0);
        assert_eq!(payload.counters["activeConnections"], 31.0);
        assert!(payload.series.is_empty());
    }

    #[test]
    fn mixed_object_splits_series_and_counters() {
        let body = br#"{
            "latency": [{"timestamp": 5, "value": 3.2}],
            "packet_loss": [],
            "averageLatency": 3.2,
            "region": "eu-west"
        }"#;
        let payload = SnapshotPayload::from_json(AnalyticsDomain::Performance, body).unwrap();
        assert_eq!(payload.series.len(), 2);
        assert!(payload.series[&MetricKey::PacketLoss].is_empty());
        assert_eq!(payload.counters.len(), 1);
        assert_eq!(payload.counters["averageLatency"], 3.2);
    }

    #[test]
    fn routing_rejects_bare_array() {
        let err = SnapshotPayload::from_json(AnalyticsDomain::Routing, b"[]").unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
    }

    #[test]
    fn malformed_bodies_are_parse_errors() {
        for body in [&b"not json"[..], b"42", br#"{"latency": [{"value": "x"}]}"#] {
            let err = SnapshotPayload::from_json(AnalyticsDomain::Performance, body).unwrap_err();
            assert!(matches!(err, EngineError::Parse(_)), "{body:?}");
        }
    }
}
