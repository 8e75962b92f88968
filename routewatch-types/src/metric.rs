//! Metric keys and samples.

use std::fmt;
use std::str::FromStr;

/// Identifier of one metric history.
///
/// The set is open: the well-known keys have their own variants and any
/// other name received from a server is kept verbatim in [`MetricKey::Other`].
///
/// On the wire a key is its camelCase name (`"packetLoss"`). Parsing also
/// accepts the snake_case spelling (`"packet_loss"`) used by some endpoints.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
pub enum MetricKey {
    Bandwidth,
    Latency,
    PacketLoss,
    Throughput,
    BgpConvergence,
    OspfConvergence,
    IsisConvergence,
    TrafficShapingEffectiveness,
    NetemImpact,
    /// Any key not known to this library.
    Other(String),
}

impl MetricKey {
    /// The well-known keys, in display order.
    pub const KNOWN: [MetricKey; 9] = [
        MetricKey::Bandwidth,
        MetricKey::Latency,
        MetricKey::PacketLoss,
        MetricKey::Throughput,
        MetricKey::BgpConvergence,
        MetricKey::OspfConvergence,
        MetricKey::IsisConvergence,
        MetricKey::TrafficShapingEffectiveness,
        MetricKey::NetemImpact,
    ];

    /// The three routing-protocol convergence keys.
    pub const CONVERGENCE: [MetricKey; 3] = [
        MetricKey::BgpConvergence,
        MetricKey::OspfConvergence,
        MetricKey::IsisConvergence,
    ];

    /// Wire name of the key.
    pub fn as_str(&self) -> &str {
        match self {
            MetricKey::Bandwidth => "bandwidth",
            MetricKey::Latency => "latency",
            MetricKey::PacketLoss => "packetLoss",
            MetricKey::Throughput => "throughput",
            MetricKey::BgpConvergence => "bgpConvergence",
            MetricKey::OspfConvergence => "ospfConvergence",
            MetricKey::IsisConvergence => "isisConvergence",
            MetricKey::TrafficShapingEffectiveness => "trafficShapingEffectiveness",
            MetricKey::NetemImpact => "netemImpact",
            MetricKey::Other(name) => name,
        }
    }

    /// Returns true for keys that are not part of the well-known set.
    pub fn is_other(&self) -> bool {
        matches!(self, MetricKey::Other(_))
    }

    /// Protocol label for convergence keys (`"BGP"`, `"OSPF"`, `"IS-IS"`).
    pub fn protocol_label(&self) -> Option<&'static str> {
        match self {
            MetricKey::BgpConvergence => Some("BGP"),
            MetricKey::OspfConvergence => Some("OSPF"),
            MetricKey::IsisConvergence => Some("IS-IS"),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Self {
        match name {
            "bandwidth" => MetricKey::Bandwidth,
            "latency" => MetricKey::Latency,
            "packetLoss" | "packet_loss" => MetricKey::PacketLoss,
            "throughput" => MetricKey::Throughput,
            "bgpConvergence" | "bgp_convergence" => MetricKey::BgpConvergence,
            "ospfConvergence" | "ospf_convergence" => MetricKey::OspfConvergence,
            "isisConvergence" | "isis_convergence" => MetricKey::IsisConvergence,
            "trafficShapingEffectiveness" | "traffic_shaping_effectiveness" => {
                MetricKey::TrafficShapingEffectiveness
            }
            "netemImpact" | "netem_impact" => MetricKey::NetemImpact,
            other => MetricKey::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for MetricKey {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

impl From<String> for MetricKey {
    fn from(name: String) -> Self {
        match Self::from_name(&name) {
            MetricKey::Other(_) => MetricKey::Other(name),
            known => known,
        }
    }
}

impl From<MetricKey> for String {
    fn from(key: MetricKey) -> Self {
        match key {
            MetricKey::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for MetricKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

/// One observation of a metric.
///
/// `timestamp` is Unix epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricSample {
    pub timestamp: i64,
    pub value: f64,
}

impl MetricSample {
    /// Create a sample.
    pub const fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

impl From<(i64, f64)> for MetricSample {
    fn from((timestamp, value): (i64, f64)) -> Self {
        Self { timestamp, value }
    }
}

/// Current Unix time in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
