//! Analytics domains served by the snapshot endpoints.

use std::fmt;
use std::str::FromStr;

use crate::{MetricKey, ParseError};

/// One analytics area with its own snapshot endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum AnalyticsDomain {
    Traffic,
    Performance,
    Routing,
    Convergence,
    Shaping,
    Impairment,
}

impl AnalyticsDomain {
    /// Every domain, in fetch order.
    pub const ALL: [AnalyticsDomain; 6] = [
        AnalyticsDomain::Traffic,
        AnalyticsDomain::Performance,
        AnalyticsDomain::Routing,
        AnalyticsDomain::Convergence,
        AnalyticsDomain::Shaping,
        AnalyticsDomain::Impairment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsDomain::Traffic => "traffic",
            AnalyticsDomain::Performance => "performance",
            AnalyticsDomain::Routing => "routing",
            AnalyticsDomain::Convergence => "convergence",
            AnalyticsDomain::Shaping => "shaping",
            AnalyticsDomain::Impairment => "impairment",
        }
    }

    /// Endpoint path relative to the server base URL.
    pub fn path(&self) -> &'static str {
        match self {
            AnalyticsDomain::Traffic => "/api/v1/analytics/traffic",
            AnalyticsDomain::Performance => "/api/v1/analytics/performance",
            AnalyticsDomain::Routing => "/api/v1/analytics/routing",
            AnalyticsDomain::Convergence => "/api/v1/analytics/convergence",
            AnalyticsDomain::Shaping => "/api/v1/analytics/traffic-shaping",
            AnalyticsDomain::Impairment => "/api/v1/analytics/impairments",
        }
    }

    /// Key that a bare sample array returned by this domain belongs to.
    ///
    /// `Routing` only reports aggregate counters and has none.
    pub fn primary_key(&self) -> Option<MetricKey> {
        match self {
            AnalyticsDomain::Traffic => Some(MetricKey::Bandwidth),
            AnalyticsDomain::Performance => Some(MetricKey::Latency),
            AnalyticsDomain::Routing => None,
            AnalyticsDomain::Convergence => Some(MetricKey::BgpConvergence),
            AnalyticsDomain::Shaping => Some(MetricKey::TrafficShapingEffectiveness),
            AnalyticsDomain::Impairment => Some(MetricKey::NetemImpact),
        }
    }
}

impl fmt::Display for AnalyticsDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalyticsDomain {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalyticsDomain::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError::new("analytics domain", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_domain_has_a_distinct_path() {
        let mut paths: Vec<_> = AnalyticsDomain::ALL.iter().map(|d| d.path()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), AnalyticsDomain::ALL.len());
    }

    #[test]
    fn routing_has_no_primary_key() {
        assert!(AnalyticsDomain::Routing.primary_key().is_none());
        assert_eq!(
            AnalyticsDomain::Traffic.primary_key(),
            Some(MetricKey::Bandwidth)
        );
    }

    #[test]
    fn parse_domain_names() {
        assert_eq!(
            "Shaping".parse::<AnalyticsDomain>().unwrap(),
            AnalyticsDomain::Shaping
        );
        assert!("ospf".parse::<AnalyticsDomain>().is_err());
    }
}
