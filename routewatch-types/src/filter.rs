//! Dashboard filter: time range and router scope.

use std::fmt;
use std::str::FromStr;

use crate::ParseError;

/// Time window a snapshot covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeRange {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "1h"))]
    LastHour,
    #[cfg_attr(feature = "serde", serde(rename = "6h"))]
    LastSixHours,
    #[cfg_attr(feature = "serde", serde(rename = "24h"))]
    LastDay,
    #[cfg_attr(feature = "serde", serde(rename = "7d"))]
    LastWeek,
    #[cfg_attr(feature = "serde", serde(rename = "30d"))]
    LastMonth,
}

impl TimeRange {
    /// All ranges, shortest first.
    pub const ALL: [TimeRange; 5] = [
        TimeRange::LastHour,
        TimeRange::LastSixHours,
        TimeRange::LastDay,
        TimeRange::LastWeek,
        TimeRange::LastMonth,
    ];

    /// Query-string form (`"1h"`, `"7d"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::LastHour => "1h",
            TimeRange::LastSixHours => "6h",
            TimeRange::LastDay => "24h",
            TimeRange::LastWeek => "7d",
            TimeRange::LastMonth => "30d",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| ParseError::new("time range", s))
    }
}

/// Which routers a dashboard looks at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
pub enum RouterScope {
    /// Every router (`"all"` on the wire).
    #[default]
    All,
    /// A single router by id.
    Router(String),
}

impl RouterScope {
    /// The router id, if the scope is a single router.
    pub fn router_id(&self) -> Option<&str> {
        match self {
            RouterScope::All => None,
            RouterScope::Router(id) => Some(id),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, RouterScope::All)
    }
}

impl fmt::Display for RouterScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterScope::All => f.write_str("all"),
            RouterScope::Router(id) => f.write_str(id),
        }
    }
}

impl From<&str> for RouterScope {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            RouterScope::All
        } else {
            RouterScope::Router(s.to_string())
        }
    }
}

impl From<String> for RouterScope {
    fn from(s: String) -> Self {
        RouterScope::from(s.as_str())
    }
}

impl From<RouterScope> for String {
    fn from(scope: RouterScope) -> Self {
        scope.to_string()
    }
}

/// The active dashboard filter.
///
/// Buffered history is only comparable under one filter; changing it
/// invalidates everything fetched before.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Filter {
    pub time_range: TimeRange,
    #[cfg_attr(feature = "serde", serde(rename = "routerId"))]
    pub router: RouterScope,
}

impl Filter {
    pub fn new(time_range: TimeRange, router: impl Into<RouterScope>) -> Self {
        Self {
            time_range,
            router: router.into(),
        }
    }

    /// Query parameters for snapshot endpoints.
    ///
    /// `routerId` is omitted when the scope is every router.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("timeRange", self.time_range.as_str().to_string())];
        if let Some(id) = self.router.router_id() {
            pairs.push(("routerId", id.to_string()));
        }
        pairs
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.time_range, self.router)
    }
}
