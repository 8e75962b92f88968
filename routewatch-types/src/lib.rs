//! # routewatch-types
//!
//! Core types for the router-platform dashboard analytics engine. These are
//! the values that flow between the snapshot endpoints, the push channel,
//! the engine and the presentation code.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: types work without any serialization framework
//! - **Optional serialization**: enable the `serde` feature for the JSON wire format
//! - **Open metric set**: unknown metric keys are carried, not rejected
//!
//! ## Example
//!
//! ```rust
//! use routewatch_types::{Filter, MetricKey, MetricSample, TimeRange};
//!
//! let filter = Filter::new(TimeRange::LastDay, "edge-1");
//! assert_eq!(filter.router.router_id(), Some("edge-1"));
//!
//! let key: MetricKey = "packet_loss".into();
//! assert_eq!(key, MetricKey::PacketLoss);
//!
//! let sample = MetricSample::new(1_700_000_000_000, 0.25);
//! assert_eq!(sample.value, 0.25);
//! ```

mod domain;
mod filter;
mod metric;
mod snapshot;
mod status;

use std::fmt;

pub use domain::*;
pub use filter::*;
pub use metric::*;
pub use snapshot::*;
pub use status::*;

/// Default number of samples kept per metric.
pub const DEFAULT_CAPACITY: usize = 100;

/// A string could not be parsed into one of the enumerated types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    kind: &'static str,
    input: String,
}

impl ParseError {
    pub(crate) fn new(kind: &'static str, input: &str) -> Self {
        Self {
            kind,
            input: input.to_string(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?}", self.kind, self.input)
    }
}

impl std::error::Error for ParseError {}
