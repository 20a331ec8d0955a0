//! Metrics module.
//!
//! Observability counters for the aggregation path: requests, provider
//! calls per provider, provider failures, streams returned and the last
//! engine error. Exposed read-only through `/api/stats`.
//!
//! # Example
//!
//! ```ignore
//! use stream_gateway::metrics::MetricsCollector;
//!
//! let collector = MetricsCollector::new();
//! collector.record_request();
//! collector.record_provider_call("addon");
//! ```

mod collector;

pub use collector::{LastError, MetricsCollector, MetricsSnapshot};
