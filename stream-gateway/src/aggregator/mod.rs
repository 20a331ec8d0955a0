//! Stream aggregation: fan-out, filtering and best-stream selection.

pub mod engine;
pub mod filter;
pub mod selector;

pub use engine::{
    AggregateRequest, AggregateResult, AggregationEngine, ProviderCallResult, ProviderTimings,
};
pub use filter::{AGGREGATE_SCOPE, FilterConfig, apply_filters};
pub use selector::{SelectionError, pick_best_stream, rank_streams};
