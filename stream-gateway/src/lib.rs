//! Stream gateway library.
//!
//! Aggregates playable streams for a catalog id from several providers,
//! ranks them by quality and serves them over HTTP, optionally through a
//! same-origin relay. Logins are guarded by a per-client lockout governor.

pub mod aggregator;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod relay;
pub mod resolver;

pub use error::{Error, Result};
