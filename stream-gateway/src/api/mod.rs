//! HTTP API.
//!
//! Routes, request extractors, the session middleware and the server
//! lifecycle.

pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use extract::{ClientIdentity, TrustedProxies};
pub use server::{ApiServer, ApiServerConfig, AppState};
