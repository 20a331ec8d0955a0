//! Provider boundary for the stream gateway.
//!
//! Holds the stream data model shared by every integration, the quality
//! scorers, the [`provider::Provider`] capability trait with its registry,
//! and the generic addon provider.

pub mod media;
pub mod provider;
