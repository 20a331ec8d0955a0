//! Application-wide error types.

use stream_providers::provider::{InvalidMediaType, ProviderError};
use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid media type: {0}")]
    InvalidMediaType(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Provider disabled: {0}")]
    ProviderDisabled(String),

    #[error("Identifier resolution failed: {0}")]
    Resolver(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn resolver(msg: impl Into<String>) -> Self {
        Self::Resolver(msg.into())
    }
}

impl From<InvalidMediaType> for Error {
    fn from(err: InvalidMediaType) -> Self {
        Self::InvalidMediaType(err.0)
    }
}
