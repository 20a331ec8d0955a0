use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("upstream responded with status {0}")]
    UpstreamStatus(u16),
    #[error("duplicate provider: {0}")]
    DuplicateProvider(String),
    #[error("other: {0}")]
    Other(String),
}
