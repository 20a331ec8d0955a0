pub mod quality;
pub mod stream;

pub use quality::{DEFAULT_QUALITY_SCORE, detect_quality, provider_rank, quality_score};
pub use stream::{Stream, Subtitle};
