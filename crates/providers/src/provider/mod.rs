pub mod addon;
pub mod error;
pub mod provider;
pub mod registry;
mod default;

pub use addon::AddonProvider;
pub use default::{DEFAULT_PROVIDER_TIMEOUT, create_client_builder};
pub use error::ProviderError;
pub use provider::{FetchCriteria, InvalidMediaType, MediaType, Provider};
pub use registry::ProviderRegistry;
