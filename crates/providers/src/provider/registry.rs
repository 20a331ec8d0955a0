use std::sync::Arc;

use super::error::ProviderError;
use super::provider::Provider;

/// Registry of the providers known to the gateway.
///
/// Registration order is significant: it is the default fan-out order and
/// therefore the tie-break order when ranking streams.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. Names are unique (case-sensitive).
    pub fn register(&mut self, provider: Arc<dyn Provider>) -> Result<(), ProviderError> {
        if self.get(provider.name()).is_some() {
            return Err(ProviderError::DuplicateProvider(
                provider.name().to_string(),
            ));
        }
        self.providers.push(provider);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    pub fn list(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
