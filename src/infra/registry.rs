use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{
    config::ResolvedConfig,
    provider::{Provider, ProviderError, ResolutionError},
};
use crate::infra::fs::FsProvider;
use crate::infra::s3::S3Provider;

/// Registry of named provider instances; requests are routed to a provider
/// by the name in their path.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from resolved configuration
    pub async fn from_config(config: &ResolvedConfig) -> Result<Self, ProviderError> {
        let mut registry = Self::new();

        for provider_config in &config.providers {
            let provider: Arc<dyn Provider> = match provider_config.kind.as_str() {
                "s3" => Arc::new(S3Provider::from_resolved(provider_config).await?),
                "fs" => {
                    let root = provider_config.root.clone().ok_or_else(|| {
                        ProviderError::new(
                            500,
                            format!("provider '{}' has no root", provider_config.name),
                        )
                    })?;
                    Arc::new(FsProvider::new(root))
                }
                other => {
                    // Config validation rejects this earlier; kept as a guard.
                    return Err(ProviderError::new(
                        500,
                        format!("unsupported provider kind '{}'", other),
                    ));
                }
            };
            registry.register(&provider_config.name, provider);
        }

        Ok(registry)
    }

    pub fn register(&mut self, name: &str, provider: Arc<dyn Provider>) {
        self.providers.insert(name.to_string(), provider);
    }

    /// Resolve a provider by name
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Provider>, ResolutionError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ResolutionError::UnknownProvider(name.to_string()))
    }

    /// Probe connectivity of every configured provider.
    /// This should be called during startup to validate provider access.
    pub async fn check_all(&self) -> Result<(), ProviderError> {
        tracing::info!("Testing connectivity to all configured providers...");

        for (name, provider) in self.providers.iter() {
            tracing::info!("Testing provider: {}", name);
            provider.check().await?;
        }

        tracing::info!("All provider connectivity tests passed");
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.providers.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_unknown_provider() {
        let registry = ProviderRegistry::new();
        match registry.resolve("nope") {
            Err(ResolutionError::UnknownProvider(name)) => assert_eq!(name, "nope"),
            _ => panic!("expected UnknownProvider"),
        }
    }

    #[test]
    fn test_resolve_registered_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register("local", Arc::new(FsProvider::new("/tmp")));
        assert!(registry.resolve("local").is_ok());
        assert_eq!(registry.names().count(), 1);
    }
}
