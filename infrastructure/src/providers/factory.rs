//! Backend construction: credential resolution and provider selection.

use super::anthropic::AnthropicBackend;
use super::google::GoogleBackend;
use super::openai::OpenAiCompatibleBackend;
use deliberation_application::{RateLimitedBackend, RateLimiterRegistry, TextGenerationBackend};
use deliberation_domain::{BackendDescriptor, CredentialError, ProviderFamily, ResolvedBackend};
use reqwest::Client;
use std::sync::Arc;
use tracing::{info, warn};

/// Look a credential up in the process environment
pub fn env_credential(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Outcome of resolving every configured backend
#[derive(Debug, Default)]
pub struct BackendAvailability {
    pub ready: Vec<ResolvedBackend>,
    pub unavailable: Vec<(BackendDescriptor, CredentialError)>,
}

impl BackendAvailability {
    /// Split `descriptors` into usable backends and the reasons the others are not
    pub fn resolve<F>(descriptors: &[BackendDescriptor], lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut availability = Self::default();
        for descriptor in descriptors {
            match descriptor.resolve(&lookup) {
                Ok(resolved) => availability.ready.push(resolved),
                Err(reason) => {
                    warn!("Backend {} unavailable: {}", descriptor.id, reason);
                    availability.unavailable.push((descriptor.clone(), reason));
                }
            }
        }
        availability
    }
}

/// Creates provider adapters, sharing one HTTP client
#[derive(Debug, Clone, Default)]
pub struct BackendFactory {
    client: Client,
}

impl BackendFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, resolved: ResolvedBackend) -> Arc<dyn TextGenerationBackend> {
        let client = self.client.clone();
        match resolved.descriptor.provider {
            ProviderFamily::OpenAi | ProviderFamily::Grok => {
                Arc::new(OpenAiCompatibleBackend::new(client, resolved))
            }
            ProviderFamily::Anthropic => Arc::new(AnthropicBackend::new(client, resolved)),
            ProviderFamily::Google => Arc::new(GoogleBackend::new(client, resolved)),
        }
    }

    /// Wrap every ready backend with the limiter of its quota pool
    pub fn build_all(
        &self,
        ready: Vec<ResolvedBackend>,
        registry: &mut RateLimiterRegistry,
    ) -> Vec<Arc<RateLimitedBackend>> {
        ready
            .into_iter()
            .map(|resolved| {
                let limiter = registry.limiter_for(&resolved.descriptor);
                info!(
                    "Initialized {} ({} {})",
                    resolved.display_name(),
                    resolved.descriptor.provider,
                    resolved.descriptor.model_name
                );
                Arc::new(RateLimitedBackend::new(self.create(resolved), limiter))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(key: &'static str) -> impl Fn(&str) -> Option<String> {
        move |name| (name == key).then(|| "secret".to_string())
    }

    #[test]
    fn test_availability_splits_by_credential() {
        let availability =
            BackendAvailability::resolve(&BackendDescriptor::defaults(), only("ANTHROPIC_API_KEY"));
        let ready: Vec<_> = availability.ready.iter().map(|r| r.id()).collect();
        assert_eq!(ready, vec!["claude"]);
        assert_eq!(availability.unavailable.len(), 3);
        assert_eq!(
            availability.unavailable[0].1.to_string(),
            "OPENAI_API_KEY is not set"
        );
    }

    #[test]
    fn test_factory_selects_by_provider() {
        let factory = BackendFactory::new();
        for descriptor in BackendDescriptor::defaults() {
            let resolved = descriptor.resolve(|_| Some("k".to_string())).unwrap();
            let backend = factory.create(resolved);
            assert_eq!(backend.descriptor().id, descriptor.id);
        }
    }

    #[test]
    fn test_build_all_shares_pooled_limiters() {
        let pro = BackendDescriptor::new("pro", ProviderFamily::Google, "gemini-2.5-pro", "Pro")
            .with_rate_limit_key("google-account");
        let flash =
            BackendDescriptor::new("flash", ProviderFamily::Google, "gemini-2.5-flash", "Flash")
                .with_rate_limit_key("google-account");
        let availability = BackendAvailability::resolve(&[pro, flash], |_| Some("k".to_string()));

        let mut registry = RateLimiterRegistry::new();
        let backends = BackendFactory::new().build_all(availability.ready, &mut registry);
        assert_eq!(backends.len(), 2);
        assert!(Arc::ptr_eq(backends[0].limiter(), backends[1].limiter()));
    }
}
