//! Registry of limiters keyed by quota pool.

use super::limiter::{RateLimiter, UsageStats};
use deliberation_domain::{BackendDescriptor, RateLimitConfig};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Owns one [`RateLimiter`] per quota pool.
///
/// Backends whose [`BackendDescriptor::limiter_key`] match share a limiter,
/// so a burst on one is visible to the other. Built once at startup and
/// passed to every backend wrapper.
#[derive(Debug, Default)]
pub struct RateLimiterRegistry {
    overrides: HashMap<String, RateLimitConfig>,
    limiters: BTreeMap<String, Arc<RateLimiter>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` for the pool named `key` instead of the built-in profile
    pub fn with_override(mut self, key: impl Into<String>, config: RateLimitConfig) -> Self {
        self.overrides.insert(key.into(), config);
        self
    }

    /// Limiter for `descriptor`'s pool, created on first use
    pub fn limiter_for(&mut self, descriptor: &BackendDescriptor) -> Arc<RateLimiter> {
        let key = descriptor.limiter_key();
        if let Some(existing) = self.limiters.get(&key) {
            return Arc::clone(existing);
        }

        let config = self
            .overrides
            .get(&key)
            .cloned()
            .unwrap_or_else(|| RateLimitConfig::for_backend(descriptor));
        debug!(
            "Creating rate limiter '{}' ({} rpm, {} tpm, {} rpd)",
            key, config.requests_per_minute, config.tokens_per_minute, config.requests_per_day
        );
        let limiter = Arc::new(RateLimiter::new(config));
        self.limiters.insert(key, Arc::clone(&limiter));
        limiter
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.limiters.keys().map(String::as_str)
    }

    /// Usage of every pool, sorted by key
    pub async fn all_stats(&self) -> Vec<(String, UsageStats)> {
        let mut stats = Vec::with_capacity(self.limiters.len());
        for (key, limiter) in &self.limiters {
            stats.push((key.clone(), limiter.usage_stats().await));
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deliberation_domain::ProviderFamily;

    #[test]
    fn test_shared_key_shares_limiter() {
        let mut registry = RateLimiterRegistry::new();
        let a = BackendDescriptor::new("pro", ProviderFamily::Google, "gemini-2.5-pro", "Pro")
            .with_rate_limit_key("google-account");
        let b = BackendDescriptor::new("flash", ProviderFamily::Google, "gemini-2.5-flash", "Flash")
            .with_rate_limit_key("google-account");
        let c = BackendDescriptor::new("gpt", ProviderFamily::OpenAi, "gpt-4o", "GPT");

        let la = registry.limiter_for(&a);
        let lb = registry.limiter_for(&b);
        let lc = registry.limiter_for(&c);
        assert!(Arc::ptr_eq(&la, &lb));
        assert!(!Arc::ptr_eq(&la, &lc));
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["google-account", "openai:gpt-4o"]);
    }

    #[test]
    fn test_override_applies_to_pool() {
        let strict = RateLimitConfig {
            requests_per_minute: 1,
            ..RateLimitConfig::default()
        };
        let mut registry = RateLimiterRegistry::new().with_override("openai:gpt-4o", strict);
        let d = BackendDescriptor::new("gpt", ProviderFamily::OpenAi, "gpt-4o", "GPT");
        assert_eq!(registry.limiter_for(&d).config().requests_per_minute, 1);
    }

    #[test]
    fn test_default_profile_by_provider() {
        let mut registry = RateLimiterRegistry::new();
        let d = BackendDescriptor::new("gpt", ProviderFamily::OpenAi, "gpt-4o", "GPT");
        assert_eq!(registry.limiter_for(&d).config().requests_per_minute, 500);
    }

    #[tokio::test]
    async fn test_all_stats_sorted_by_key() {
        let mut registry = RateLimiterRegistry::new();
        let z = BackendDescriptor::new("z", ProviderFamily::Grok, "grok-3", "Z");
        let a = BackendDescriptor::new("a", ProviderFamily::Anthropic, "claude", "A");
        registry.limiter_for(&z).record(40).await;
        registry.limiter_for(&a);

        let stats = registry.all_stats().await;
        let keys: Vec<_> = stats.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["anthropic:claude", "grok:grok-3"]);
        assert_eq!(stats[1].1.tpm, 40);
    }
}
