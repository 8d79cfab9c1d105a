//! Raw TOML configuration data types
//!
//! These structs mirror the config file. They are deserialized directly and
//! converted into application and domain types by the methods below.

use deliberation_application::config::validate_rate_limit;
use deliberation_application::{ConfigurationError, DeliberationConfig, RateLimiterRegistry};
use deliberation_domain::{
    BackendDescriptor, DomainError, HeuristicConsensusScorer, ProviderFamily, RateLimitConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Root of the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub deliberation: FileDeliberationConfig,
    /// Empty means "use the built-in backends"
    pub backends: Vec<FileBackendConfig>,
    /// Overrides keyed by quota pool or provider name
    pub rate_limits: BTreeMap<String, FileRateLimitConfig>,
    pub tools: FileToolsConfig,
}

/// `[deliberation]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDeliberationConfig {
    pub rounds: usize,
    pub consensus_threshold: f64,
    /// Default sampling temperature for backends that don't set one
    pub temperature: f32,
    /// Default response cap for backends that don't set one
    pub max_tokens: u32,
    pub stream: bool,
    pub summary_only: bool,
    pub use_tools: bool,
    /// Backend identifiers to use; empty means all
    pub models: Vec<String>,
}

impl Default for FileDeliberationConfig {
    fn default() -> Self {
        Self {
            rounds: 3,
            consensus_threshold: HeuristicConsensusScorer::DEFAULT_THRESHOLD,
            temperature: 0.7,
            max_tokens: 2000,
            stream: true,
            summary_only: false,
            use_tools: true,
            models: Vec::new(),
        }
    }
}

impl FileDeliberationConfig {
    pub fn to_deliberation_config(&self) -> DeliberationConfig {
        DeliberationConfig::default()
            .with_rounds(self.rounds)
            .with_threshold(self.consensus_threshold)
            .with_stream(self.stream)
            .with_tools(self.use_tools)
            .with_summary_only(self.summary_only)
    }
}

fn default_enabled() -> bool {
    true
}

/// One `[[backends]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileBackendConfig {
    #[serde(alias = "identifier")]
    pub id: String,
    /// Parsed leniently so one bad entry doesn't reject the whole file
    pub provider: String,
    pub model_name: String,
    pub display_name: Option<String>,
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub timeout_secs: Option<u64>,
    pub rate_limit_key: Option<String>,
    pub base_url: Option<String>,
}

impl FileBackendConfig {
    /// Build the descriptor, filling gaps from `[deliberation]`
    pub fn to_descriptor(
        &self,
        defaults: &FileDeliberationConfig,
    ) -> Result<BackendDescriptor, DomainError> {
        let provider: ProviderFamily = self.provider.parse()?;
        let display_name = self.display_name.clone().unwrap_or_else(|| self.id.clone());

        let mut descriptor =
            BackendDescriptor::new(&self.id, provider, &self.model_name, display_name)
                .with_temperature(self.temperature.unwrap_or(defaults.temperature))
                .with_max_tokens(self.max_tokens.unwrap_or(defaults.max_tokens))
                .with_enabled(self.enabled);
        if let Some(env) = &self.api_key_env {
            descriptor = descriptor.with_api_key_env(env);
        }
        if let Some(timeout) = self.timeout_secs {
            descriptor.timeout_secs = timeout;
        }
        if let Some(key) = &self.rate_limit_key {
            descriptor = descriptor.with_rate_limit_key(key);
        }
        if let Some(url) = &self.base_url {
            descriptor = descriptor.with_base_url(url);
        }
        Ok(descriptor)
    }
}

/// `[rate_limits.<key>]`; unset fields keep the built-in profile's value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRateLimitConfig {
    pub requests_per_minute: Option<u32>,
    pub tokens_per_minute: Option<u64>,
    pub requests_per_day: Option<u32>,
    pub max_retries: Option<u32>,
    pub initial_retry_delay: Option<f64>,
    pub max_retry_delay: Option<f64>,
    pub exponential_base: Option<f64>,
}

impl FileRateLimitConfig {
    pub fn apply(&self, base: RateLimitConfig) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute: self.requests_per_minute.unwrap_or(base.requests_per_minute),
            tokens_per_minute: self.tokens_per_minute.unwrap_or(base.tokens_per_minute),
            requests_per_day: self.requests_per_day.unwrap_or(base.requests_per_day),
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            initial_retry_delay_secs: self
                .initial_retry_delay
                .unwrap_or(base.initial_retry_delay_secs),
            max_retry_delay_secs: self.max_retry_delay.unwrap_or(base.max_retry_delay_secs),
            exponential_base: self.exponential_base.unwrap_or(base.exponential_base),
        }
    }
}

/// `[tools]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileToolsConfig {
    /// Environment variable holding the Tavily key
    pub search_api_key_env: String,
    pub search_max_results: usize,
}

impl Default for FileToolsConfig {
    fn default() -> Self {
        Self {
            search_api_key_env: "TAVILY_API_KEY".to_string(),
            search_max_results: 5,
        }
    }
}

/// Backends described by the config, before credentials are checked
#[derive(Debug, Clone, Default)]
pub struct ConfiguredBackends {
    pub descriptors: Vec<BackendDescriptor>,
    /// `(name, reason)` for entries that could not be understood
    pub rejected: Vec<(String, String)>,
}

impl FileConfig {
    pub fn deliberation_config(&self) -> DeliberationConfig {
        self.deliberation.to_deliberation_config()
    }

    /// Descriptors from `[[backends]]`, or the built-in four when none are listed
    pub fn configured_backends(&self) -> ConfiguredBackends {
        if self.backends.is_empty() {
            let descriptors = BackendDescriptor::defaults()
                .into_iter()
                .map(|d| {
                    d.with_temperature(self.deliberation.temperature)
                        .with_max_tokens(self.deliberation.max_tokens)
                })
                .collect();
            return ConfiguredBackends {
                descriptors,
                rejected: Vec::new(),
            };
        }

        let mut configured = ConfiguredBackends::default();
        for entry in &self.backends {
            match entry.to_descriptor(&self.deliberation) {
                Ok(descriptor) => configured.descriptors.push(descriptor),
                Err(e) => {
                    let name = entry.display_name.clone().unwrap_or_else(|| entry.id.clone());
                    warn!("Skipping backend '{}': {}", entry.id, e);
                    configured.rejected.push((name, e.to_string()));
                }
            }
        }
        configured
    }

    /// Registry with the `[rate_limits]` overrides for `descriptors` applied.
    ///
    /// An override is found by the backend's pool key first, then by its
    /// provider name, and is merged over that backend's built-in profile.
    /// Merged limits that no limiter could honour are rejected.
    pub fn rate_limit_registry(
        &self,
        descriptors: &[BackendDescriptor],
    ) -> Result<RateLimiterRegistry, ConfigurationError> {
        let mut registry = RateLimiterRegistry::new();
        for descriptor in descriptors {
            let key = descriptor.limiter_key();
            let entry = self
                .rate_limits
                .get(&key)
                .or_else(|| self.rate_limits.get(descriptor.provider.as_str()));
            if let Some(entry) = entry {
                let config = entry.apply(RateLimitConfig::for_backend(descriptor));
                validate_rate_limit(&key, &config)?;
                registry = registry.with_override(key, config);
            }
        }
        Ok(registry)
    }
}
