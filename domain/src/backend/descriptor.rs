//! Backend descriptors and credential resolution.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Family of the remote API a backend speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    OpenAi,
    Anthropic,
    Google,
    Grok,
}

impl ProviderFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderFamily::OpenAi => "openai",
            ProviderFamily::Anthropic => "anthropic",
            ProviderFamily::Google => "google",
            ProviderFamily::Grok => "grok",
        }
    }

    /// Environment variable conventionally holding this family's API key
    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            ProviderFamily::OpenAi => "OPENAI_API_KEY",
            ProviderFamily::Anthropic => "ANTHROPIC_API_KEY",
            ProviderFamily::Google => "GOOGLE_API_KEY",
            ProviderFamily::Grok => "XAI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderFamily {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderFamily::OpenAi),
            "anthropic" => Ok(ProviderFamily::Anthropic),
            "google" | "gemini" => Ok(ProviderFamily::Google),
            "grok" | "xai" => Ok(ProviderFamily::Grok),
            other => Err(DomainError::UnknownProvider(other.to_string())),
        }
    }
}

/// Reason a configured backend cannot take part in a session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("{display_name} is disabled")]
    Disabled { display_name: String },

    #[error("{env_var} is not set")]
    MissingCredential {
        display_name: String,
        env_var: String,
    },
}

/// Static description of one configured backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub id: String,
    pub provider: ProviderFamily,
    pub model_name: String,
    pub display_name: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub enabled: bool,
    pub timeout_secs: u64,
    /// Shared quota pool; backends with the same key share one limiter
    pub rate_limit_key: Option<String>,
    /// Override for the provider's API endpoint
    pub base_url: Option<String>,
}

impl BackendDescriptor {
    pub fn new(
        id: impl Into<String>,
        provider: ProviderFamily,
        model_name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            provider,
            model_name: model_name.into(),
            display_name: display_name.into(),
            api_key_env: provider.default_api_key_env().to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            enabled: true,
            timeout_secs: 60,
            rate_limit_key: None,
            base_url: None,
        }
    }

    pub fn with_api_key_env(mut self, env: impl Into<String>) -> Self {
        self.api_key_env = env.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_rate_limit_key(mut self, key: impl Into<String>) -> Self {
        self.rate_limit_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Key of the quota pool this backend draws from
    pub fn limiter_key(&self) -> String {
        match &self.rate_limit_key {
            Some(key) => key.clone(),
            None => format!("{}:{}", self.provider, self.model_name),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the credential through `lookup` (usually the process environment).
    ///
    /// Blank values count as missing.
    pub fn resolve<F>(&self, lookup: F) -> Result<ResolvedBackend, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !self.enabled {
            return Err(CredentialError::Disabled {
                display_name: self.display_name.clone(),
            });
        }
        match lookup(&self.api_key_env).filter(|v| !v.trim().is_empty()) {
            Some(credential) => Ok(ResolvedBackend {
                descriptor: self.clone(),
                credential,
            }),
            None => Err(CredentialError::MissingCredential {
                display_name: self.display_name.clone(),
                env_var: self.api_key_env.clone(),
            }),
        }
    }

    /// The four backends available out of the box
    pub fn defaults() -> Vec<BackendDescriptor> {
        vec![
            BackendDescriptor::new("gpt", ProviderFamily::OpenAi, "gpt-4o", "GPT-4o"),
            BackendDescriptor::new(
                "claude",
                ProviderFamily::Anthropic,
                "claude-sonnet-4-5",
                "Claude Sonnet 4.5",
            ),
            BackendDescriptor::new(
                "gemini",
                ProviderFamily::Google,
                "gemini-2.5-flash",
                "Gemini 2.5 Flash",
            )
            .with_rate_limit_key("gemini_flash"),
            BackendDescriptor::new("grok", ProviderFamily::Grok, "grok-3", "Grok 3")
                .with_base_url("https://api.x.ai/v1"),
        ]
    }
}

/// A backend that is enabled and has a credential
#[derive(Clone)]
pub struct ResolvedBackend {
    pub descriptor: BackendDescriptor,
    pub credential: String,
}

impl ResolvedBackend {
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn display_name(&self) -> &str {
        &self.descriptor.display_name
    }
}

impl fmt::Debug for ResolvedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedBackend")
            .field("descriptor", &self.descriptor)
            .field("credential", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with(key: &'static str, value: &'static str) -> impl Fn(&str) -> Option<String> {
        move |name| (name == key).then(|| value.to_string())
    }

    #[test]
    fn test_provider_family_parse() {
        assert_eq!("openai".parse::<ProviderFamily>().unwrap(), ProviderFamily::OpenAi);
        assert_eq!("Gemini".parse::<ProviderFamily>().unwrap(), ProviderFamily::Google);
        assert_eq!("xai".parse::<ProviderFamily>().unwrap(), ProviderFamily::Grok);
        assert!(matches!(
            "mistral".parse::<ProviderFamily>(),
            Err(DomainError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_provider_family_serde_lowercase() {
        let json = serde_json::to_string(&ProviderFamily::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
    }

    #[test]
    fn test_limiter_key_defaults_to_provider_and_model() {
        let d = BackendDescriptor::new("gpt", ProviderFamily::OpenAi, "gpt-4o", "GPT-4o");
        assert_eq!(d.limiter_key(), "openai:gpt-4o");

        let shared = d.with_rate_limit_key("openai-team");
        assert_eq!(shared.limiter_key(), "openai-team");
    }

    #[test]
    fn test_resolve_with_credential() {
        let d = BackendDescriptor::new("claude", ProviderFamily::Anthropic, "m", "Claude");
        let resolved = d.resolve(env_with("ANTHROPIC_API_KEY", "sk-test")).unwrap();
        assert_eq!(resolved.credential, "sk-test");
        assert_eq!(resolved.id(), "claude");
    }

    #[test]
    fn test_resolve_missing_or_blank_credential() {
        let d = BackendDescriptor::new("claude", ProviderFamily::Anthropic, "m", "Claude");
        let err = d.resolve(|_| None).unwrap_err();
        assert!(matches!(err, CredentialError::MissingCredential { .. }));

        let err = d.resolve(env_with("ANTHROPIC_API_KEY", "  ")).unwrap_err();
        assert_eq!(err.to_string(), "ANTHROPIC_API_KEY is not set");
    }

    #[test]
    fn test_resolve_disabled() {
        let d = BackendDescriptor::new("grok", ProviderFamily::Grok, "grok-3", "Grok")
            .with_enabled(false);
        let err = d.resolve(env_with("XAI_API_KEY", "k")).unwrap_err();
        assert!(matches!(err, CredentialError::Disabled { .. }));
    }

    #[test]
    fn test_debug_redacts_credential() {
        let d = BackendDescriptor::new("gpt", ProviderFamily::OpenAi, "gpt-4o", "GPT");
        let resolved = d.resolve(env_with("OPENAI_API_KEY", "sk-secret")).unwrap();
        let debug = format!("{:?}", resolved);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_defaults_have_unique_ids() {
        let defaults = BackendDescriptor::defaults();
        let mut ids: Vec<_> = defaults.iter().map(|d| d.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }
}
