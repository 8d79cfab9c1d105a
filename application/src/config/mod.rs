//! Application-level configuration.
//!
//! [`DeliberationConfig`] controls the round loop; [`ConfigurationError`]
//! reports settings that make a session impossible before any round runs.

use deliberation_domain::{BackendDescriptor, HeuristicConsensusScorer, RateLimitConfig};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;

/// Allowed round cap
pub const ROUNDS_RANGE: RangeInclusive<usize> = 1..=20;
/// Allowed consensus threshold
pub const THRESHOLD_RANGE: RangeInclusive<f64> = 0.5..=1.0;
/// Allowed sampling temperature
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=2.0;

/// Fatal configuration problems
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("No usable backends: configure at least one enabled backend with its API key set")]
    NoUsableBackends,

    #[error("Rounds must be between 1 and 20, got {0}")]
    InvalidRounds(usize),

    #[error("Consensus threshold must be between 0.5 and 1.0, got {0}")]
    InvalidThreshold(f64),

    #[error("Temperature for {backend} must be between 0.0 and 2.0, got {value}")]
    InvalidTemperature { backend: String, value: f32 },

    #[error("max_tokens for {backend} must be greater than zero")]
    InvalidMaxTokens { backend: String },

    #[error("Unknown backend '{0}'")]
    UnknownBackend(String),

    #[error("Backend '{0}' is configured more than once")]
    DuplicateBackend(String),

    #[error("Rate limits for '{key}': {reason}")]
    InvalidRateLimit { key: String, reason: String },
}

/// Settings that shape one deliberation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliberationConfig {
    /// Round cap; the loop may stop earlier on consensus
    pub rounds: usize,
    pub consensus_threshold: f64,
    /// Request streamed output from backends
    pub stream: bool,
    /// Offer tools to backends when an executor is available
    pub use_tools: bool,
    /// Suppress per-backend output, keeping headers and the final answer
    pub summary_only: bool,
}

impl Default for DeliberationConfig {
    fn default() -> Self {
        Self {
            rounds: 3,
            consensus_threshold: HeuristicConsensusScorer::DEFAULT_THRESHOLD,
            stream: true,
            use_tools: true,
            summary_only: false,
        }
    }
}

impl DeliberationConfig {
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.consensus_threshold = threshold;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_tools(mut self, use_tools: bool) -> Self {
        self.use_tools = use_tools;
        self
    }

    pub fn with_summary_only(mut self, summary_only: bool) -> Self {
        self.summary_only = summary_only;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !ROUNDS_RANGE.contains(&self.rounds) {
            return Err(ConfigurationError::InvalidRounds(self.rounds));
        }
        if !THRESHOLD_RANGE.contains(&self.consensus_threshold) {
            return Err(ConfigurationError::InvalidThreshold(
                self.consensus_threshold,
            ));
        }
        Ok(())
    }
}

/// Check a backend's sampling parameters
pub fn validate_backend(descriptor: &BackendDescriptor) -> Result<(), ConfigurationError> {
    if !TEMPERATURE_RANGE.contains(&descriptor.temperature) {
        return Err(ConfigurationError::InvalidTemperature {
            backend: descriptor.id.clone(),
            value: descriptor.temperature,
        });
    }
    if descriptor.max_tokens == 0 {
        return Err(ConfigurationError::InvalidMaxTokens {
            backend: descriptor.id.clone(),
        });
    }
    Ok(())
}

/// Check the limits configured for quota pool `key`
pub fn validate_rate_limit(key: &str, config: &RateLimitConfig) -> Result<(), ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidRateLimit {
        key: key.to_string(),
        reason,
    };
    if config.requests_per_minute == 0 || config.tokens_per_minute == 0 {
        return Err(invalid("per-minute ceilings must be greater than zero".to_string()));
    }
    if config.requests_per_day == 0 {
        return Err(invalid("requests_per_day must be greater than zero".to_string()));
    }
    match config.retry_problem() {
        Some(reason) => Err(invalid(reason)),
        None => Ok(()),
    }
}

/// Check a whole backend list: parameters valid and identifiers unique
pub fn validate_backends(descriptors: &[BackendDescriptor]) -> Result<(), ConfigurationError> {
    for (i, descriptor) in descriptors.iter().enumerate() {
        validate_backend(descriptor)?;
        if descriptors[..i].iter().any(|d| d.id == descriptor.id) {
            return Err(ConfigurationError::DuplicateBackend(descriptor.id.clone()));
        }
    }
    Ok(())
}

/// Restrict `descriptors` to the identifiers in `filter`, keeping filter order.
///
/// An empty filter keeps everything.
pub fn select_backends(
    descriptors: &[BackendDescriptor],
    filter: &[String],
) -> Result<Vec<BackendDescriptor>, ConfigurationError> {
    if filter.is_empty() {
        return Ok(descriptors.to_vec());
    }
    filter
        .iter()
        .map(|id| {
            descriptors
                .iter()
                .find(|d| &d.id == id)
                .cloned()
                .ok_or_else(|| ConfigurationError::UnknownBackend(id.clone()))
        })
        .collect()
}
