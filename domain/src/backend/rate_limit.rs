//! Rate-limit ceilings and retry parameters for a quota pool.

use super::descriptor::{BackendDescriptor, ProviderFamily};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff never waits less than this after a rate-limit failure
pub const RATE_LIMIT_BACKOFF_FLOOR: Duration = Duration::from_secs(60);

/// Longest retry delay any configuration may ask for
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(86_400);

/// Seconds as a delay, clamped to `[0, MAX_RETRY_DELAY]`; NaN counts as zero
fn clamp_delay(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs)
        .unwrap_or(MAX_RETRY_DELAY)
        .min(MAX_RETRY_DELAY)
}

/// Ceilings and retry parameters for one quota pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub tokens_per_minute: u64,
    pub requests_per_day: u32,
    /// Total attempts made by the retry wrapper, including the first
    pub max_retries: u32,
    pub initial_retry_delay_secs: f64,
    pub max_retry_delay_secs: f64,
    pub exponential_base: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 50,
            tokens_per_minute: 100_000,
            requests_per_day: 1000,
            max_retries: 3,
            initial_retry_delay_secs: 2.0,
            max_retry_delay_secs: 60.0,
            exponential_base: 2.0,
        }
    }
}

impl RateLimitConfig {
    fn strict(rpm: u32, tpm: u64, rpd: u32, initial: f64, max: f64) -> Self {
        Self {
            requests_per_minute: rpm,
            tokens_per_minute: tpm,
            requests_per_day: rpd,
            max_retries: 5,
            initial_retry_delay_secs: initial,
            max_retry_delay_secs: max,
            ..Self::default()
        }
    }

    /// Built-in profile by name (`openai`, `anthropic`, `google`,
    /// `gemini_pro`, `gemini_flash`, `grok`)
    pub fn profile(name: &str) -> Option<Self> {
        let config = match name {
            "openai" => Self {
                requests_per_minute: 500,
                tokens_per_minute: 200_000,
                requests_per_day: 10_000,
                ..Self::default()
            },
            "anthropic" => Self::default(),
            "google" => Self::strict(2, 32_000, 50, 5.0, 120.0),
            "gemini_pro" => Self::strict(2, 32_000, 50, 60.0, 300.0),
            "gemini_flash" => Self::strict(15, 1_000_000, 1500, 5.0, 120.0),
            "grok" => Self {
                requests_per_minute: 60,
                tokens_per_minute: 150_000,
                requests_per_day: 1500,
                ..Self::default()
            },
            _ => return None,
        };
        Some(config)
    }

    /// Default profile for a backend that has no explicit override.
    ///
    /// A `rate_limit_key` naming a built-in profile wins; Gemini models are
    /// matched to their tier by model name.
    pub fn for_backend(descriptor: &BackendDescriptor) -> Self {
        if let Some(config) = descriptor
            .rate_limit_key
            .as_deref()
            .and_then(Self::profile)
        {
            return config;
        }
        let name = match descriptor.provider {
            ProviderFamily::Google if descriptor.model_name.contains("flash") => "gemini_flash",
            ProviderFamily::Google if descriptor.model_name.contains("pro") => "gemini_pro",
            family => family.as_str(),
        };
        Self::profile(name).unwrap_or_default()
    }

    /// Requests kept in reserve below the RPM ceiling.
    ///
    /// Low ceilings get no reserve, otherwise they would starve.
    pub fn rpm_buffer(&self) -> u32 {
        if self.requests_per_minute > 10 { 2 } else { 0 }
    }

    /// Minimum gap between consecutive requests for low-RPM pools
    pub fn min_spacing(&self) -> Option<Duration> {
        if self.requests_per_minute == 0 || self.requests_per_minute > 15 {
            return None;
        }
        Some(Duration::from_secs_f64(
            60.0 / f64::from(self.requests_per_minute),
        ))
    }

    /// Token usage above which callers wait for the window to drain
    pub fn token_ceiling(&self) -> f64 {
        self.tokens_per_minute as f64 * 0.9
    }

    /// First problem with the retry parameters, if any
    pub fn retry_problem(&self) -> Option<String> {
        let delays = [
            ("initial_retry_delay", self.initial_retry_delay_secs),
            ("max_retry_delay", self.max_retry_delay_secs),
        ];
        for (name, secs) in delays {
            if !secs.is_finite() || secs < 0.0 {
                return Some(format!("{name} must be a non-negative number, got {secs}"));
            }
            if secs > MAX_RETRY_DELAY.as_secs_f64() {
                return Some(format!(
                    "{name} must be at most {} seconds, got {secs}",
                    MAX_RETRY_DELAY.as_secs()
                ));
            }
        }
        if !self.exponential_base.is_finite() || self.exponential_base < 1.0 {
            return Some(format!(
                "exponential_base must be at least 1.0, got {}",
                self.exponential_base
            ));
        }
        None
    }

    /// Delay before retrying after a rate-limit failure on `attempt` (0-based)
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        let scaled = self.initial_retry_delay_secs * self.exponential_base.powi(attempt as i32) * 2.0;
        clamp_delay(scaled.min(self.max_retry_delay_secs)).max(RATE_LIMIT_BACKOFF_FLOOR)
    }

    /// Delay before retrying after any other failure on `attempt` (0-based)
    pub fn error_delay(&self, attempt: u32) -> Duration {
        let scaled = self.initial_retry_delay_secs * self.exponential_base.powi(attempt as i32);
        clamp_delay(scaled.min(self.max_retry_delay_secs / 2.0))
    }
}
