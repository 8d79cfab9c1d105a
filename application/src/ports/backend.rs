//! Text generation backend port
//!
//! Defines the uniform capability every provider adapter implements.

use async_trait::async_trait;
use deliberation_domain::{BackendDescriptor, GenerationFragment, GenerationRequest};
use futures::stream::BoxStream;
use std::time::Duration;
use thiserror::Error;

/// Lazy, finite stream of response fragments for one generation call
pub type FragmentStream = BoxStream<'static, Result<GenerationFragment, BackendError>>;

/// Errors that can occur during a generation call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Missing or rejected credential: {0}")]
    MissingCredential(String),

    #[error("{0}")]
    Provider(String),

    #[error("Daily request limit exceeded, resets in {:.1} hours", .resets_in.as_secs_f64() / 3600.0)]
    DailyLimitExceeded { resets_in: Duration },

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Cancelled")]
    Cancelled,
}

impl BackendError {
    /// Whether this failure signals an exhausted quota.
    ///
    /// Generic provider messages are classified by their wording (rate,
    /// quota, limit, 429, too many requests).
    pub fn is_rate_limit(&self) -> bool {
        match self {
            BackendError::RateLimited(_) => true,
            BackendError::Provider(message) => looks_rate_limited(message),
            _ => false,
        }
    }

    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            BackendError::DailyLimitExceeded { .. }
                | BackendError::MissingCredential(_)
                | BackendError::Cancelled
        )
    }
}

/// Textual rate-limit classification shared by adapters and the retry loop
pub fn looks_rate_limited(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["rate", "quota", "limit", "429", "too many requests"]
        .iter()
        .any(|term| lower.contains(term))
}

/// Port for one remote text generation backend
///
/// Implementations (adapters) live in the infrastructure layer, one per
/// provider family.
#[async_trait]
pub trait TextGenerationBackend: Send + Sync {
    /// Static description of the backend
    fn descriptor(&self) -> &BackendDescriptor;

    /// Start a generation call.
    ///
    /// Errors before the first fragment are returned directly; errors while
    /// streaming arrive as items of the stream.
    async fn generate(&self, request: GenerationRequest) -> Result<FragmentStream, BackendError>;
}
