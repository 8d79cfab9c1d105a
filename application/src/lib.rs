//! Application layer for deliberate
//!
//! This crate contains use cases, port definitions, rate limiting and
//! application configuration. It depends only on the domain layer.

pub mod config;
pub mod gateway;
pub mod ports;
pub mod rate_limit;
pub mod use_cases;

// Re-export commonly used types
pub use config::{ConfigurationError, DeliberationConfig};
pub use gateway::{GenerationOutput, GenerationSink, NoSink, RateLimitedBackend};
pub use ports::{
    backend::{BackendError, FragmentStream, TextGenerationBackend},
    progress::{NoProgress, NoticeCategory, ProgressNotifier},
    tool_executor::ToolExecutorPort,
};
pub use rate_limit::{Admission, RateLimitError, RateLimiter, RateLimiterRegistry, UsageStats};
pub use use_cases::run_deliberation::{
    RunDeliberationError, RunDeliberationInput, RunDeliberationUseCase,
};
