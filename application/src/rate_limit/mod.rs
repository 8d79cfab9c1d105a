//! Client-side rate limiting: sliding-window limiters, the retry wrapper
//! and the registry that lets backends share a quota pool.

pub mod limiter;
pub mod registry;
pub mod retry;

pub use limiter::{Admission, RateLimitError, RateLimiter, SAFETY_MARGIN, UsageStats};
pub use registry::RateLimiterRegistry;
pub use retry::retry_with_backoff;
