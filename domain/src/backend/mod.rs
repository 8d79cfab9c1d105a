//! Backend descriptors and their quota configuration.

pub mod descriptor;
pub mod rate_limit;

pub use descriptor::{BackendDescriptor, CredentialError, ProviderFamily, ResolvedBackend};
pub use rate_limit::{MAX_RETRY_DELAY, RATE_LIMIT_BACKOFF_FLOOR, RateLimitConfig};
