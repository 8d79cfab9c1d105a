//! Provider adapters implementing [`TextGenerationBackend`](deliberation_application::TextGenerationBackend)

pub mod anthropic;
pub mod factory;
pub mod google;
pub mod http;
pub mod openai;
pub mod sse;

pub use anthropic::AnthropicBackend;
pub use factory::{BackendAvailability, BackendFactory, env_credential};
pub use google::GoogleBackend;
pub use openai::OpenAiCompatibleBackend;
