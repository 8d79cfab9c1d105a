//! Infrastructure layer for deliberate
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: HTTP provider backends, the local tool
//! executor, configuration file loading and transcript export.

pub mod config;
pub mod export;
pub mod providers;
pub mod tools;

// Re-export commonly used types
pub use config::{
    ConfigLoadError, ConfigLoader, ConfiguredBackends, FileBackendConfig, FileConfig,
    FileDeliberationConfig, FileRateLimitConfig, FileToolsConfig,
};
pub use export::{default_export_path, export_transcript, render_transcript};
pub use providers::{
    AnthropicBackend, BackendAvailability, BackendFactory, GoogleBackend,
    OpenAiCompatibleBackend, env_credential,
};
pub use tools::LocalToolExecutor;
