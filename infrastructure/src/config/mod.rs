//! Configuration file loading for deliberate
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `DELIBERATE_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./deliberate.toml` or `./.deliberate.toml`
//! 4. Global: `$XDG_CONFIG_HOME/deliberate/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfiguredBackends, FileBackendConfig, FileConfig, FileDeliberationConfig,
    FileRateLimitConfig, FileToolsConfig,
};
pub use loader::{ConfigLoadError, ConfigLoader};
