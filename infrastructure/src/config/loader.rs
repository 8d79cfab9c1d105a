//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR: &str = "deliberate";
const PROJECT_FILES: [&str; 2] = ["deliberate.toml", ".deliberate.toml"];
const ENV_PREFIX: &str = "DELIBERATE_";

/// A config source exists but could not be read or understood
#[derive(Error, Debug)]
#[error("Invalid configuration: {0}")]
pub struct ConfigLoadError(#[from] Box<figment::Error>);

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (lowest to highest):
    /// 1. Default values
    /// 2. Global: `$XDG_CONFIG_HOME/deliberate/config.toml`
    /// 3. Project root: `./deliberate.toml` or `./.deliberate.toml`
    /// 4. Explicit config path (if provided)
    /// 5. `DELIBERATE_*` environment variables, `__` separating sections
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, ConfigLoadError> {
        let mut files = Vec::new();
        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            files.push(global_path);
        }
        if let Some(project_path) = Self::project_config_path() {
            files.push(project_path);
        }
        if let Some(path) = config_path {
            files.push(path.to_path_buf());
        }

        Self::figment(&files)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigLoadError(Box::new(e)))
    }

    /// Merge exactly `files` over the defaults, ignoring the environment
    pub fn load_from_files(files: &[PathBuf]) -> Result<FileConfig, ConfigLoadError> {
        Self::figment(files)
            .extract()
            .map_err(|e| ConfigLoadError(Box::new(e)))
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    fn figment(files: &[PathBuf]) -> Figment {
        files.iter().fold(
            Figment::new().merge(Serialized::defaults(FileConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
    }

    /// Get the global config file path
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Describe the config file locations, highest priority first
    pub fn config_sources() -> Vec<String> {
        let mut lines = vec!["Configuration sources (in priority order):".to_string()];
        match Self::project_config_path() {
            Some(path) => lines.push(format!("  [FOUND] Project: {}", path.display())),
            None => lines.push(format!(
                "  [     ] Project: ./{} or ./{}",
                PROJECT_FILES[0], PROJECT_FILES[1]
            )),
        }
        if let Some(path) = Self::global_config_path() {
            let mark = if path.exists() { "FOUND" } else { "     " };
            lines.push(format!("  [{}] Global:  {}", mark, path.display()));
        }
        lines.push("  [     ] Default: built-in defaults".to_string());
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_toml(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.deliberation.rounds, 3);
        assert!(config.backends.is_empty());
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path().unwrap();
        assert!(path.to_string_lossy().contains("deliberate"));
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_later_files_override_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let global = write_toml(
            &dir,
            "global.toml",
            "[deliberation]\nrounds = 4\nsummary_only = true\n",
        );
        let explicit = write_toml(&dir, "explicit.toml", "[deliberation]\nrounds = 2\n");

        let config = ConfigLoader::load_from_files(&[global, explicit]).unwrap();
        assert_eq!(config.deliberation.rounds, 2);
        assert!(config.deliberation.summary_only);
        assert_eq!(config.deliberation.max_tokens, 2000);
    }

    #[test]
    fn test_backends_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_toml(
            &dir,
            "backends.toml",
            r#"
[[backends]]
id = "gpt"
provider = "openai"
model_name = "gpt-4o-mini"

[tools]
search_max_results = 3
"#,
        );
        let config = ConfigLoader::load_from_files(&[path]).unwrap();
        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.backends[0].model_name, "gpt-4o-mini");
        assert_eq!(config.tools.search_max_results, 3);
        assert_eq!(config.tools.search_api_key_env, "TAVILY_API_KEY");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_toml(&dir, "bad.toml", "[deliberation]\nrounds = \"many\"\n");
        let err = ConfigLoader::load_from_files(&[path]).unwrap_err();
        assert!(err.to_string().starts_with("Invalid configuration"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config =
            ConfigLoader::load_from_files(&[PathBuf::from("/nonexistent/deliberate.toml")])
                .unwrap();
        assert_eq!(config.deliberation.rounds, 3);
    }
}
