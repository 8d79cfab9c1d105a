//! CLI command definitions

use clap::{Parser, ValueEnum};
use deliberation_application::DeliberationConfig;
use deliberation_domain::BackendDescriptor;
use std::path::PathBuf;

/// Output format for the finished session
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Full transcript: every round, consensus analysis and final answer
    Full,
    /// Only the final consensus
    Synthesis,
    /// JSON output
    Json,
}

/// CLI arguments for deliberate
#[derive(Parser, Debug)]
#[command(name = "deliberate")]
#[command(author, version, about = "Multi-model deliberation - several LLMs discuss until they converge")]
#[command(long_about = r#"
deliberate asks several LLM backends the same question and lets them discuss it.

Each round, every backend answers; from round 2 on it also sees what the
others said. When the answers converge the session stops early, and one
backend writes the final consensus.

Configuration files are loaded from (in priority order):
1. DELIBERATE_* environment variables
2. --config <path>             Explicit config file
3. ./deliberate.toml           Project-level config
4. ~/.config/deliberate/config.toml   Global config

API keys are read from the environment (OPENAI_API_KEY, ANTHROPIC_API_KEY,
GOOGLE_API_KEY, XAI_API_KEY, TAVILY_API_KEY by default).

Example:
  deliberate "What are the biggest risks in AI development?"
  deliberate -r 5 -m gpt -m claude "How should we price carbon?"
  deliberate --interactive
"#)]
pub struct Cli {
    /// The question to deliberate on (not required with --interactive or --status)
    pub question: Option<String>,

    /// Maximum number of rounds (1-20)
    #[arg(short, long, value_name = "N")]
    pub rounds: Option<usize>,

    /// Backends to use, by identifier (can be specified multiple times)
    #[arg(short, long = "models", value_name = "ID", num_args = 1..)]
    pub models: Vec<String>,

    /// Sampling temperature for every backend (0.0-2.0)
    #[arg(short, long, value_name = "T")]
    pub temperature: Option<f32>,

    /// Maximum tokens per response
    #[arg(long, value_name = "N")]
    pub max_tokens: Option<u32>,

    /// Verbosity level (-v = info and usage stats, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Show only headers and the final consensus
    #[arg(short, long)]
    pub summary_only: bool,

    /// Wait for complete responses instead of streaming
    #[arg(long)]
    pub no_stream: bool,

    /// Don't offer web search and clock tools to backends
    #[arg(long)]
    pub no_tools: bool,

    /// Convergence score needed to stop early (0.5-1.0)
    #[arg(long, value_name = "X")]
    pub consensus_threshold: Option<f64>,

    /// Ask several questions in a row
    #[arg(short, long)]
    pub interactive: bool,

    /// Show every configured backend and whether it can be used, then exit
    #[arg(long)]
    pub status: bool,

    /// Write a transcript to PATH (default: deliberation_<timestamp>.txt)
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub export: Option<Option<PathBuf>>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "synthesis")]
    pub output: OutputFormat,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

impl Cli {
    /// Apply the flags that override `[deliberation]` settings
    pub fn apply_to(&self, mut config: DeliberationConfig) -> DeliberationConfig {
        if let Some(rounds) = self.rounds {
            config.rounds = rounds;
        }
        if let Some(threshold) = self.consensus_threshold {
            config.consensus_threshold = threshold;
        }
        if self.no_stream {
            config.stream = false;
        }
        if self.no_tools {
            config.use_tools = false;
        }
        if self.summary_only {
            config.summary_only = true;
        }
        config
    }

    /// Apply `--temperature` and `--max-tokens` to one backend
    pub fn apply_to_backend(&self, mut descriptor: BackendDescriptor) -> BackendDescriptor {
        if let Some(temperature) = self.temperature {
            descriptor.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            descriptor.max_tokens = max_tokens;
        }
        descriptor
    }

    /// Where `--export` should write, if it was given
    pub fn export_target(&self) -> Option<Option<&PathBuf>> {
        self.export.as_ref().map(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deliberation_domain::ProviderFamily;

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "deliberate",
            "-r",
            "5",
            "-m",
            "gpt",
            "claude",
            "-t",
            "0.3",
            "--max-tokens",
            "800",
            "-vv",
            "--no-stream",
            "--consensus-threshold",
            "0.9",
            "-o",
            "json",
            "What is consciousness?",
        ])
        .unwrap();

        assert_eq!(cli.question.as_deref(), Some("What is consciousness?"));
        assert_eq!(cli.rounds, Some(5));
        assert_eq!(cli.models, vec!["gpt", "claude"]);
        assert_eq!(cli.temperature, Some(0.3));
        assert_eq!(cli.max_tokens, Some(800));
        assert_eq!(cli.verbose, 2);
        assert!(cli.no_stream);
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["deliberate", "q"]).unwrap();
        assert_eq!(cli.output, OutputFormat::Synthesis);
        assert!(cli.models.is_empty());
        assert!(cli.export_target().is_none());

        let config = cli.apply_to(DeliberationConfig::default());
        assert_eq!(config, DeliberationConfig::default());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "deliberate",
            "--no-tools",
            "-s",
            "-r",
            "2",
            "q",
        ])
        .unwrap();
        let config = cli.apply_to(DeliberationConfig::default().with_rounds(7));
        assert_eq!(config.rounds, 2);
        assert!(!config.use_tools);
        assert!(config.summary_only);
        assert!(config.stream);
    }

    #[test]
    fn test_backend_overrides() {
        let cli =
            Cli::try_parse_from(["deliberate", "-t", "1.2", "--max-tokens", "300", "q"]).unwrap();
        let descriptor = BackendDescriptor::new("gpt", ProviderFamily::OpenAi, "gpt-4o", "GPT");
        let descriptor = cli.apply_to_backend(descriptor);
        assert_eq!(descriptor.temperature, 1.2);
        assert_eq!(descriptor.max_tokens, 300);
    }

    #[test]
    fn test_export_with_and_without_path() {
        let cli = Cli::try_parse_from(["deliberate", "q", "--export"]).unwrap();
        assert_eq!(cli.export_target(), Some(None));

        let cli = Cli::try_parse_from(["deliberate", "--export", "out.txt", "q"]).unwrap();
        assert_eq!(
            cli.export_target(),
            Some(Some(&PathBuf::from("out.txt")))
        );
    }
}
