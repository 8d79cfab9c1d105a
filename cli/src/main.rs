//! CLI entrypoint for deliberate
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Result, bail};
use clap::Parser;
use deliberation_application::config::{select_backends, validate_backends};
use deliberation_application::{
    ConfigurationError, ProgressNotifier, RunDeliberationUseCase, ToolExecutorPort,
};
use deliberation_domain::{BackendDescriptor, Participant};
use deliberation_infrastructure::{
    BackendAvailability, BackendFactory, ConfigLoader, FileConfig, LocalToolExecutor,
    env_credential, export_transcript,
};
use deliberation_presentation::{
    Cli, ConsoleFormatter, ConsoleProgressReporter, DeliberationRepl, OutputFormat, ReporterMode,
    SessionRunner,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exit status after Ctrl-C, as shells report SIGINT
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if cli.show_config {
        for line in ConfigLoader::config_sources() {
            println!("{}", line);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())?
    };
    let deliberation = cli.apply_to(file_config.deliberation_config());
    deliberation.validate()?;

    // === Backend selection ===
    let configured = file_config.configured_backends();
    let descriptors: Vec<BackendDescriptor> = configured
        .descriptors
        .into_iter()
        .map(|d| cli.apply_to_backend(d))
        .collect();
    let filter = if cli.models.is_empty() {
        &file_config.deliberation.models
    } else {
        &cli.models
    };
    let selected = select_backends(&descriptors, filter)?;
    validate_backends(&selected)?;

    let availability = BackendAvailability::resolve(&selected, env_credential);
    let status = backend_status(&selected, &availability);

    if cli.status {
        println!("{}", status);
        return Ok(ExitCode::SUCCESS);
    }

    let question = match (&cli.question, cli.interactive) {
        (_, true) => None,
        (Some(q), false) => Some(q.clone()),
        (None, false) => {
            bail!("Provide a question or use --interactive. Run with --help for options.")
        }
    };

    // Report availability the way the session will display everything else
    let mode = match cli.output {
        OutputFormat::Synthesis => ReporterMode::Live,
        OutputFormat::Full | OutputFormat::Json => ReporterMode::Quiet,
    };
    let startup = ConsoleProgressReporter::new(mode);
    for (name, reason) in &configured.rejected {
        startup.on_backend_unavailable(name, reason);
    }
    for (descriptor, reason) in &availability.unavailable {
        startup.on_backend_unavailable(&descriptor.display_name, &reason.to_string());
    }
    for resolved in &availability.ready {
        startup.on_backend_ready(&Participant::new(resolved.id(), resolved.display_name()));
    }
    if availability.ready.is_empty() {
        return Err(ConfigurationError::NoUsableBackends.into());
    }

    // === Dependency Injection ===
    let mut registry = file_config.rate_limit_registry(&selected)?;
    let backends = BackendFactory::new().build_all(availability.ready, &mut registry);
    let tools = tool_executor(&file_config);

    let use_case = RunDeliberationUseCase::new(backends, deliberation)?
        .with_tool_executor(tools)
        .with_registry(Arc::new(registry));
    info!(
        "Deliberating with {} backends, up to {} rounds",
        use_case.participants().len(),
        use_case.config().rounds
    );

    let runner = SessionRunner::new(Arc::new(use_case), cli.output).with_usage(cli.verbose > 0);

    let Some(question) = question else {
        DeliberationRepl::new(runner, status).run().await?;
        return Ok(ExitCode::SUCCESS);
    };

    let outcome = runner.run(&question).await?;

    if let Some(target) = cli.export_target() {
        let path = export_transcript(outcome.session(), target.map(|p| p.as_path()))?;
        println!("Session summary exported to: {}", path.display());
    }

    if outcome.is_interrupted() {
        Ok(ExitCode::from(EXIT_INTERRUPTED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn tool_executor(config: &FileConfig) -> Arc<dyn ToolExecutorPort> {
    let key = env_credential(&config.tools.search_api_key_env);
    let executor =
        LocalToolExecutor::new(key).with_max_results(config.tools.search_max_results);
    if !executor.has_search_key() {
        info!(
            "{} not set; web_search will report an error",
            config.tools.search_api_key_env
        );
    }
    Arc::new(executor)
}

fn backend_status(selected: &[BackendDescriptor], availability: &BackendAvailability) -> String {
    let entries: Vec<(BackendDescriptor, Option<String>)> = selected
        .iter()
        .map(|descriptor| {
            let reason = availability
                .unavailable
                .iter()
                .find(|(d, _)| d.id == descriptor.id)
                .map(|(_, reason)| reason.to_string());
            (descriptor.clone(), reason)
        })
        .collect();
    ConsoleFormatter::format_backend_status(&entries)
}
