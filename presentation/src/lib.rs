//! Presentation layer for deliberate
//!
//! This crate contains CLI definitions, output formatters,
//! the console progress reporter, and the interactive REPL.

pub mod cli;
pub mod interactive;
pub mod output;
pub mod progress;
pub mod runner;

// Re-export commonly used types
pub use cli::commands::{Cli, OutputFormat};
pub use interactive::DeliberationRepl;
pub use output::console::ConsoleFormatter;
pub use progress::reporter::{ConsoleProgressReporter, ReporterMode};
pub use runner::{SessionOutcome, SessionRunner, cancel_on_ctrl_c};
