//! Runs one question end to end on the console: progress, Ctrl-C, result.

use crate::cli::commands::OutputFormat;
use crate::output::console::ConsoleFormatter;
use crate::progress::reporter::{ConsoleProgressReporter, ReporterMode};
use deliberation_application::{RunDeliberationError, RunDeliberationInput, RunDeliberationUseCase};
use deliberation_domain::{Question, Session};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How a console session ended
#[derive(Debug)]
pub enum SessionOutcome {
    Completed(Session),
    /// Ctrl-C; holds the rounds finished before it
    Interrupted(Session),
}

impl SessionOutcome {
    pub fn session(&self) -> &Session {
        match self {
            SessionOutcome::Completed(s) | SessionOutcome::Interrupted(s) => s,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, SessionOutcome::Interrupted(_))
    }
}

/// Cancel `token` on the first Ctrl-C
pub fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl-C received, cancelling deliberation");
            token.cancel();
        }
    })
}

/// Executes deliberations and prints them in the chosen format
pub struct SessionRunner {
    use_case: Arc<RunDeliberationUseCase>,
    output: OutputFormat,
    show_usage: bool,
}

impl SessionRunner {
    pub fn new(use_case: Arc<RunDeliberationUseCase>, output: OutputFormat) -> Self {
        Self {
            use_case,
            output,
            show_usage: false,
        }
    }

    /// Print the rate-limit usage table after each session
    pub fn with_usage(mut self, show_usage: bool) -> Self {
        self.show_usage = show_usage;
        self
    }

    pub fn use_case(&self) -> &RunDeliberationUseCase {
        &self.use_case
    }

    /// Live output for the synthesis format; the other formats print at the end
    fn reporter_mode(&self) -> ReporterMode {
        match self.output {
            OutputFormat::Synthesis => ReporterMode::Live,
            OutputFormat::Full | OutputFormat::Json => ReporterMode::Quiet,
        }
    }

    pub async fn run(&self, question: &str) -> Result<SessionOutcome, RunDeliberationError> {
        let question = Question::new(question)?;
        let reporter = ConsoleProgressReporter::new(self.reporter_mode())
            .with_summary_only(self.use_case.config().summary_only)
            .with_usage(self.show_usage);

        let token = CancellationToken::new();
        let watcher = cancel_on_ctrl_c(token.clone());
        let input = RunDeliberationInput::new(question).with_cancellation(token);
        let result = self.use_case.execute_with_progress(input, &reporter).await;
        watcher.abort();

        match result {
            Ok(session) => {
                if let Some(text) = render(&session, self.output, reporter.printed_synthesis()) {
                    println!("{}", text);
                }
                Ok(SessionOutcome::Completed(session))
            }
            Err(RunDeliberationError::Interrupted { session }) => {
                println!("{}", ConsoleFormatter::format_interrupted(&session));
                Ok(SessionOutcome::Interrupted(*session))
            }
            Err(e) => Err(e),
        }
    }
}

/// Text to print once a session is over; `None` when the live output already showed it
pub fn render(session: &Session, output: OutputFormat, streamed: bool) -> Option<String> {
    match output {
        OutputFormat::Full => Some(ConsoleFormatter::format(session)),
        OutputFormat::Json => Some(ConsoleFormatter::format_json(session)),
        OutputFormat::Synthesis if streamed && session.final_answer.is_some() => None,
        OutputFormat::Synthesis => Some(ConsoleFormatter::format_synthesis_only(session)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(answer: Option<&str>) -> Session {
        let mut session = Session::new("q", vec![]);
        session.final_answer = answer.map(str::to_string);
        session
    }

    #[test]
    fn test_streamed_synthesis_is_not_repeated() {
        assert!(render(&session(Some("a")), OutputFormat::Synthesis, true).is_none());
        assert!(render(&session(Some("a")), OutputFormat::Synthesis, false).is_some());
    }

    #[test]
    fn test_missing_answer_is_reported_even_after_streaming() {
        let text = render(&session(None), OutputFormat::Synthesis, true).unwrap();
        assert!(text.contains("No final consensus"));
    }

    #[test]
    fn test_full_and_json_always_render() {
        assert!(render(&session(Some("a")), OutputFormat::Full, true).is_some());
        let json = render(&session(Some("a")), OutputFormat::Json, true).unwrap();
        assert!(json.contains("\"final_answer\": \"a\""));
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = SessionOutcome::Interrupted(session(None));
        assert!(outcome.is_interrupted());
        assert_eq!(outcome.session().question, "q");
    }
}
