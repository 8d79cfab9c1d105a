//! Progress reporting for deliberation sessions

use crate::output::console::ConsoleFormatter;
use colored::Colorize;
use deliberation_application::{NoticeCategory, ProgressNotifier, UsageStats};
use deliberation_domain::{ConsensusMetrics, ModelResponse, Participant, Session, ToolInvocation};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const WIDTH: usize = 80;

/// How much the reporter prints while a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterMode {
    /// Print every response, the consensus analysis and the final answer as they arrive
    Live,
    /// Only a spinner and warnings; the caller prints the result afterwards
    Quiet,
}

#[derive(Default)]
struct ReporterState {
    spinner: Option<ProgressBar>,
    round: usize,
    /// Backends still answering, with characters streamed so far
    pending: BTreeMap<String, (String, usize)>,
    in_synthesis: bool,
    synthesis_chars: usize,
}

/// Reports progress on the console with a spinner per round
pub struct ConsoleProgressReporter {
    mode: ReporterMode,
    summary_only: bool,
    show_usage: bool,
    state: Mutex<ReporterState>,
    synthesis_printed: AtomicBool,
}

impl ConsoleProgressReporter {
    pub fn new(mode: ReporterMode) -> Self {
        Self {
            mode,
            summary_only: false,
            show_usage: false,
            state: Mutex::new(ReporterState::default()),
            synthesis_printed: AtomicBool::new(false),
        }
    }

    /// Keep headers and the final answer, hide per-backend output
    pub fn with_summary_only(mut self, summary_only: bool) -> Self {
        self.summary_only = summary_only;
        self
    }

    /// Print the rate-limit usage table at the end of the session
    pub fn with_usage(mut self, show_usage: bool) -> Self {
        self.show_usage = show_usage;
        self
    }

    /// Whether the final answer was already printed while streaming
    pub fn printed_synthesis(&self) -> bool {
        self.synthesis_printed.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(&self) -> bool {
        self.mode == ReporterMode::Live
    }

    fn detailed(&self) -> bool {
        self.live() && !self.summary_only
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    /// Print a line on stdout without tearing the spinner
    fn print(&self, text: impl AsRef<str>) {
        let state = self.state();
        match &state.spinner {
            Some(spinner) => spinner.suspend(|| println!("{}", text.as_ref())),
            None => println!("{}", text.as_ref()),
        }
    }

    fn eprint(&self, text: impl AsRef<str>) {
        let state = self.state();
        match &state.spinner {
            Some(spinner) => spinner.suspend(|| eprintln!("{}", text.as_ref())),
            None => eprintln!("{}", text.as_ref()),
        }
    }

    fn start_spinner(&self, prefix: String, message: String) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(Self::spinner_style());
        spinner.set_prefix(prefix);
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        if let Some(old) = self.state().spinner.replace(spinner) {
            old.finish_and_clear();
        }
    }

    fn clear_spinner(&self) {
        if let Some(spinner) = self.state().spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn refresh_spinner(state: &ReporterState) {
        if let Some(spinner) = &state.spinner {
            spinner.set_message(pending_message(&state.pending));
        }
    }

    fn end_synthesis(&self) {
        let mut state = self.state();
        if state.in_synthesis && state.synthesis_chars > 0 && self.live() {
            println!();
        }
        state.in_synthesis = false;
    }
}

impl Default for ConsoleProgressReporter {
    fn default() -> Self {
        Self::new(ReporterMode::Live)
    }
}

/// Spinner text: each pending backend with the characters received so far
fn pending_message(pending: &BTreeMap<String, (String, usize)>) -> String {
    if pending.is_empty() {
        return "finishing...".to_string();
    }
    let parts: Vec<String> = pending
        .values()
        .map(|(name, chars)| {
            if *chars == 0 {
                format!("{} (waiting)", name)
            } else {
                format!("{} ({} chars)", name, chars)
            }
        })
        .collect();
    parts.join(", ")
}

fn styled_notice(category: NoticeCategory, message: &str) -> String {
    match category {
        NoticeCategory::Info => message.to_string(),
        NoticeCategory::Warning => message.yellow().to_string(),
        NoticeCategory::Error => message.red().to_string(),
        NoticeCategory::Success => message.green().bold().to_string(),
        NoticeCategory::Header => message.cyan().bold().to_string(),
    }
}

impl ProgressNotifier for ConsoleProgressReporter {
    fn on_notice(&self, category: NoticeCategory, message: &str) {
        match category {
            NoticeCategory::Warning | NoticeCategory::Error => {
                self.eprint(styled_notice(category, message))
            }
            _ if self.live() => self.print(styled_notice(category, message)),
            _ => {}
        }
    }

    fn on_session_start(&self, question: &str, participants: &[Participant], max_rounds: usize) {
        self.synthesis_printed.store(false, Ordering::SeqCst);
        if !self.live() {
            return;
        }
        let line = "=".repeat(WIDTH);
        let names: Vec<&str> = participants.iter().map(|p| p.display_name.as_str()).collect();
        self.print(format!(
            "\n{}\n{}\n{}\n\n{} {}\n{} {}\n{} {}",
            line.cyan(),
            "MULTI-MODEL DELIBERATION SESSION".bold(),
            line.cyan(),
            "Question:".cyan().bold(),
            question,
            "Models:".cyan().bold(),
            names.join(", "),
            "Rounds:".cyan().bold(),
            max_rounds
        ));
    }

    fn on_round_start(&self, round: usize, max_rounds: usize) {
        if self.live() {
            let line = "─".repeat(WIDTH);
            self.print(format!("\n{}\n{}\n{}", line, format!("ROUND {}", round).bold(), line));
        }
        {
            let mut state = self.state();
            state.round = round;
            state.pending.clear();
        }
        self.start_spinner(format!("Round {}/{}", round, max_rounds), "starting...".into());
    }

    fn on_turn_start(&self, participant: &Participant, _round: usize) {
        let mut state = self.state();
        state
            .pending
            .insert(participant.id.clone(), (participant.display_name.clone(), 0));
        Self::refresh_spinner(&state);
    }

    fn on_turn_chunk(&self, participant: &Participant, chunk: &str) {
        let mut state = self.state();
        if let Some((_, chars)) = state.pending.get_mut(&participant.id) {
            *chars += chunk.chars().count();
        }
        Self::refresh_spinner(&state);
    }

    fn on_turn_restart(&self, participant: &Participant) {
        let mut state = self.state();
        if state.in_synthesis {
            if state.synthesis_chars > 0 && self.live() {
                println!("\n{}", "(retrying...)".yellow());
            }
            state.synthesis_chars = 0;
            return;
        }
        if let Some((_, chars)) = state.pending.get_mut(&participant.id) {
            *chars = 0;
        }
        Self::refresh_spinner(&state);
    }

    fn on_turn_complete(&self, response: &ModelResponse) {
        let done = {
            let mut state = self.state();
            state.pending.remove(&response.backend_id);
            Self::refresh_spinner(&state);
            state.pending.is_empty()
        };

        match &response.error {
            Some(error) => self.eprint(format!(
                "{} {}",
                format!("[{}]", response.display_name).red().bold(),
                format!("Error: {}", error).red()
            )),
            None if self.detailed() => self.print(format!(
                "\n{}\n{}",
                format!("[{}]", response.display_name).yellow().bold(),
                response.content
            )),
            None => {}
        }

        if done {
            self.clear_spinner();
        }
    }

    fn on_tool_call(&self, participant: &Participant, invocation: &ToolInvocation) {
        if self.detailed() {
            self.print(
                format!("🔧 {} is calling {}", participant.display_name, invocation.name)
                    .dimmed()
                    .to_string(),
            );
        }
    }

    fn on_tool_result(&self, _participant: &Participant, tool_name: &str, result: &str) {
        if self.detailed() {
            self.print(
                format!("✓ {} returned {} characters", tool_name, result.chars().count())
                    .dimmed()
                    .to_string(),
            );
        }
    }

    fn on_consensus(&self, round: usize, metrics: &ConsensusMetrics) {
        if self.detailed() {
            let line = "─".repeat(WIDTH / 2);
            self.print(format!(
                "\n{}\n{}\n{}\n{}",
                line,
                "Consensus Analysis:".magenta().bold(),
                metrics,
                line
            ));
        } else if self.live() {
            self.print(format!(
                "Round {}: convergence {:.0}% ({})",
                round,
                metrics.convergence_score * 100.0,
                metrics.agreement_level
            ));
        }
    }

    fn on_early_exit(&self, round: usize) {
        if self.live() {
            self.print(
                format!("\n✓ Consensus reached after {} rounds!", round)
                    .green()
                    .bold()
                    .to_string(),
            );
        }
    }

    fn on_synthesis_start(&self, synthesizer: &Participant) {
        self.clear_spinner();
        {
            let mut state = self.state();
            state.in_synthesis = true;
            state.synthesis_chars = 0;
        }
        if self.live() {
            let line = "=".repeat(WIDTH);
            println!(
                "\n{}\n{}\n{}\n\n{}\n{}",
                line.cyan(),
                "GENERATING FINAL CONSENSUS...".bold(),
                line.cyan(),
                "Final Consensus:".green().bold(),
                "─".repeat(WIDTH)
            );
        } else {
            self.start_spinner(
                "Synthesis".to_string(),
                format!("{} is writing the final answer", synthesizer.display_name),
            );
        }
    }

    fn on_synthesis_chunk(&self, chunk: &str) {
        let mut state = self.state();
        state.synthesis_chars += chunk.chars().count();
        if self.live() {
            print!("{}", chunk);
            let _ = std::io::stdout().flush();
            self.synthesis_printed.store(true, Ordering::SeqCst);
        } else if let Some(spinner) = &state.spinner {
            spinner.set_message(format!("{} chars", state.synthesis_chars));
        }
    }

    fn on_session_complete(&self, session: &Session) {
        self.end_synthesis();
        self.clear_spinner();
        if self.live() {
            self.print(
                format!(
                    "\nSession completed in {:.1} seconds",
                    session.total_duration.as_secs_f64()
                )
                .dimmed()
                .to_string(),
            );
        }
    }

    fn on_usage_stats(&self, stats: &[(String, UsageStats)]) {
        if self.show_usage {
            self.eprint(ConsoleFormatter::format_usage_table(stats));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_message() {
        let mut pending = BTreeMap::new();
        assert_eq!(pending_message(&pending), "finishing...");

        pending.insert("claude".to_string(), ("Claude".to_string(), 0));
        pending.insert("gpt".to_string(), ("GPT-4o".to_string(), 42));
        assert_eq!(
            pending_message(&pending),
            "Claude (waiting), GPT-4o (42 chars)"
        );
    }

    #[test]
    fn test_styled_notice_plain() {
        colored::control::set_override(false);
        assert_eq!(styled_notice(NoticeCategory::Warning, "careful"), "careful");
    }

    #[test]
    fn test_turn_bookkeeping() {
        let reporter = ConsoleProgressReporter::new(ReporterMode::Quiet);
        let gpt = Participant::new("gpt", "GPT-4o");
        reporter.on_turn_start(&gpt, 1);
        reporter.on_turn_chunk(&gpt, "hello");
        assert_eq!(reporter.state().pending["gpt"].1, 5);

        reporter.on_turn_restart(&gpt);
        assert_eq!(reporter.state().pending["gpt"].1, 0);

        reporter.on_turn_complete(&ModelResponse::success(&gpt, 1, "hello"));
        assert!(reporter.state().pending.is_empty());
    }

    #[test]
    fn test_quiet_mode_never_marks_synthesis_printed() {
        let reporter = ConsoleProgressReporter::new(ReporterMode::Quiet);
        reporter.on_synthesis_start(&Participant::new("gpt", "GPT-4o"));
        reporter.on_synthesis_chunk("answer");
        assert!(!reporter.printed_synthesis());
        assert_eq!(reporter.state().synthesis_chars, 6);
    }
}
