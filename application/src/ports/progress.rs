//! Progress notification port
//!
//! Defines the interface for reporting progress during a deliberation.
//! Every typed callback falls back to [`ProgressNotifier::on_notice`], so a
//! minimal implementation only needs that one method.

use crate::rate_limit::UsageStats;
use deliberation_domain::{ConsensusMetrics, ModelResponse, Participant, Session, ToolInvocation};
use std::fmt;

/// Category tag attached to a progress message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeCategory {
    Info,
    Warning,
    Error,
    Success,
    Header,
}

impl NoticeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeCategory::Info => "info",
            NoticeCategory::Warning => "warning",
            NoticeCategory::Error => "error",
            NoticeCategory::Success => "success",
            NoticeCategory::Header => "header",
        }
    }
}

impl fmt::Display for NoticeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback for progress updates during a deliberation
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (console, log lines, UI events).
pub trait ProgressNotifier: Send + Sync {
    /// Free-form message with a category tag
    fn on_notice(&self, _category: NoticeCategory, _message: &str) {}

    fn on_backend_ready(&self, participant: &Participant) {
        self.on_notice(
            NoticeCategory::Info,
            &format!("✓ Initialized {}", participant.display_name),
        );
    }

    fn on_backend_unavailable(&self, display_name: &str, reason: &str) {
        self.on_notice(
            NoticeCategory::Warning,
            &format!("✗ Failed to initialize {}: {}", display_name, reason),
        );
    }

    fn on_session_start(&self, question: &str, participants: &[Participant], max_rounds: usize) {
        self.on_notice(NoticeCategory::Header, "MULTI-MODEL DELIBERATION SESSION");
        self.on_notice(NoticeCategory::Info, &format!("Question: {}", question));
        let names: Vec<&str> = participants.iter().map(|p| p.display_name.as_str()).collect();
        self.on_notice(NoticeCategory::Info, &format!("Models: {}", names.join(", ")));
        self.on_notice(NoticeCategory::Info, &format!("Rounds: {}", max_rounds));
    }

    fn on_round_start(&self, round: usize, _max_rounds: usize) {
        self.on_notice(NoticeCategory::Header, &format!("ROUND {}", round));
    }

    fn on_turn_start(&self, participant: &Participant, _round: usize) {
        self.on_notice(NoticeCategory::Info, &format!("[{}]", participant.display_name));
    }

    /// Streamed text from a backend's current turn
    fn on_turn_chunk(&self, _participant: &Participant, _chunk: &str) {}

    /// A failed attempt is being retried; text streamed so far is void
    fn on_turn_restart(&self, _participant: &Participant) {}

    fn on_turn_complete(&self, response: &ModelResponse) {
        if let Some(error) = &response.error {
            self.on_notice(
                NoticeCategory::Error,
                &format!("Error from {}: {}", response.display_name, error),
            );
        }
    }

    fn on_tool_call(&self, participant: &Participant, invocation: &ToolInvocation) {
        self.on_notice(
            NoticeCategory::Info,
            &format!("🔧 {} is calling {}", participant.display_name, invocation.name),
        );
    }

    fn on_tool_result(&self, _participant: &Participant, tool_name: &str, result: &str) {
        self.on_notice(
            NoticeCategory::Info,
            &format!("✓ {} returned {} characters", tool_name, result.chars().count()),
        );
    }

    fn on_consensus(&self, _round: usize, metrics: &ConsensusMetrics) {
        self.on_notice(NoticeCategory::Header, "Consensus Analysis:");
        self.on_notice(NoticeCategory::Info, &metrics.to_string());
    }

    fn on_early_exit(&self, round: usize) {
        self.on_notice(
            NoticeCategory::Success,
            &format!("✓ Consensus reached after {} rounds!", round),
        );
    }

    fn on_synthesis_start(&self, _synthesizer: &Participant) {
        self.on_notice(NoticeCategory::Header, "GENERATING FINAL CONSENSUS...");
    }

    fn on_synthesis_chunk(&self, _chunk: &str) {}

    fn on_session_complete(&self, session: &Session) {
        self.on_notice(
            NoticeCategory::Info,
            &format!(
                "Session completed in {:.1} seconds",
                session.total_duration.as_secs_f64()
            ),
        );
    }

    fn on_usage_stats(&self, stats: &[(String, UsageStats)]) {
        for (key, usage) in stats {
            self.on_notice(NoticeCategory::Info, &format!("{}: {}", key, usage));
        }
    }
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ProgressNotifier for NoProgress {}
