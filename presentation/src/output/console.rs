//! Console output formatter for deliberation sessions

use colored::Colorize;
use deliberation_application::UsageStats;
use deliberation_domain::{BackendDescriptor, Session};

const WIDTH: usize = 80;

/// Formats sessions and status reports for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the complete session transcript
    pub fn format(session: &Session) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("MULTI-MODEL DELIBERATION SESSION"));
        output.push('\n');
        output.push_str(&format!(
            "\n{} {}\n",
            "Question:".cyan().bold(),
            session.question
        ));
        let names: Vec<&str> = session
            .participants
            .iter()
            .map(|p| p.display_name.as_str())
            .collect();
        output.push_str(&format!("{} {}\n", "Models:".cyan().bold(), names.join(", ")));
        output.push_str(&format!(
            "{} {}\n",
            "Rounds:".cyan().bold(),
            session.rounds.len()
        ));

        for round in &session.rounds {
            output.push_str(&Self::section_header(&format!("ROUND {}", round.number)));
            for response in &round.responses {
                match &response.error {
                    Some(error) => output.push_str(&format!(
                        "\n{}\nError: {}\n",
                        format!("[{}]", response.display_name).red().bold(),
                        error
                    )),
                    None => output.push_str(&format!(
                        "\n{}\n{}\n",
                        format!("[{}]", response.display_name).yellow().bold(),
                        response.content
                    )),
                }
            }
            if let Some(metrics) = &round.consensus {
                output.push_str(&format!(
                    "\n{}\n{}\n",
                    "Consensus Analysis:".magenta().bold(),
                    metrics
                ));
                if !metrics.key_agreements.is_empty() {
                    output.push_str(&format!(
                        "Shared terms: {}\n",
                        metrics.key_agreements.join(", ")
                    ));
                }
                for disagreement in &metrics.key_disagreements {
                    output.push_str(&format!("  * {}\n", disagreement));
                }
            }
        }

        output.push('\n');
        output.push_str(&Self::format_synthesis_only(session));
        output.push_str(&format!(
            "\n{}\n",
            format!(
                "Session completed in {:.1} seconds",
                session.total_duration.as_secs_f64()
            )
            .dimmed()
        ));
        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON
    pub fn format_json(session: &Session) -> String {
        serde_json::to_string_pretty(session).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format the final consensus only (concise output)
    pub fn format_synthesis_only(session: &Session) -> String {
        let mut output = format!(
            "{}\n{}\n",
            "Final Consensus:".green().bold(),
            "─".repeat(WIDTH)
        );
        match (&session.final_answer, &session.synthesis_error) {
            (Some(answer), _) => output.push_str(answer),
            (None, Some(error)) => {
                output.push_str(&format!("{} {}", "Error generating consensus:".red(), error))
            }
            (None, None) => output.push_str(&"No final consensus was produced.".dimmed().to_string()),
        }
        output.push('\n');
        output
    }

    /// Summary shown after Ctrl-C
    pub fn format_interrupted(session: &Session) -> String {
        let mut output = format!("\n{}\n", "Deliberation interrupted".yellow().bold());
        if session.rounds.is_empty() {
            output.push_str("No rounds were completed.\n");
            return output;
        }
        output.push_str(&format!("Completed rounds: {}\n", session.rounds.len()));
        for round in &session.rounds {
            let convergence = round
                .consensus
                .as_ref()
                .map(|m| format!(", convergence {:.0}%", m.convergence_score * 100.0))
                .unwrap_or_default();
            output.push_str(&format!(
                "  Round {}: {}/{} responses{}\n",
                round.number,
                round.success_count(),
                round.responses.len(),
                convergence
            ));
        }
        output
    }

    /// Rate-limit usage per quota pool
    pub fn format_usage_table(stats: &[(String, UsageStats)]) -> String {
        if stats.is_empty() {
            return String::new();
        }
        let key_width = stats.iter().map(|(k, _)| k.len()).max().unwrap_or(0).max(4);
        let mut output = format!("{}\n", "Rate Limit Usage:".cyan().bold());
        output.push_str(&format!(
            "  {:<key_width$}  {:>12}  {:>18}  {:>12}\n",
            "Pool", "RPM", "TPM", "RPD"
        ));
        for (key, usage) in stats {
            output.push_str(&format!(
                "  {:<key_width$}  {:>12}  {:>18}  {:>12}\n",
                key,
                format!("{}/{}", usage.rpm, usage.rpm_limit),
                format!("{}/{}", usage.tpm, usage.tpm_limit),
                format!("{}/{}", usage.rpd, usage.rpd_limit),
            ));
        }
        output
    }

    /// Every configured backend with its availability.
    ///
    /// `entries` pairs each descriptor with the reason it cannot be used, if any.
    pub fn format_backend_status(entries: &[(BackendDescriptor, Option<String>)]) -> String {
        let mut output = format!("\n{}\n{}\n", "Model Status:".cyan().bold(), "=".repeat(60));
        for (descriptor, reason) in entries {
            match reason {
                None => output.push_str(&format!(
                    "{} {:<24} {} ({})\n",
                    "✓".green(),
                    descriptor.display_name,
                    descriptor.model_name,
                    descriptor.provider
                )),
                Some(reason) => output.push_str(&format!(
                    "{} {:<24} {}\n",
                    "✗".red(),
                    descriptor.display_name,
                    reason.dimmed()
                )),
            }
        }
        let available = entries.iter().filter(|(_, r)| r.is_none()).count();
        output.push_str(&format!(
            "{}\nAvailable: {}/{}\n",
            "=".repeat(60),
            available,
            entries.len()
        ));
        output
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(WIDTH);
        format!("{}\n{:^WIDTH$}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n{}\n", "─".repeat(WIDTH), title.cyan().bold(), "─".repeat(WIDTH))
    }

    fn footer() -> String {
        format!("{}\n", "=".repeat(WIDTH).cyan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deliberation_domain::{
        AgreementLevel, ConsensusMetrics, ModelResponse, Participant, ProviderFamily, Round,
    };
    use std::time::Duration;

    fn plain() {
        colored::control::set_override(false);
    }

    fn session() -> Session {
        let gpt = Participant::new("gpt", "GPT-4o");
        let grok = Participant::new("grok", "Grok 3");
        let mut session = Session::new("Tabs or spaces?", vec![gpt.clone(), grok.clone()]);
        let mut round = Round::new(
            1,
            vec![
                ModelResponse::success(&gpt, 1, "Spaces."),
                ModelResponse::failure(&grok, 1, "HTTP 500"),
            ],
        )
        .unwrap();
        round.consensus = Some(ConsensusMetrics {
            convergence_score: 0.6,
            agreement_level: AgreementLevel::Medium,
            key_agreements: vec!["spaces".into()],
            key_disagreements: vec![],
            has_consensus: false,
        });
        session.push_round(round).unwrap();
        session.final_answer = Some("Use spaces.".into());
        session.total_duration = Duration::from_secs(3);
        session
    }

    #[test]
    fn test_format_full() {
        plain();
        let output = ConsoleFormatter::format(&session());
        assert!(output.contains("Question: Tabs or spaces?"));
        assert!(output.contains("Models: GPT-4o, Grok 3"));
        assert!(output.contains("ROUND 1"));
        assert!(output.contains("[GPT-4o]\nSpaces."));
        assert!(output.contains("[Grok 3]\nError: HTTP 500"));
        assert!(output.contains("Convergence: 60.00%"));
        assert!(output.contains("Shared terms: spaces"));
        assert!(output.contains("Final Consensus:"));
        assert!(output.contains("Use spaces."));
    }

    #[test]
    fn test_synthesis_only_reports_failure() {
        plain();
        let mut s = session();
        s.final_answer = None;
        s.synthesis_error = Some("timeout".into());
        let output = ConsoleFormatter::format_synthesis_only(&s);
        assert!(output.contains("Error generating consensus: timeout"));
    }

    #[test]
    fn test_format_json_round_trips_question() {
        let json = ConsoleFormatter::format_json(&session());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["question"], "Tabs or spaces?");
        assert_eq!(value["rounds"][0]["responses"][1]["error"], "HTTP 500");
    }

    #[test]
    fn test_format_interrupted() {
        plain();
        let output = ConsoleFormatter::format_interrupted(&session());
        assert!(output.contains("Deliberation interrupted"));
        assert!(output.contains("Completed rounds: 1"));
        assert!(output.contains("Round 1: 1/2 responses, convergence 60%"));

        let empty = Session::new("q", vec![]);
        assert!(ConsoleFormatter::format_interrupted(&empty).contains("No rounds were completed."));
    }

    #[test]
    fn test_usage_table() {
        plain();
        let stats = vec![(
            "openai:gpt-4o".to_string(),
            UsageStats {
                rpm: 3,
                rpm_limit: 500,
                tpm: 1200,
                tpm_limit: 200_000,
                rpd: 3,
                rpd_limit: 10_000,
            },
        )];
        let table = ConsoleFormatter::format_usage_table(&stats);
        assert!(table.contains("openai:gpt-4o"));
        assert!(table.contains("3/500"));
        assert!(table.contains("1200/200000"));
        assert!(ConsoleFormatter::format_usage_table(&[]).is_empty());
    }

    #[test]
    fn test_backend_status() {
        plain();
        let gpt = BackendDescriptor::new("gpt", ProviderFamily::OpenAi, "gpt-4o", "GPT-4o");
        let claude =
            BackendDescriptor::new("claude", ProviderFamily::Anthropic, "claude-x", "Claude");
        let output = ConsoleFormatter::format_backend_status(&[
            (gpt, None),
            (claude, Some("ANTHROPIC_API_KEY is not set".into())),
        ]);
        assert!(output.contains("✓ GPT-4o"));
        assert!(output.contains("✗ Claude"));
        assert!(output.contains("ANTHROPIC_API_KEY is not set"));
        assert!(output.contains("Available: 1/2"));
    }
}
