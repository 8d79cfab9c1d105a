//! Plain-text transcript export.

use deliberation_domain::Session;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const WIDE: usize = 80;
const NARROW: usize = 40;

/// Default file name: `deliberation_<YYYYmmdd_HHMMSS>.txt` in the working directory
pub fn default_export_path() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("deliberation_{}.txt", stamp))
}

/// Write the transcript of `session` to `path` (or the default name).
///
/// Parent directories are created as needed. Returns the path written.
pub fn export_transcript(session: &Session, path: Option<&Path>) -> std::io::Result<PathBuf> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_export_path);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, render_transcript(session))?;
    info!("Exported session transcript to {}", path.display());
    Ok(path)
}

/// Render the transcript: header, every round with its consensus analysis,
/// then the final consensus
pub fn render_transcript(session: &Session) -> String {
    let heavy = "=".repeat(WIDE);
    let light = "─".repeat(WIDE);
    let short = "─".repeat(NARROW);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "{heavy}\nMULTI-MODEL DELIBERATION SESSION SUMMARY\n{heavy}\n");
    let _ = writeln!(out, "Question: {}\n", session.question);
    let _ = writeln!(out, "Models Used: {}", session.models_used().join(", "));
    let _ = writeln!(out, "Total Rounds: {}", session.rounds.len());
    let _ = writeln!(
        out,
        "Duration: {:.1} seconds\n",
        session.total_duration.as_secs_f64()
    );
    let _ = writeln!(out, "{heavy}\nDELIBERATION ROUNDS\n{heavy}\n");

    for round in &session.rounds {
        let _ = writeln!(out, "\n{light}\nROUND {}\n{light}\n", round.number);
        for response in &round.responses {
            match &response.error {
                Some(error) => {
                    let _ = writeln!(out, "[{}] ERROR: {}\n", response.display_name, error);
                }
                None => {
                    let _ = writeln!(out, "[{}]\n{}\n", response.display_name, response.content);
                }
            }
        }
        if let Some(metrics) = &round.consensus {
            let _ = writeln!(out, "\n{short}\nConsensus Analysis:\n{metrics}\n{short}\n");
        }
    }

    if let Some(answer) = &session.final_answer {
        let _ = writeln!(out, "\n{heavy}\nFINAL CONSENSUS\n{heavy}\n\n{answer}");
    }
    let _ = writeln!(out, "\n{heavy}\nEND OF SESSION\n{heavy}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use deliberation_domain::{
        AgreementLevel, ConsensusMetrics, ModelResponse, Participant, Round,
    };
    use std::time::Duration;

    fn session() -> Session {
        let gpt = Participant::new("gpt", "GPT-4o");
        let claude = Participant::new("claude", "Claude");
        let mut session = Session::new("Is Rust fast?", vec![gpt.clone(), claude.clone()]);

        let first = Round::new(
            1,
            vec![
                ModelResponse::success(&gpt, 1, "Yes, very."),
                ModelResponse::failure(&claude, 1, "Rate limit exceeded"),
            ],
        )
        .unwrap();
        let mut second = Round::new(
            2,
            vec![
                ModelResponse::success(&gpt, 2, "Still yes."),
                ModelResponse::success(&claude, 2, "Agreed, it is fast."),
            ],
        )
        .unwrap();
        second.consensus = Some(ConsensusMetrics {
            convergence_score: 0.8,
            agreement_level: AgreementLevel::High,
            key_agreements: vec!["fast".into()],
            key_disagreements: vec![],
            has_consensus: true,
        });
        session.push_round(first).unwrap();
        session.push_round(second).unwrap();
        session.final_answer = Some("Rust is fast.".into());
        session.total_duration = Duration::from_millis(12_340);
        session
    }

    #[test]
    fn test_render_transcript() {
        let text = render_transcript(&session());
        assert!(text.starts_with(&"=".repeat(80)));
        assert!(text.contains("Question: Is Rust fast?"));
        assert!(text.contains("Models Used: gpt, claude"));
        assert!(text.contains("Total Rounds: 2"));
        assert!(text.contains("Duration: 12.3 seconds"));
        assert!(text.contains("ROUND 1"));
        assert!(text.contains("[Claude] ERROR: Rate limit exceeded"));
        assert!(text.contains("[GPT-4o]\nStill yes."));
        assert!(text.contains("Consensus Analysis:\nConvergence: 80.00%"));
        assert!(text.contains("FINAL CONSENSUS"));
        assert!(text.contains("Rust is fast."));
        assert!(text.trim_end().ends_with(&"=".repeat(80)));
    }

    #[test]
    fn test_no_final_consensus_section_without_answer() {
        let mut s = session();
        s.final_answer = None;
        assert!(!render_transcript(&s).contains("FINAL CONSENSUS"));
    }

    #[test]
    fn test_export_to_given_path() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out").join("session.txt");
        let written = export_transcript(&session(), Some(&target)).unwrap();
        assert_eq!(written, target);
        let content = std::fs::read_to_string(&target).unwrap();
        assert!(content.contains("END OF SESSION"));
    }

    #[test]
    fn test_default_export_path_format() {
        let name = default_export_path().to_string_lossy().into_owned();
        assert!(name.starts_with("deliberation_"));
        assert!(name.ends_with(".txt"));
        assert_eq!(name.len(), "deliberation_20240101_120000.txt".len());
    }
}
