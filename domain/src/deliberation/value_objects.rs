//! Deliberation value objects - immutable results of a single turn or analysis.
//!
//! - [`ModelResponse`] - one backend's answer in one round (or its failure)
//! - [`ConsensusMetrics`] - the scorer's report on a round history
//! - [`Participant`] - identifier and display name of a backend in a session

use serde::{Deserialize, Serialize};
use std::fmt;

/// Successful response texts of one round, in dispatch order: `(backend id, text)`
pub type RoundTexts = Vec<(String, String)>;

/// A backend taking part in a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub display_name: String,
}

impl Participant {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// One backend's response in one round
///
/// Failures are kept as data: the content is empty and `error` describes
/// what went wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub backend_id: String,
    pub display_name: String,
    pub content: String,
    pub round_number: usize,
    /// Creation time, milliseconds since the Unix epoch
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelResponse {
    pub fn success(
        participant: &Participant,
        round_number: usize,
        content: impl Into<String>,
    ) -> Self {
        Self {
            backend_id: participant.id.clone(),
            display_name: participant.display_name.clone(),
            content: content.into(),
            round_number,
            timestamp: current_timestamp(),
            error: None,
        }
    }

    pub fn failure(participant: &Participant, round_number: usize, error: impl Into<String>) -> Self {
        Self {
            backend_id: participant.id.clone(),
            display_name: participant.display_name.clone(),
            content: String::new(),
            round_number,
            timestamp: current_timestamp(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Coarse bucket derived from the convergence score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementLevel {
    High,
    Medium,
    Low,
    InsufficientData,
}

impl AgreementLevel {
    /// `>= 0.75` high, `>= 0.55` medium, otherwise low
    pub fn from_score(score: f64) -> Self {
        if score >= 0.75 {
            AgreementLevel::High
        } else if score >= 0.55 {
            AgreementLevel::Medium
        } else {
            AgreementLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgreementLevel::High => "high",
            AgreementLevel::Medium => "medium",
            AgreementLevel::Low => "low",
            AgreementLevel::InsufficientData => "insufficient_data",
        }
    }
}

impl fmt::Display for AgreementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of analysing a round history for convergence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusMetrics {
    /// Always within `[0.0, 1.0]`
    pub convergence_score: f64,
    pub agreement_level: AgreementLevel,
    /// At most five shared keywords, most frequent first
    pub key_agreements: Vec<String>,
    /// At most three excerpts, each prefixed with a display name
    pub key_disagreements: Vec<String>,
    pub has_consensus: bool,
}

impl ConsensusMetrics {
    pub fn insufficient_data() -> Self {
        Self {
            convergence_score: 0.0,
            agreement_level: AgreementLevel::InsufficientData,
            key_agreements: Vec::new(),
            key_disagreements: Vec::new(),
            has_consensus: false,
        }
    }
}

impl fmt::Display for ConsensusMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Convergence: {:.2}%", self.convergence_score * 100.0)?;
        writeln!(f, "Agreement Level: {}", self.agreement_level)?;
        write!(
            f,
            "Consensus Reached: {}",
            if self.has_consensus { "Yes" } else { "No" }
        )
    }
}

fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
