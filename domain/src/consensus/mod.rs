//! Convergence scoring for deliberation rounds.
//!
//! [`ConsensusStrategy`] is the seam the orchestrator depends on;
//! [`HeuristicConsensusScorer`] is the default implementation, a weighted
//! blend of five text heuristics:
//!
//! | Signal | Weight |
//! |--------|--------|
//! | Agreement language | 2.5 |
//! | Core-answer consistency | 2.0 |
//! | Cross-reference | 1.5 |
//! | Stability | 1.0 |
//! | Keyword overlap | 0.5 |
//!
//! Scoring is a pure function of the round history; nothing is carried
//! between calls.

pub mod factual;
pub mod keywords;
pub mod language;

use crate::core::error::DomainError;
use crate::deliberation::{AgreementLevel, ConsensusMetrics, Participant, RoundTexts};

/// Decides how close a set of responses is to agreement
pub trait ConsensusStrategy: Send + Sync {
    /// Analyse every round so far (oldest first). Each round holds only the
    /// successful responses.
    fn analyze(&self, history: &[RoundTexts], participants: &[Participant]) -> ConsensusMetrics;

    /// Score at or above which a session may stop early
    fn threshold(&self) -> f64;
}

/// Per-signal scores behind a convergence score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub agreement_language: f64,
    pub core_answer: f64,
    pub cross_reference: f64,
    pub stability: f64,
    pub keyword_overlap: f64,
}

impl ScoreBreakdown {
    const WEIGHTS: [f64; 5] = [2.5, 2.0, 1.5, 1.0, 0.5];

    /// Weighted mean of the five signals
    pub fn weighted(&self) -> f64 {
        let scores = [
            self.agreement_language,
            self.core_answer,
            self.cross_reference,
            self.stability,
            self.keyword_overlap,
        ];
        let total: f64 = Self::WEIGHTS.iter().sum();
        let sum: f64 = scores
            .iter()
            .zip(Self::WEIGHTS.iter())
            .map(|(s, w)| s * w)
            .sum();
        (sum / total).clamp(0.0, 1.0)
    }
}

/// Default keyword/regex scorer
#[derive(Debug, Clone)]
pub struct HeuristicConsensusScorer {
    threshold: f64,
}

impl HeuristicConsensusScorer {
    pub const DEFAULT_THRESHOLD: f64 = 0.75;

    /// A single round only counts as consensus at this factual score
    pub const SINGLE_ROUND_CONSENSUS: f64 = 0.95;

    pub fn new(threshold: f64) -> Result<Self, DomainError> {
        if !(0.5..=1.0).contains(&threshold) {
            return Err(DomainError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    /// Signals for a history of two or more rounds
    pub fn breakdown(&self, history: &[RoundTexts], participants: &[Participant]) -> ScoreBreakdown {
        let empty = RoundTexts::new();
        let last = history.last().unwrap_or(&empty);
        ScoreBreakdown {
            agreement_language: language::agreement_language(last),
            core_answer: language::core_answer_consistency(last),
            cross_reference: language::cross_reference(history),
            stability: keywords::stability(history, participants),
            keyword_overlap: keywords::keyword_overlap(last),
        }
    }

    fn single_round(&self, responses: &RoundTexts) -> ConsensusMetrics {
        let score = language::core_answer_consistency(responses);
        let key_agreements = keywords::common_themes(responses);

        if score >= Self::SINGLE_ROUND_CONSENSUS {
            return ConsensusMetrics {
                convergence_score: score,
                agreement_level: AgreementLevel::High,
                key_agreements,
                key_disagreements: Vec::new(),
                has_consensus: score >= self.threshold,
            };
        }

        ConsensusMetrics {
            convergence_score: score,
            agreement_level: if score < 0.55 {
                AgreementLevel::Low
            } else {
                AgreementLevel::Medium
            },
            key_agreements,
            key_disagreements: Vec::new(),
            has_consensus: false,
        }
    }
}

impl Default for HeuristicConsensusScorer {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }
}

impl ConsensusStrategy for HeuristicConsensusScorer {
    fn analyze(&self, history: &[RoundTexts], participants: &[Participant]) -> ConsensusMetrics {
        match history {
            [] => ConsensusMetrics::insufficient_data(),
            [only] => self.single_round(only),
            [.., last] => {
                let score = self.breakdown(history, participants).weighted();
                ConsensusMetrics {
                    convergence_score: score,
                    agreement_level: AgreementLevel::from_score(score),
                    key_agreements: keywords::common_themes(last),
                    key_disagreements: language::disagreements(last, participants),
                    has_consensus: score >= self.threshold,
                }
            }
        }
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }
}
