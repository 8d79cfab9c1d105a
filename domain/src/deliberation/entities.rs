//! Deliberation entities: rounds and the session that owns them.

use super::value_objects::{ConsensusMetrics, ModelResponse, Participant, RoundTexts};
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One iteration in which every participant answers once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    /// 1-based
    pub number: usize,
    /// One response per participant, in dispatch order
    pub responses: Vec<ModelResponse>,
    /// Absent for round 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus: Option<ConsensusMetrics>,
    pub duration: Duration,
}

impl Round {
    /// Build a round, rejecting a backend that answered twice
    pub fn new(number: usize, responses: Vec<ModelResponse>) -> Result<Self, DomainError> {
        for (i, response) in responses.iter().enumerate() {
            if responses[..i]
                .iter()
                .any(|r| r.backend_id == response.backend_id)
            {
                return Err(DomainError::DuplicateBackend(response.backend_id.clone()));
            }
        }
        Ok(Self {
            number,
            responses,
            consensus: None,
            duration: Duration::ZERO,
        })
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn response(&self, backend_id: &str) -> Option<&ModelResponse> {
        self.responses.iter().find(|r| r.backend_id == backend_id)
    }

    /// Texts of the backends that answered without error
    pub fn successful_texts(&self) -> RoundTexts {
        self.responses
            .iter()
            .filter(|r| r.is_success())
            .map(|r| (r.backend_id.clone(), r.content.clone()))
            .collect()
    }

    pub fn success_count(&self) -> usize {
        self.responses.iter().filter(|r| r.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ModelResponse> {
        self.responses.iter().filter(|r| !r.is_success())
    }
}

/// A complete deliberation: question, rounds and the synthesized answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub question: String,
    pub rounds: Vec<Round>,
    pub final_answer: Option<String>,
    /// Why synthesis produced no answer, when it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis_error: Option<String>,
    pub total_duration: Duration,
    pub participants: Vec<Participant>,
}

impl Session {
    pub fn new(question: impl Into<String>, participants: Vec<Participant>) -> Self {
        Self {
            question: question.into(),
            rounds: Vec::new(),
            final_answer: None,
            synthesis_error: None,
            total_duration: Duration::ZERO,
            participants,
        }
    }

    /// Identifiers of the participating backends
    pub fn models_used(&self) -> Vec<&str> {
        self.participants.iter().map(|p| p.id.as_str()).collect()
    }

    /// Append the next round; numbering must stay contiguous from 1
    pub fn push_round(&mut self, round: Round) -> Result<(), DomainError> {
        let expected = self.rounds.len() + 1;
        if round.number != expected {
            return Err(DomainError::OutOfOrderRound {
                expected,
                got: round.number,
            });
        }
        self.rounds.push(round);
        Ok(())
    }

    pub fn last_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    /// Latest consensus analysis, if any round was scored
    pub fn latest_consensus(&self) -> Option<&ConsensusMetrics> {
        self.rounds.iter().rev().find_map(|r| r.consensus.as_ref())
    }

    /// Successful texts for every round, oldest first
    pub fn history(&self) -> Vec<RoundTexts> {
        self.rounds.iter().map(Round::successful_texts).collect()
    }

    pub fn successful_response_count(&self) -> usize {
        self.rounds.iter().map(Round::success_count).sum()
    }

    pub fn display_name<'a>(&'a self, backend_id: &'a str) -> &'a str {
        self.participants
            .iter()
            .find(|p| p.id == backend_id)
            .map(|p| p.display_name.as_str())
            .unwrap_or(backend_id)
    }
}
