//! Domain layer for deliberate
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Deliberation
//!
//! Several independent backends answer one question over multiple rounds.
//! From round 2 on, each backend sees its peers' previous answers.
//!
//! - **Session / Round / ModelResponse**: the record of a deliberation
//! - **Consensus**: a pluggable [`ConsensusStrategy`] scores how far the
//!   answers have converged; the session stops early once it is reached
//! - **Synthesis**: one final call merges the last round into a single answer

pub mod backend;
pub mod consensus;
pub mod core;
pub mod deliberation;
pub mod generation;
pub mod prompt;
pub mod tool;

// Re-export commonly used types
pub use backend::{
    BackendDescriptor, CredentialError, MAX_RETRY_DELAY, ProviderFamily, RATE_LIMIT_BACKOFF_FLOOR,
    RateLimitConfig, ResolvedBackend,
};
pub use consensus::{ConsensusStrategy, HeuristicConsensusScorer, ScoreBreakdown};
pub use core::{error::DomainError, question::Question};
pub use deliberation::{
    AgreementLevel, ConsensusMetrics, ModelResponse, Participant, Round, RoundTexts, Session,
};
pub use generation::{GenerationFragment, GenerationRequest, tokens_used};
pub use prompt::PromptTemplate;
pub use tool::{ToolDefinition, ToolInvocation, ToolParameter};
