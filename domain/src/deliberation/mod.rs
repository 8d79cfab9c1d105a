//! Deliberation data model: sessions, rounds and per-backend responses.

pub mod entities;
pub mod value_objects;

pub use entities::{Round, Session};
pub use value_objects::{AgreementLevel, ConsensusMetrics, ModelResponse, Participant, RoundTexts};
