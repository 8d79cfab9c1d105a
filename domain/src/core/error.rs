//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Consensus threshold must be between 0.5 and 1.0, got {0}")]
    InvalidThreshold(f64),

    #[error("Round {got} appended out of order (expected round {expected})")]
    OutOfOrderRound { expected: usize, got: usize },

    #[error("Backend {0} appears more than once in a round")]
    DuplicateBackend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_order_display() {
        let error = DomainError::OutOfOrderRound {
            expected: 2,
            got: 4,
        };
        assert_eq!(
            error.to_string(),
            "Round 4 appended out of order (expected round 2)"
        );
    }

    #[test]
    fn test_threshold_display() {
        let error = DomainError::InvalidThreshold(0.2);
        assert!(error.to_string().contains("0.2"));
    }
}
