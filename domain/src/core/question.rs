//! Question value object

use super::error::DomainError;
use serde::{Deserialize, Serialize};

/// The question a deliberation is convened to answer (Value Object)
///
/// Always holds non-blank, trimmed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Question {
    content: String,
}

impl Question {
    /// Create a question, rejecting blank input
    pub fn new(content: impl Into<String>) -> Result<Self, DomainError> {
        let content = content.into();
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidQuestion(
                "question cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            content: trimmed.to_string(),
        })
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.content)
    }
}

impl TryFrom<String> for Question {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Question::new(value)
    }
}

impl TryFrom<&str> for Question {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Question::new(value)
    }
}

impl From<Question> for String {
    fn from(question: Question) -> Self {
        question.content
    }
}
