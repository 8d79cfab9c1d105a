//! Prompt templates for deliberation rounds, synthesis and tool follow-ups.

pub mod template;

pub use template::PromptTemplate;
