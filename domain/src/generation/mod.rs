//! Generation requests and the fragments a backend streams back.
//!
//! A backend answers a [`GenerationRequest`] with a finite sequence of
//! [`GenerationFragment`]s. Each fragment carries text, tool invocations,
//! or both.

use crate::tool::{ToolDefinition, ToolInvocation};

/// Input to one generation call
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_message: Option<String>,
    pub stream: bool,
    /// Tools the backend may ask to call; empty disables tool use
    pub tools: Vec<ToolDefinition>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_message = Some(system.into());
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Characters sent to the backend, system message included
    pub fn input_chars(&self) -> usize {
        self.prompt.chars().count()
            + self
                .system_message
                .as_deref()
                .map_or(0, |s| s.chars().count())
    }

    /// Cheap pre-estimate of the call's token cost: `input / 4 + output budget`
    pub fn estimated_tokens(&self, max_output_tokens: u32) -> u64 {
        (self.input_chars() / 4) as u64 + u64::from(max_output_tokens)
    }
}

/// One piece of a backend's answer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationFragment {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
}

impl GenerationFragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolInvocation>) -> Self {
        Self {
            text: None,
            tool_calls: calls,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(str::is_empty) && self.tool_calls.is_empty()
    }
}

/// Tokens charged for a completed call: `(input + output chars) / 4`, at least 1
pub fn tokens_used(input_chars: usize, output_chars: usize) -> u64 {
    ((input_chars + output_chars) / 4).max(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_tokens() {
        let request = GenerationRequest::new("x".repeat(400)).with_system("y".repeat(100));
        assert_eq!(request.input_chars(), 500);
        assert_eq!(request.estimated_tokens(2000), 2125);
    }

    #[test]
    fn test_tokens_used_minimum_one() {
        assert_eq!(tokens_used(0, 0), 1);
        assert_eq!(tokens_used(400, 400), 200);
    }

    #[test]
    fn test_fragment_is_empty() {
        assert!(GenerationFragment::default().is_empty());
        assert!(GenerationFragment::text("").is_empty());
        assert!(!GenerationFragment::text("hi").is_empty());
        assert!(!GenerationFragment::tool_calls(vec![ToolInvocation::new("1", "t")]).is_empty());
    }
}
