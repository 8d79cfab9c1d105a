//! Tool definitions and invocations.

pub mod entities;

pub use entities::{ToolDefinition, ToolInvocation, ToolParameter};
