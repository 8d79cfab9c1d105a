//! Tool Executor port
//!
//! Defines the interface for executing tools requested by backends (web
//! search, clock).

use async_trait::async_trait;
use deliberation_domain::{ToolDefinition, ToolInvocation};

/// Port for tool execution
///
/// This port defines how the application layer executes tools.
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait ToolExecutorPort: Send + Sync {
    /// Definitions of every available tool, offered to backends
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Check if a tool is available
    fn has_tool(&self, name: &str) -> bool {
        self.definitions().iter().any(|d| d.name == name)
    }

    /// Execute a tool call.
    ///
    /// Never fails: errors are reported as the returned text.
    async fn execute(&self, invocation: &ToolInvocation) -> String;
}
