//! Local tool executor: the concrete implementation of [`ToolExecutorPort`].
//!
//! Holds a shared `reqwest::Client` (30s timeout) for `web_search`; the
//! clock tool runs inline.

use super::clock::{self, GET_CURRENT_DATETIME};
use super::search::{self, WEB_SEARCH};
use async_trait::async_trait;
use deliberation_application::ToolExecutorPort;
use deliberation_domain::{ToolDefinition, ToolInvocation};
use std::time::Duration;
use tracing::{debug, warn};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Executor for the built-in tools
#[derive(Debug, Clone)]
pub struct LocalToolExecutor {
    http_client: reqwest::Client,
    search_api_key: Option<String>,
    max_results: usize,
}

impl LocalToolExecutor {
    pub fn new(search_api_key: Option<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self {
            http_client,
            search_api_key: search_api_key.filter(|k| !k.trim().is_empty()),
            max_results: 5,
        }
    }

    /// Default result count for `web_search`
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    pub fn has_search_key(&self) -> bool {
        self.search_api_key.is_some()
    }
}

#[async_trait]
impl ToolExecutorPort for LocalToolExecutor {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            search::web_search_definition(),
            clock::datetime_definition(),
        ]
    }

    async fn execute(&self, invocation: &ToolInvocation) -> String {
        debug!("Executing tool {} ({})", invocation.name, invocation.id);
        match invocation.name.as_str() {
            WEB_SEARCH => {
                let query = invocation.get_string("query").unwrap_or_default();
                let max_results = invocation
                    .get_u64("max_results")
                    .map(|n| n as usize)
                    .unwrap_or(self.max_results);
                search::execute_web_search(
                    &self.http_client,
                    self.search_api_key.as_deref(),
                    query,
                    max_results,
                )
                .await
            }
            GET_CURRENT_DATETIME => {
                clock::current_datetime(invocation.get_string("timezone"), chrono::Utc::now())
            }
            other => format!("Error: Unknown tool '{}'", other),
        }
    }
}
