//! `web_search` tool: search the web through the Tavily API.
//!
//! Requires an API key; without one every call returns a `Search Error`
//! text so the backend can still answer from its own knowledge.
//!
//! # Parameters
//!
//! | Name | Type | Required | Description |
//! |------|------|:---:|-------------|
//! | `query` | string | Yes | The search query |
//! | `max_results` | integer | No | Number of results (default from `[tools]`) |

use deliberation_domain::{ToolDefinition, ToolParameter};
use serde_json::{Value, json};
use tracing::debug;

/// Canonical tool name for the web search tool.
pub const WEB_SEARCH: &str = "web_search";

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

pub fn web_search_definition() -> ToolDefinition {
    ToolDefinition::new(
        WEB_SEARCH,
        "Search the web for current information. Use this for recent events, facts you are unsure of, or anything after your training data.",
    )
    .with_parameter(ToolParameter::new("query", "The search query", true).with_type("string"))
    .with_parameter(
        ToolParameter::new("max_results", "Maximum number of results to return", false)
            .with_type("integer"),
    )
}

/// Run a Tavily search. Never fails: errors come back as `Search Error: ...`.
pub async fn execute_web_search(
    client: &reqwest::Client,
    api_key: Option<&str>,
    query: &str,
    max_results: usize,
) -> String {
    let Some(api_key) = api_key else {
        return "Search Error: No Tavily API key configured. Set TAVILY_API_KEY to enable web search."
            .to_string();
    };
    if query.trim().is_empty() {
        return "Search Error: query is required".to_string();
    }

    debug!("web_search: '{}' (max {})", query, max_results);
    let body = json!({
        "api_key": api_key,
        "query": query,
        "max_results": max_results,
        "search_depth": "basic",
        "include_answer": true,
    });

    let response = match client.post(TAVILY_API_URL).json(&body).send().await {
        Ok(r) => r,
        Err(e) => return format!("Search Error: {}", e),
    };
    if !response.status().is_success() {
        return format!("Search Error: Search API returned {}", response.status());
    }
    match response.json::<Value>().await {
        Ok(data) => format_search_results(&data),
        Err(e) => format!("Search Error: Failed to parse search results: {}", e),
    }
}

/// Render a Tavily response: the quick answer, then numbered results
fn format_search_results(data: &Value) -> String {
    let mut output = String::new();

    if let Some(answer) = data["answer"].as_str()
        && !answer.is_empty()
    {
        output.push_str(&format!("Quick Answer: {}\n\n", answer));
    }

    let results = data["results"].as_array().map(Vec::as_slice).unwrap_or(&[]);
    if results.is_empty() {
        output.push_str("No results found.");
        return output;
    }

    output.push_str(&format!("Found {} results:\n\n", results.len()));
    for (i, result) in results.iter().enumerate() {
        let title = result["title"].as_str().unwrap_or("Untitled");
        let url = result["url"].as_str().unwrap_or("");
        let content = result["content"].as_str().unwrap_or("");
        output.push_str(&format!(
            "{}. {}\n   URL: {}\n   {}\n\n",
            i + 1,
            title,
            url,
            content
        ));
    }
    output.trim_end().to_string()
}
