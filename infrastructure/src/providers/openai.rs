//! OpenAI-compatible chat completions backend (OpenAI, Grok).

use super::http::{self, join_url};
use super::sse::{SseHandler, sse_fragments};
use async_trait::async_trait;
use deliberation_application::{BackendError, FragmentStream, TextGenerationBackend};
use deliberation_domain::{
    BackendDescriptor, GenerationFragment, GenerationRequest, ProviderFamily, ResolvedBackend,
    ToolDefinition, ToolInvocation,
};
use reqwest::Client;
use serde_json::{Value, json};
use std::collections::BTreeMap;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROK_BASE_URL: &str = "https://api.x.ai/v1";

/// Backend speaking the `/chat/completions` protocol
pub struct OpenAiCompatibleBackend {
    client: Client,
    descriptor: BackendDescriptor,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatibleBackend {
    pub fn new(client: Client, resolved: ResolvedBackend) -> Self {
        let default_base = match resolved.descriptor.provider {
            ProviderFamily::Grok => GROK_BASE_URL,
            _ => OPENAI_BASE_URL,
        };
        let base_url = resolved
            .descriptor
            .base_url
            .clone()
            .unwrap_or_else(|| default_base.to_string());
        Self {
            client,
            descriptor: resolved.descriptor,
            api_key: resolved.credential,
            base_url,
        }
    }

    fn body(&self, request: &GenerationRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_message {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let mut body = json!({
            "model": self.descriptor.model_name,
            "messages": messages,
            "temperature": self.descriptor.temperature,
            "max_tokens": self.descriptor.max_tokens,
            "stream": request.stream,
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.iter().map(tool_schema).collect());
        }
        body
    }
}

fn tool_schema(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters_schema(),
        }
    })
}

/// Fragments of a complete (non-streamed) completion
fn parse_completion(body: &Value) -> GenerationFragment {
    let message = &body["choices"][0]["message"];
    let text = message["content"].as_str().map(str::to_string);
    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .map(|call| {
                    ToolInvocation::from_json_arguments(
                        call["id"].as_str().unwrap_or_default(),
                        call["function"]["name"].as_str().unwrap_or_default(),
                        call["function"]["arguments"].as_str().unwrap_or("{}"),
                    )
                })
                .collect()
        })
        .unwrap_or_default();
    GenerationFragment { text, tool_calls }
}

/// Tool call assembled from streamed deltas
#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Streams text immediately; tool calls arrive in pieces and are emitted at the end
#[derive(Debug, Default)]
struct ChatStreamHandler {
    calls: BTreeMap<u64, PartialCall>,
}

impl SseHandler for ChatStreamHandler {
    fn on_event(&mut self, data: &str) -> Result<Vec<GenerationFragment>, BackendError> {
        let event: Value = serde_json::from_str(data)
            .map_err(|e| BackendError::Provider(format!("Malformed stream event: {}", e)))?;
        if let Some(message) = event.pointer("/error/message").and_then(Value::as_str) {
            return Err(BackendError::Provider(message.to_string()));
        }

        let delta = &event["choices"][0]["delta"];
        if let Some(calls) = delta["tool_calls"].as_array() {
            for call in calls {
                let index = call["index"].as_u64().unwrap_or(0);
                let partial = self.calls.entry(index).or_default();
                if let Some(id) = call["id"].as_str() {
                    partial.id = id.to_string();
                }
                if let Some(name) = call["function"]["name"].as_str() {
                    partial.name.push_str(name);
                }
                if let Some(args) = call["function"]["arguments"].as_str() {
                    partial.arguments.push_str(args);
                }
            }
        }

        Ok(match delta["content"].as_str() {
            Some(text) if !text.is_empty() => vec![GenerationFragment::text(text)],
            _ => Vec::new(),
        })
    }

    fn finish(&mut self) -> Vec<GenerationFragment> {
        let calls: Vec<ToolInvocation> = std::mem::take(&mut self.calls)
            .into_values()
            .filter(|c| !c.name.is_empty())
            .map(|c| ToolInvocation::from_json_arguments(c.id, c.name, &c.arguments))
            .collect();
        if calls.is_empty() {
            Vec::new()
        } else {
            vec![GenerationFragment::tool_calls(calls)]
        }
    }
}

#[async_trait]
impl TextGenerationBackend for OpenAiCompatibleBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn generate(&self, request: GenerationRequest) -> Result<FragmentStream, BackendError> {
        let name = &self.descriptor.display_name;
        let builder = self
            .client
            .post(join_url(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&self.body(&request));
        let response = http::send(builder, name).await?;

        if request.stream {
            Ok(sse_fragments(response, ChatStreamHandler::default()))
        } else {
            let body = http::json_body(response, name).await?;
            Ok(http::single(parse_completion(&body)))
        }
    }
}
