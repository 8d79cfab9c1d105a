//! Anthropic Messages API backend.

use super::http::{self, join_url};
use super::sse::{SseHandler, sse_fragments};
use async_trait::async_trait;
use deliberation_application::{BackendError, FragmentStream, TextGenerationBackend};
use deliberation_domain::{
    BackendDescriptor, GenerationFragment, GenerationRequest, ResolvedBackend, ToolInvocation,
};
use reqwest::Client;
use serde_json::{Value, json};

const BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicBackend {
    client: Client,
    descriptor: BackendDescriptor,
    api_key: String,
    base_url: String,
}

impl AnthropicBackend {
    pub fn new(client: Client, resolved: ResolvedBackend) -> Self {
        let base_url = resolved
            .descriptor
            .base_url
            .clone()
            .unwrap_or_else(|| BASE_URL.to_string());
        Self {
            client,
            descriptor: resolved.descriptor,
            api_key: resolved.credential,
            base_url,
        }
    }

    fn body(&self, request: &GenerationRequest) -> Value {
        let mut body = json!({
            "model": self.descriptor.model_name,
            "max_tokens": self.descriptor.max_tokens,
            "temperature": self.descriptor.temperature,
            "messages": [{ "role": "user", "content": request.prompt }],
            "stream": request.stream,
        });
        if let Some(system) = &request.system_message {
            body["system"] = json!(system);
        }
        if !request.tools.is_empty() {
            body["tools"] = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.parameters_schema(),
                    })
                })
                .collect();
        }
        body
    }
}

fn tool_use(block: &Value, input: Value) -> ToolInvocation {
    let arguments = match input {
        Value::Object(map) => map.into_iter().collect(),
        _ => Default::default(),
    };
    ToolInvocation {
        id: block["id"].as_str().unwrap_or_default().to_string(),
        name: block["name"].as_str().unwrap_or_default().to_string(),
        arguments,
    }
}

fn parse_message(body: &Value) -> GenerationFragment {
    let mut fragment = GenerationFragment::default();
    for block in body["content"].as_array().into_iter().flatten() {
        match block["type"].as_str() {
            Some("text") => {
                let text = block["text"].as_str().unwrap_or_default();
                fragment.text.get_or_insert_with(String::new).push_str(text);
            }
            Some("tool_use") => fragment
                .tool_calls
                .push(tool_use(block, block["input"].clone())),
            _ => {}
        }
    }
    fragment
}

/// Tool-use block whose JSON input is still streaming
struct OpenToolUse {
    block: Value,
    input_json: String,
}

/// Handles `content_block_*` events; tool calls are emitted when their block stops
#[derive(Default)]
struct MessageStreamHandler {
    open: Option<OpenToolUse>,
}

impl SseHandler for MessageStreamHandler {
    fn on_event(&mut self, data: &str) -> Result<Vec<GenerationFragment>, BackendError> {
        let event: Value = serde_json::from_str(data)
            .map_err(|e| BackendError::Provider(format!("Malformed stream event: {}", e)))?;

        match event["type"].as_str() {
            Some("content_block_start") => {
                let block = &event["content_block"];
                if block["type"] == "tool_use" {
                    self.open = Some(OpenToolUse {
                        block: block.clone(),
                        input_json: String::new(),
                    });
                }
            }
            Some("content_block_delta") => {
                let delta = &event["delta"];
                match delta["type"].as_str() {
                    Some("text_delta") => {
                        let text = delta["text"].as_str().unwrap_or_default();
                        return Ok(vec![GenerationFragment::text(text)]);
                    }
                    Some("input_json_delta") => {
                        if let Some(open) = &mut self.open {
                            open.input_json
                                .push_str(delta["partial_json"].as_str().unwrap_or_default());
                        }
                    }
                    _ => {}
                }
            }
            Some("content_block_stop") => {
                if let Some(open) = self.open.take() {
                    let input = serde_json::from_str(&open.input_json).unwrap_or(Value::Null);
                    return Ok(vec![GenerationFragment::tool_calls(vec![tool_use(
                        &open.block,
                        input,
                    )])]);
                }
            }
            Some("error") => {
                let message = event
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("stream error");
                let kind = event.pointer("/error/type").and_then(Value::as_str);
                return Err(match kind {
                    Some("rate_limit_error") => BackendError::RateLimited(message.to_string()),
                    _ => BackendError::Provider(message.to_string()),
                });
            }
            _ => {}
        }
        Ok(Vec::new())
    }
}

#[async_trait]
impl TextGenerationBackend for AnthropicBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn generate(&self, request: GenerationRequest) -> Result<FragmentStream, BackendError> {
        let name = &self.descriptor.display_name;
        let builder = self
            .client
            .post(join_url(&self.base_url, "v1/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.body(&request));
        let response = http::send(builder, name).await?;

        if request.stream {
            Ok(sse_fragments(response, MessageStreamHandler::default()))
        } else {
            let body = http::json_body(response, name).await?;
            Ok(http::single(parse_message(&body)))
        }
    }
}
