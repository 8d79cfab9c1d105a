//! Google Gemini `generateContent` backend.

use super::http::{self, join_url};
use super::sse::{SseHandler, sse_fragments};
use async_trait::async_trait;
use deliberation_application::{BackendError, FragmentStream, TextGenerationBackend};
use deliberation_domain::{
    BackendDescriptor, GenerationFragment, GenerationRequest, ResolvedBackend, ToolInvocation,
};
use reqwest::Client;
use serde_json::{Value, json};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GoogleBackend {
    client: Client,
    descriptor: BackendDescriptor,
    api_key: String,
    base_url: String,
}

impl GoogleBackend {
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

    fn url(&self, stream: bool) -> String {
        let method = if stream {
            "streamGenerateContent?alt=sse"
        } else {
            "generateContent"
        };
        join_url(
            &self.base_url,
            &format!("models/{}:{}", self.descriptor.model_name, method),
        )
    }

    fn body(&self, request: &GenerationRequest) -> Value {
        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": {
                "temperature": self.descriptor.temperature,
                "maxOutputTokens": self.descriptor.max_tokens,
            },
        });
        if let Some(system) = &request.system_message {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters_schema(),
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }
        body
    }
}

/// Fragment of one `GenerateContentResponse` (whole or streamed chunk).
///
/// `next_call` numbers function calls, which carry no provider id.
fn parse_chunk(body: &Value, next_call: &mut usize) -> Result<GenerationFragment, BackendError> {
    if let Some(reason) = body.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
        return Err(BackendError::Provider(format!(
            "Response blocked by safety filter ({})",
            reason
        )));
    }

    let candidate = &body["candidates"][0];
    let mut fragment = GenerationFragment::default();
    for part in candidate["content"]["parts"].as_array().into_iter().flatten() {
        if let Some(text) = part["text"].as_str() {
            fragment.text.get_or_insert_with(String::new).push_str(text);
        }
        if let Some(call) = part.get("functionCall") {
            *next_call += 1;
            let arguments = match &call["args"] {
                Value::Object(map) => map.clone().into_iter().collect(),
                _ => Default::default(),
            };
            fragment.tool_calls.push(ToolInvocation {
                id: format!("call-{}", next_call),
                name: call["name"].as_str().unwrap_or_default().to_string(),
                arguments,
            });
        }
    }

    if fragment.is_empty() && candidate["finishReason"] == "SAFETY" {
        return Err(BackendError::Provider(
            "Response blocked by safety filter (SAFETY)".to_string(),
        ));
    }
    Ok(fragment)
}

#[derive(Default)]
struct GeminiStreamHandler {
    calls: usize,
}

impl SseHandler for GeminiStreamHandler {
    fn on_event(&mut self, data: &str) -> Result<Vec<GenerationFragment>, BackendError> {
        let chunk: Value = serde_json::from_str(data)
            .map_err(|e| BackendError::Provider(format!("Malformed stream event: {}", e)))?;
        if let Some(message) = chunk.pointer("/error/message").and_then(Value::as_str) {
            return Err(BackendError::Provider(message.to_string()));
        }
        Ok(vec![parse_chunk(&chunk, &mut self.calls)?])
    }
}

#[async_trait]
impl TextGenerationBackend for GoogleBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn generate(&self, request: GenerationRequest) -> Result<FragmentStream, BackendError> {
        let name = &self.descriptor.display_name;
        let builder = self
            .client
            .post(self.url(request.stream))
            .header("x-goog-api-key", &self.api_key)
            .json(&self.body(&request));
        let response = http::send(builder, name).await?;

        if request.stream {
            Ok(sse_fragments(response, GeminiStreamHandler::default()))
        } else {
            let body = http::json_body(response, name).await?;
            Ok(http::single(parse_chunk(&body, &mut 0)?))
        }
    }
}
