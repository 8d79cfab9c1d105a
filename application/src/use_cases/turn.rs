//! One backend turn, including the two-phase tool protocol.

use crate::gateway::{GenerationSink, RateLimitedBackend};
use crate::ports::backend::BackendError;
use crate::ports::tool_executor::ToolExecutorPort;
use deliberation_domain::{GenerationRequest, PromptTemplate, ToolInvocation};
use tracing::{info, warn};

/// Observes a turn: streamed text plus tool activity
pub(crate) trait TurnObserver: GenerationSink {
    fn on_tool_call(&self, invocation: &ToolInvocation);
    fn on_tool_result(&self, tool_name: &str, result: &str);
}

/// What a turn sends, minus the tool definitions
pub(crate) struct TurnRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
}

/// Run one turn and return its final text.
///
/// With a tool executor the first call carries the tool definitions. If the
/// backend asks for tools, each one is executed and a second call, without
/// tools, produces the answer. When that second call yields no text the tool
/// results themselves become the answer.
pub(crate) async fn run_turn(
    backend: &RateLimitedBackend,
    tools: Option<&dyn ToolExecutorPort>,
    request: TurnRequest<'_>,
    observer: &impl TurnObserver,
) -> Result<String, BackendError> {
    let first = GenerationRequest::new(request.prompt)
        .with_system(request.system)
        .with_stream(request.stream)
        .with_tools(tools.map(|t| t.definitions()).unwrap_or_default());

    let output = backend.generate(first, observer).await?;
    let Some(executor) = tools.filter(|_| !output.tool_calls.is_empty()) else {
        return Ok(output.text);
    };

    let name = &backend.participant().display_name;
    let mut results = Vec::with_capacity(output.tool_calls.len());
    for invocation in &output.tool_calls {
        info!("{} requested tool {}", name, invocation.name);
        observer.on_tool_call(invocation);
        let result = executor.execute(invocation).await;
        observer.on_tool_result(&invocation.name, &result);
        results.push((invocation.name.clone(), result));
    }

    observer.on_restart();
    let follow_up = GenerationRequest::new(PromptTemplate::tool_follow_up_prompt(
        request.prompt,
        &results,
    ))
    .with_system(request.system)
    .with_stream(request.stream);

    match backend.generate(follow_up, observer).await {
        Ok(final_output) if !final_output.text.trim().is_empty() => Ok(final_output.text),
        Ok(_) => {
            warn!("{} gave no answer after tool use, keeping tool results", name);
            Ok(fallback_answer(&output.text, &results, observer))
        }
        Err(BackendError::Cancelled) => Err(BackendError::Cancelled),
        Err(e) => {
            warn!("{} follow-up after tool use failed: {}", name, e);
            Ok(fallback_answer(&output.text, &results, observer))
        }
    }
}

fn fallback_answer(
    initial_text: &str,
    results: &[(String, String)],
    observer: &impl TurnObserver,
) -> String {
    let mut answer = String::new();
    if !initial_text.trim().is_empty() {
        answer.push_str(initial_text.trim());
        answer.push_str("\n\n");
    }
    let rendered: Vec<String> = results
        .iter()
        .map(|(name, result)| format!("[{}]:\n{}", name, result))
        .collect();
    answer.push_str(&rendered.join("\n\n"));
    observer.on_text(&answer);
    answer
}
