//! Rate-limited access to a single backend.
//!
//! [`RateLimitedBackend`] is the only way the use case talks to a
//! [`TextGenerationBackend`]: every call is admitted by the backend's
//! [`RateLimiter`], retried with backoff, and recorded on success.

use crate::ports::backend::{BackendError, TextGenerationBackend};
use crate::rate_limit::{RateLimitError, RateLimiter, retry_with_backoff};
use deliberation_domain::{
    BackendDescriptor, GenerationRequest, Participant, ToolInvocation, tokens_used,
};
use futures::StreamExt;
use std::sync::Arc;
use tracing::debug;

impl From<RateLimitError> for BackendError {
    fn from(error: RateLimitError) -> Self {
        match error {
            RateLimitError::DailyLimitExceeded { resets_in } => {
                BackendError::DailyLimitExceeded { resets_in }
            }
        }
    }
}

/// Receives streamed text while a call is in flight
pub trait GenerationSink: Send + Sync {
    fn on_text(&self, text: &str);

    /// The previous attempt failed and is being retried; text so far is void
    fn on_restart(&self) {}
}

/// Sink that discards everything
pub struct NoSink;

impl GenerationSink for NoSink {
    fn on_text(&self, _text: &str) {}
}

/// Everything a completed call produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOutput {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
}

/// A backend paired with the limiter of its quota pool
#[derive(Clone)]
pub struct RateLimitedBackend {
    backend: Arc<dyn TextGenerationBackend>,
    limiter: Arc<RateLimiter>,
    participant: Participant,
}

impl RateLimitedBackend {
    pub fn new(backend: Arc<dyn TextGenerationBackend>, limiter: Arc<RateLimiter>) -> Self {
        let descriptor = backend.descriptor();
        let participant = Participant::new(&descriptor.id, &descriptor.display_name);
        Self {
            backend,
            limiter,
            participant,
        }
    }

    pub fn descriptor(&self) -> &BackendDescriptor {
        self.backend.descriptor()
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run one generation call to completion.
    ///
    /// Each attempt is bounded by the backend's configured timeout.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        sink: &dyn GenerationSink,
    ) -> Result<GenerationOutput, BackendError> {
        let descriptor = self.backend.descriptor();
        let estimated = request.estimated_tokens(descriptor.max_tokens);
        let admission = self.limiter.acquire(estimated).await?;

        let timeout = descriptor.timeout();
        let result = retry_with_backoff(self.limiter.config(), &descriptor.display_name, |attempt| {
            let request = request.clone();
            async move {
                if attempt > 0 {
                    sink.on_restart();
                }
                tokio::time::timeout(timeout, self.collect(request, sink))
                    .await
                    .map_err(|_| BackendError::Timeout(timeout))?
            }
        })
        .await;
        let output = match result {
            Ok(output) => output,
            Err(error) => {
                self.limiter.release(admission).await;
                return Err(error);
            }
        };

        let used = tokens_used(request.input_chars(), output.text.chars().count());
        self.limiter.commit(admission, used).await;
        debug!(
            "{} produced {} chars and {} tool calls ({} tokens recorded)",
            descriptor.display_name,
            output.text.len(),
            output.tool_calls.len(),
            used
        );
        Ok(output)
    }

    async fn collect(
        &self,
        request: GenerationRequest,
        sink: &dyn GenerationSink,
    ) -> Result<GenerationOutput, BackendError> {
        let mut stream = self.backend.generate(request).await?;
        let mut output = GenerationOutput::default();
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            if let Some(text) = fragment.text.filter(|t| !t.is_empty()) {
                sink.on_text(&text);
                output.text.push_str(&text);
            }
            output.tool_calls.extend(fragment.tool_calls);
        }
        Ok(output)
    }
}
