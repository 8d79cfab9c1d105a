//! Server-Sent Events plumbing shared by the streaming providers.
//!
//! [`SseDecoder`] splits a byte stream into event payloads; [`sse_fragments`]
//! turns an HTTP response body into a [`FragmentStream`] using a
//! provider-specific [`SseHandler`].

use deliberation_application::{BackendError, FragmentStream};
use deliberation_domain::GenerationFragment;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::collections::VecDeque;

/// Incremental SSE parser: bytes in, `data` payloads out
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the payloads of every event it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some((end, separator)) = find_event_end(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..end + separator).collect();
            if let Some(data) = event_data(&raw[..end]) {
                events.push(data);
            }
        }
        events
    }

    /// Payload of a trailing event not followed by a blank line
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        event_data(&raw)
    }
}

/// Position of the first blank line and the length of the separator
fn find_event_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Joined `data:` lines of one event; `None` when it carries no data
fn event_data(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let lines: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Provider-specific interpretation of SSE payloads
pub trait SseHandler: Send + 'static {
    /// Handle one event payload
    fn on_event(&mut self, data: &str) -> Result<Vec<GenerationFragment>, BackendError>;

    /// Flush anything held back until the stream ends
    fn finish(&mut self) -> Vec<GenerationFragment> {
        Vec::new()
    }
}

struct SseState<H> {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    handler: H,
    pending: VecDeque<Result<GenerationFragment, BackendError>>,
    finished: bool,
}

impl<H: SseHandler> SseState<H> {
    /// Queue the outcome of one payload. Returns false once the stream must stop.
    fn accept(&mut self, data: &str) -> bool {
        if data.trim() == "[DONE]" {
            self.flush();
            return false;
        }
        match self.handler.on_event(data) {
            Ok(fragments) => {
                self.pending
                    .extend(fragments.into_iter().filter(|f| !f.is_empty()).map(Ok));
                true
            }
            Err(e) => {
                self.pending.push_back(Err(e));
                false
            }
        }
    }

    fn flush(&mut self) {
        let rest = self.handler.finish();
        self.pending
            .extend(rest.into_iter().filter(|f| !f.is_empty()).map(Ok));
        self.finished = true;
    }
}

/// Stream the fragments of an SSE response body
pub fn sse_fragments<H: SseHandler>(response: reqwest::Response, handler: H) -> FragmentStream {
    let state = SseState {
        body: response.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed(),
        decoder: SseDecoder::new(),
        handler,
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    for data in state.decoder.push(&chunk) {
                        if !state.accept(&data) {
                            state.finished = true;
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    let error = BackendError::Provider(format!("Stream interrupted: {}", e));
                    return Some((Err(error), state));
                }
                None => {
                    if let Some(data) = state.decoder.finish()
                        && !state.accept(&data)
                    {
                        state.finished = true;
                        continue;
                    }
                    state.flush();
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_handles_split_events() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"a\":").is_empty());
        let events = decoder.push(b"1}\n\ndata: second\n\n");
        assert_eq!(events, vec!["{\"a\":1}", "second"]);
    }

    #[test]
    fn test_decoder_skips_comments_and_event_names() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\n\nevent: message_start\r\ndata: x\r\n\r\n");
        assert_eq!(events, vec!["x"]);
    }

    #[test]
    fn test_decoder_joins_multiline_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: one\ndata: two\n\n");
        assert_eq!(events, vec!["one\ntwo"]);
    }

    #[test]
    fn test_decoder_finish_returns_trailing_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("tail"));
        assert_eq!(decoder.finish(), None);
    }
}
