//! Run Deliberation use case
//!
//! Drives the round loop: every backend answers concurrently, later rounds
//! see their peers' previous answers, consensus is scored from round 2 and
//! the loop stops early once it is reached. One backend then synthesizes
//! the final answer.

use super::turn::{TurnObserver, TurnRequest, run_turn};
use crate::config::{ConfigurationError, DeliberationConfig};
use crate::gateway::{GenerationSink, RateLimitedBackend};
use crate::ports::backend::BackendError;
use crate::ports::progress::{NoProgress, NoticeCategory, ProgressNotifier};
use crate::ports::tool_executor::ToolExecutorPort;
use crate::rate_limit::RateLimiterRegistry;
use deliberation_domain::{
    ConsensusStrategy, DomainError, HeuristicConsensusScorer, ModelResponse, Participant,
    PromptTemplate, Question, Round, Session, ToolInvocation,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that end a deliberation without a result
#[derive(Error, Debug)]
pub enum RunDeliberationError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("All backends failed to respond in every round")]
    AllBackendsFailed,

    /// The session was cancelled; `session` holds the rounds that completed
    #[error("Deliberation interrupted after {} completed rounds", .session.rounds.len())]
    Interrupted { session: Box<Session> },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl RunDeliberationError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, RunDeliberationError::Interrupted { .. })
    }
}

/// Input for the RunDeliberation use case
#[derive(Debug, Clone)]
pub struct RunDeliberationInput {
    pub question: Question,
    pub cancellation: Option<CancellationToken>,
}

impl RunDeliberationInput {
    pub fn new(question: Question) -> Self {
        Self {
            question,
            cancellation: None,
        }
    }

    /// Set a cancellation token for graceful interruption
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Activity reported by a running turn, forwarded to the progress notifier
enum TurnEvent {
    Chunk(usize, String),
    Restart(usize),
    ToolCall(usize, ToolInvocation),
    ToolResult(usize, String, String),
}

/// Observer for turns running in spawned tasks
struct ChannelObserver {
    index: usize,
    tx: mpsc::UnboundedSender<TurnEvent>,
}

impl GenerationSink for ChannelObserver {
    fn on_text(&self, text: &str) {
        let _ = self.tx.send(TurnEvent::Chunk(self.index, text.to_string()));
    }

    fn on_restart(&self) {
        let _ = self.tx.send(TurnEvent::Restart(self.index));
    }
}

impl TurnObserver for ChannelObserver {
    fn on_tool_call(&self, invocation: &ToolInvocation) {
        let _ = self
            .tx
            .send(TurnEvent::ToolCall(self.index, invocation.clone()));
    }

    fn on_tool_result(&self, tool_name: &str, result: &str) {
        let _ = self.tx.send(TurnEvent::ToolResult(
            self.index,
            tool_name.to_string(),
            result.to_string(),
        ));
    }
}

/// Observer for the synthesis turn, which runs on the caller's task
struct SynthesisObserver<'a> {
    progress: &'a dyn ProgressNotifier,
    participant: &'a Participant,
}

impl GenerationSink for SynthesisObserver<'_> {
    fn on_text(&self, text: &str) {
        self.progress.on_synthesis_chunk(text);
    }

    fn on_restart(&self) {
        self.progress.on_turn_restart(self.participant);
    }
}

impl TurnObserver for SynthesisObserver<'_> {
    fn on_tool_call(&self, invocation: &ToolInvocation) {
        self.progress.on_tool_call(self.participant, invocation);
    }

    fn on_tool_result(&self, tool_name: &str, result: &str) {
        self.progress
            .on_tool_result(self.participant, tool_name, result);
    }
}

/// Use case for running a multi-round deliberation
pub struct RunDeliberationUseCase {
    backends: Vec<Arc<RateLimitedBackend>>,
    config: DeliberationConfig,
    strategy: Arc<dyn ConsensusStrategy>,
    tool_executor: Option<Arc<dyn ToolExecutorPort>>,
    registry: Option<Arc<RateLimiterRegistry>>,
}

impl RunDeliberationUseCase {
    /// Fails when the configuration is invalid or no backend is usable
    pub fn new(
        backends: Vec<Arc<RateLimitedBackend>>,
        config: DeliberationConfig,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        if backends.is_empty() {
            return Err(ConfigurationError::NoUsableBackends);
        }
        for (i, backend) in backends.iter().enumerate() {
            let id = &backend.participant().id;
            if backends[..i].iter().any(|b| &b.participant().id == id) {
                return Err(ConfigurationError::DuplicateBackend(id.clone()));
            }
        }
        let scorer = HeuristicConsensusScorer::new(config.consensus_threshold)
            .map_err(|_| ConfigurationError::InvalidThreshold(config.consensus_threshold))?;

        Ok(Self {
            backends,
            config,
            strategy: Arc::new(scorer),
            tool_executor: None,
            registry: None,
        })
    }

    pub fn with_tool_executor(mut self, executor: Arc<dyn ToolExecutorPort>) -> Self {
        self.tool_executor = Some(executor);
        self
    }

    /// Replace the default heuristic scorer
    pub fn with_strategy(mut self, strategy: Arc<dyn ConsensusStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Registry whose usage statistics are reported when a session ends
    pub fn with_registry(mut self, registry: Arc<RateLimiterRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(&self) -> &DeliberationConfig {
        &self.config
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.backends
            .iter()
            .map(|b| b.participant().clone())
            .collect()
    }

    fn tools(&self) -> Option<&Arc<dyn ToolExecutorPort>> {
        self.tool_executor.as_ref().filter(|_| self.config.use_tools)
    }

    /// Execute the use case with default (no-op) progress
    pub async fn execute(&self, input: RunDeliberationInput) -> Result<Session, RunDeliberationError> {
        self.execute_with_progress(input, &NoProgress).await
    }

    /// Execute the use case with progress callbacks
    pub async fn execute_with_progress(
        &self,
        input: RunDeliberationInput,
        progress: &dyn ProgressNotifier,
    ) -> Result<Session, RunDeliberationError> {
        let started = Instant::now();
        let participants = self.participants();
        let mut session = Session::new(input.question.content(), participants.clone());
        let max_rounds = self.config.rounds;

        info!(
            "Starting deliberation with {} backends, up to {} rounds",
            participants.len(),
            max_rounds
        );
        progress.on_session_start(input.question.content(), &participants, max_rounds);

        for number in 1..=max_rounds {
            progress.on_round_start(number, max_rounds);
            let round_started = Instant::now();

            let Some(responses) = self
                .run_round(&session, number, &input.cancellation, progress)
                .await
            else {
                return Err(interrupted(session, started));
            };

            let mut round = Round::new(number, responses)?.with_duration(round_started.elapsed());
            info!(
                "Round {} finished: {}/{} backends responded",
                number,
                round.success_count(),
                round.responses.len()
            );

            if number >= 2 {
                let mut history = session.history();
                history.push(round.successful_texts());
                let metrics = self.strategy.analyze(&history, &participants);
                info!(
                    "Round {} convergence {:.2} ({})",
                    number, metrics.convergence_score, metrics.agreement_level
                );
                progress.on_consensus(number, &metrics);
                round.consensus = Some(metrics);
            }

            let reached = round.consensus.as_ref().is_some_and(|m| m.has_consensus);
            session.push_round(round)?;

            if reached {
                if number < max_rounds {
                    progress.on_early_exit(number);
                }
                break;
            }
        }

        if session.successful_response_count() == 0 {
            warn!("No backend produced a response in any round");
            return Err(RunDeliberationError::AllBackendsFailed);
        }

        let cancelled = self
            .synthesize(&mut session, &input.cancellation, progress)
            .await;
        if cancelled {
            return Err(interrupted(session, started));
        }

        session.total_duration = started.elapsed();
        progress.on_session_complete(&session);
        if let Some(registry) = &self.registry {
            progress.on_usage_stats(&registry.all_stats().await);
        }
        Ok(session)
    }

    /// Query every backend concurrently. `None` when cancelled.
    async fn run_round(
        &self,
        session: &Session,
        number: usize,
        cancellation: &Option<CancellationToken>,
        progress: &dyn ProgressNotifier,
    ) -> Option<Vec<ModelResponse>> {
        let tools_enabled = self.tools().is_some();
        let system = PromptTemplate::participant_system(tools_enabled);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut join_set = JoinSet::new();

        for (index, backend) in self.backends.iter().enumerate() {
            let participant = backend.participant().clone();
            let prompt = self.prompt_for(session, number, &participant.id, tools_enabled);
            progress.on_turn_start(&participant, number);
            debug!("Dispatching round {} to {}", number, participant.display_name);

            let backend = Arc::clone(backend);
            let tools = self.tools().cloned();
            let system = system.clone();
            let stream = self.config.stream;
            let observer = ChannelObserver {
                index,
                tx: tx.clone(),
            };

            join_set.spawn(async move {
                let request = TurnRequest {
                    system: &system,
                    prompt: &prompt,
                    stream,
                };
                let result = run_turn(&backend, tools.as_deref(), request, &observer).await;
                (index, result)
            });
        }
        drop(tx);

        let mut slots: Vec<Option<ModelResponse>> = vec![None; self.backends.len()];
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancelled(cancellation) => {
                    join_set.abort_all();
                    info!("Round {} cancelled", number);
                    return None;
                }
                Some(event) = rx.recv() => {
                    self.forward(event, progress);
                    continue;
                }
                joined = join_set.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };

            // Events sent just before a task finished must reach the notifier first
            while let Ok(event) = rx.try_recv() {
                self.forward(event, progress);
            }

            match joined {
                Ok((index, result)) => {
                    let participant = self.backends[index].participant();
                    let response = match result {
                        Ok(text) => {
                            info!("{} responded in round {}", participant.display_name, number);
                            ModelResponse::success(participant, number, text)
                        }
                        Err(e) => {
                            warn!("{} failed in round {}: {}", participant.display_name, number, e);
                            ModelResponse::failure(participant, number, e.to_string())
                        }
                    };
                    progress.on_turn_complete(&response);
                    slots[index] = Some(response);
                }
                Err(e) => {
                    warn!("Task join error: {}", e);
                }
            }
        }

        // A panicked task still leaves a record for its backend
        let responses = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    ModelResponse::failure(
                        self.backends[index].participant(),
                        number,
                        "Backend task ended without a result",
                    )
                })
            })
            .collect();
        Some(responses)
    }

    fn forward(&self, event: TurnEvent, progress: &dyn ProgressNotifier) {
        match event {
            TurnEvent::Chunk(index, text) => {
                progress.on_turn_chunk(self.backends[index].participant(), &text)
            }
            TurnEvent::Restart(index) => {
                progress.on_turn_restart(self.backends[index].participant())
            }
            TurnEvent::ToolCall(index, invocation) => {
                progress.on_tool_call(self.backends[index].participant(), &invocation)
            }
            TurnEvent::ToolResult(index, name, result) => {
                progress.on_tool_result(self.backends[index].participant(), &name, &result)
            }
        }
    }

    /// Round 1 asks the question alone; later rounds add every other
    /// backend's non-empty answer from the previous round.
    fn prompt_for(
        &self,
        session: &Session,
        number: usize,
        backend_id: &str,
        tools_enabled: bool,
    ) -> String {
        let Some(previous) = session.last_round().filter(|_| number > 1) else {
            return PromptTemplate::initial_prompt(&session.question, tools_enabled);
        };
        let peers: Vec<(String, String)> = previous
            .responses
            .iter()
            .filter(|r| r.backend_id != backend_id)
            .filter(|r| r.is_success() && !r.content.trim().is_empty())
            .map(|r| (r.display_name.clone(), r.content.clone()))
            .collect();
        PromptTemplate::deliberation_prompt(&session.question, number, &peers, tools_enabled)
    }

    /// Ask the first backend for the final answer. Returns true when cancelled.
    ///
    /// Uses the latest round that produced any answer. A failed synthesis is
    /// recorded on the session rather than raised.
    async fn synthesize(
        &self,
        session: &mut Session,
        cancellation: &Option<CancellationToken>,
        progress: &dyn ProgressNotifier,
    ) -> bool {
        let Some(source) = session.rounds.iter().rev().find(|r| r.success_count() > 0) else {
            return false;
        };
        let responses: Vec<(String, String)> = source
            .responses
            .iter()
            .filter(|r| r.is_success() && !r.content.trim().is_empty())
            .map(|r| (r.display_name.clone(), r.content.clone()))
            .collect();

        let synthesizer = &self.backends[0];
        let participant = synthesizer.participant();
        let tools_enabled = self.tools().is_some();
        let system = PromptTemplate::synthesizer_system(tools_enabled);
        let prompt = PromptTemplate::synthesis_prompt(&session.question, &responses, tools_enabled);

        info!("Synthesizing final answer with {}", participant.display_name);
        progress.on_synthesis_start(participant);

        let observer = SynthesisObserver {
            progress,
            participant,
        };
        let request = TurnRequest {
            system: &system,
            prompt: &prompt,
            stream: self.config.stream,
        };
        let turn = run_turn(
            synthesizer,
            self.tools().map(|t| t.as_ref()),
            request,
            &observer,
        );

        let result = tokio::select! {
            biased;
            _ = cancelled(cancellation) => return true,
            result = turn => result,
        };

        match result {
            Ok(answer) => session.final_answer = Some(answer),
            Err(BackendError::Cancelled) => return true,
            Err(e) => {
                warn!("Synthesis by {} failed: {}", participant.display_name, e);
                progress.on_notice(
                    NoticeCategory::Error,
                    &format!("Error generating consensus: {}", e),
                );
                session.synthesis_error = Some(e.to_string());
            }
        }
        false
    }
}

/// Resolves when `token` is cancelled; never, without a token
async fn cancelled(token: &Option<CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

fn interrupted(mut session: Session, started: Instant) -> RunDeliberationError {
    session.total_duration = started.elapsed();
    RunDeliberationError::Interrupted {
        session: Box::new(session),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::backend::{FragmentStream, TextGenerationBackend};
    use crate::rate_limit::RateLimiter;
    use async_trait::async_trait;
    use deliberation_domain::{
        AgreementLevel, BackendDescriptor, ConsensusMetrics, GenerationFragment,
        GenerationRequest, ProviderFamily, RateLimitConfig, RoundTexts, ToolDefinition,
    };
    use futures::StreamExt;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// How a scripted backend answers each call
    #[derive(Clone)]
    enum Script {
        /// Answer "<id> answer <n>" for the n-th call
        Echo,
        /// Always fail with a generic provider error
        Fail,
        /// Ask for a tool on the first call, answer nothing afterwards
        ToolThenSilent,
        /// Never finish
        Hang,
    }

    struct ScriptedBackend {
        descriptor: BackendDescriptor,
        script: Script,
        calls: AtomicUsize,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedBackend {
        fn new(id: &str, script: Script) -> Arc<Self> {
            let display = id.to_uppercase();
            Arc::new(Self {
                descriptor: BackendDescriptor::new(id, ProviderFamily::OpenAi, "m", display),
                script,
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.prompt.clone())
                .collect()
        }
    }

    #[async_trait]
    impl TextGenerationBackend for ScriptedBackend {
        fn descriptor(&self) -> &BackendDescriptor {
            &self.descriptor
        }

        async fn generate(&self, request: GenerationRequest) -> Result<FragmentStream, BackendError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let has_tools = !request.tools.is_empty();
            self.requests.lock().unwrap().push(request);
            let fragments = match self.script {
                Script::Echo => vec![GenerationFragment::text(format!(
                    "{} answer {}",
                    self.descriptor.id, n
                ))],
                Script::Fail => return Err(BackendError::Provider("server exploded".into())),
                Script::ToolThenSilent if has_tools => vec![GenerationFragment::tool_calls(vec![
                    ToolInvocation::new("call-1", "get_current_datetime"),
                ])],
                Script::ToolThenSilent => vec![GenerationFragment::text("")],
                Script::Hang => {
                    std::future::pending::<()>().await;
                    Vec::new()
                }
            };
            Ok(futures::stream::iter(fragments.into_iter().map(Ok)).boxed())
        }
    }

    /// Reports a fixed consensus decision
    struct FixedStrategy {
        has_consensus: bool,
        calls: AtomicUsize,
    }

    impl ConsensusStrategy for FixedStrategy {
        fn analyze(&self, _history: &[RoundTexts], _participants: &[Participant]) -> ConsensusMetrics {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ConsensusMetrics {
                convergence_score: if self.has_consensus { 0.9 } else { 0.2 },
                agreement_level: if self.has_consensus {
                    AgreementLevel::High
                } else {
                    AgreementLevel::Low
                },
                key_agreements: Vec::new(),
                key_disagreements: Vec::new(),
                has_consensus: self.has_consensus,
            }
        }

        fn threshold(&self) -> f64 {
            0.75
        }
    }

    struct ClockTool;

    #[async_trait]
    impl ToolExecutorPort for ClockTool {
        fn definitions(&self) -> Vec<ToolDefinition> {
            vec![ToolDefinition::new("get_current_datetime", "Current time")]
        }

        async fn execute(&self, _invocation: &ToolInvocation) -> String {
            "2025-01-01T00:00:00Z".to_string()
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        notices: Mutex<Vec<(NoticeCategory, String)>>,
        chunks: Mutex<Vec<(String, String)>>,
        completed: Mutex<Vec<String>>,
    }

    impl ProgressNotifier for RecordingProgress {
        fn on_notice(&self, category: NoticeCategory, message: &str) {
            self.notices
                .lock()
                .unwrap()
                .push((category, message.to_string()));
        }

        fn on_turn_chunk(&self, participant: &Participant, chunk: &str) {
            self.chunks
                .lock()
                .unwrap()
                .push((participant.id.clone(), chunk.to_string()));
        }

        fn on_turn_complete(&self, response: &ModelResponse) {
            self.completed
                .lock()
                .unwrap()
                .push(response.backend_id.clone());
        }
    }

    fn wrap(backend: Arc<ScriptedBackend>) -> Arc<RateLimitedBackend> {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            requests_per_minute: 10_000,
            tokens_per_minute: 100_000_000,
            requests_per_day: 100_000,
            max_retries: 1,
            ..RateLimitConfig::default()
        }));
        Arc::new(RateLimitedBackend::new(backend, limiter))
    }

    fn use_case(
        backends: &[Arc<ScriptedBackend>],
        rounds: usize,
        has_consensus: bool,
    ) -> RunDeliberationUseCase {
        let wrapped = backends.iter().cloned().map(wrap).collect();
        let config = DeliberationConfig::default().with_rounds(rounds);
        RunDeliberationUseCase::new(wrapped, config)
            .unwrap()
            .with_strategy(Arc::new(FixedStrategy {
                has_consensus,
                calls: AtomicUsize::new(0),
            }))
    }

    fn input() -> RunDeliberationInput {
        RunDeliberationInput::new(Question::new("What is the capital of France?").unwrap())
    }

    #[test]
    fn test_new_rejects_empty_backends() {
        let err = RunDeliberationUseCase::new(Vec::new(), DeliberationConfig::default())
            .err()
            .unwrap();
        assert_eq!(err, ConfigurationError::NoUsableBackends);
    }

    #[test]
    fn test_new_rejects_invalid_rounds() {
        let b = ScriptedBackend::new("a", Script::Echo);
        let err = RunDeliberationUseCase::new(vec![wrap(b)], DeliberationConfig::default().with_rounds(0))
            .err()
            .unwrap();
        assert_eq!(err, ConfigurationError::InvalidRounds(0));
    }

    #[tokio::test]
    async fn test_runs_every_round_without_consensus() {
        let a = ScriptedBackend::new("a", Script::Echo);
        let b = ScriptedBackend::new("b", Script::Echo);
        let session = use_case(&[a.clone(), b], 3, false)
            .execute(input())
            .await
            .unwrap();

        assert_eq!(session.rounds.len(), 3);
        assert!(session.rounds[0].consensus.is_none());
        assert!(session.rounds[1].consensus.is_some());
        assert!(session.rounds[2].consensus.is_some());
        // Three rounds plus synthesis
        assert_eq!(a.calls.load(Ordering::SeqCst), 4);
        assert_eq!(session.final_answer.as_deref(), Some("a answer 3"));
    }

    #[tokio::test]
    async fn test_stops_early_on_consensus_in_round_two() {
        let a = ScriptedBackend::new("a", Script::Echo);
        let b = ScriptedBackend::new("b", Script::Echo);
        let progress = RecordingProgress::default();
        let session = use_case(&[a, b], 5, true)
            .execute_with_progress(input(), &progress)
            .await
            .unwrap();

        assert_eq!(session.rounds.len(), 2);
        let notices = progress.notices.lock().unwrap();
        assert!(
            notices
                .iter()
                .any(|(c, m)| *c == NoticeCategory::Success && m.contains("after 2 rounds"))
        );
    }

    #[tokio::test]
    async fn test_single_round_cap_skips_consensus() {
        let a = ScriptedBackend::new("a", Script::Echo);
        let session = use_case(&[a], 1, true).execute(input()).await.unwrap();
        assert_eq!(session.rounds.len(), 1);
        assert!(session.latest_consensus().is_none());
        assert!(session.final_answer.is_some());
    }

    #[tokio::test]
    async fn test_failing_backend_is_isolated() {
        let good = ScriptedBackend::new("good", Script::Echo);
        let bad = ScriptedBackend::new("bad", Script::Fail);
        let progress = RecordingProgress::default();
        let session = use_case(&[good, bad], 2, false)
            .execute_with_progress(input(), &progress)
            .await
            .unwrap();

        assert_eq!(session.rounds.len(), 2);
        for round in &session.rounds {
            assert_eq!(round.responses.len(), 2);
            let bad = round.response("bad").unwrap();
            assert!(bad.content.is_empty());
            assert!(bad.error.as_deref().unwrap().contains("server exploded"));
            assert!(round.response("good").unwrap().is_success());
        }
        assert_eq!(progress.completed.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_all_backends_failing_is_terminal() {
        let a = ScriptedBackend::new("a", Script::Fail);
        let b = ScriptedBackend::new("b", Script::Fail);
        let err = use_case(&[a, b], 2, false).execute(input()).await.unwrap_err();
        assert!(matches!(err, RunDeliberationError::AllBackendsFailed));
    }

    #[tokio::test]
    async fn test_prompts_exclude_self_and_empty_peers() {
        let a = ScriptedBackend::new("a", Script::Echo);
        let b = ScriptedBackend::new("b", Script::Echo);
        let c = ScriptedBackend::new("c", Script::Fail);
        use_case(&[a.clone(), b.clone(), c], 2, false)
            .execute(input())
            .await
            .unwrap();

        let a_prompts = a.prompts();
        assert!(!a_prompts[0].contains("[B]"));
        assert!(!a_prompts[0].contains("OTHER AI MODELS"));

        let round_two = &a_prompts[1];
        assert!(round_two.contains("[B]:\nb answer 0"));
        assert!(!round_two.contains("[A]"));
        assert!(!round_two.contains("[C]"));

        let b_round_two = &b.prompts()[1];
        assert!(b_round_two.contains("[A]:\na answer 0"));
        assert!(!b_round_two.contains("[B]"));
    }

    #[tokio::test]
    async fn test_streamed_chunks_are_forwarded() {
        let a = ScriptedBackend::new("a", Script::Echo);
        let progress = RecordingProgress::default();
        use_case(&[a], 1, false)
            .execute_with_progress(input(), &progress)
            .await
            .unwrap();
        let chunks = progress.chunks.lock().unwrap();
        assert_eq!(*chunks, vec![("a".to_string(), "a answer 0".to_string())]);
    }

    #[tokio::test]
    async fn test_tool_result_used_when_follow_up_is_empty() {
        let a = ScriptedBackend::new("a", Script::ToolThenSilent);
        let session = use_case(&[a.clone()], 1, false)
            .with_tool_executor(Arc::new(ClockTool))
            .execute(input())
            .await
            .unwrap();

        let response = session.rounds[0].response("a").unwrap();
        assert!(response.is_success());
        assert!(response.content.contains("2025-01-01T00:00:00Z"));

        let requests = a.requests.lock().unwrap();
        assert!(!requests[0].tools.is_empty());
        // The follow-up never offers tools again
        assert!(requests[1].tools.is_empty());
        assert!(requests[1].prompt.contains("TOOL RESULTS"));
    }

    #[tokio::test]
    async fn test_tools_not_offered_when_disabled() {
        let a = ScriptedBackend::new("a", Script::Echo);
        let config = DeliberationConfig::default().with_rounds(1).with_tools(false);
        RunDeliberationUseCase::new(vec![wrap(a.clone())], config)
            .unwrap()
            .with_tool_executor(Arc::new(ClockTool))
            .execute(input())
            .await
            .unwrap();
        assert!(a.requests.lock().unwrap().iter().all(|r| r.tools.is_empty()));
    }

    #[tokio::test]
    async fn test_synthesis_failure_is_recorded() {
        // First backend synthesizes; it fails everywhere but the other answers
        let bad = ScriptedBackend::new("bad", Script::Fail);
        let good = ScriptedBackend::new("good", Script::Echo);
        let session = use_case(&[bad, good], 1, false).execute(input()).await.unwrap();
        assert!(session.final_answer.is_none());
        assert!(session.synthesis_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_round() {
        let a = ScriptedBackend::new("a", Script::Echo);
        let slow = ScriptedBackend::new("slow", Script::Hang);
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let err = use_case(&[a, slow], 3, false)
            .execute(input().with_cancellation(token))
            .await
            .unwrap_err();

        assert!(err.is_interrupted());
        let RunDeliberationError::Interrupted { session } = err else {
            unreachable!();
        };
        assert!(session.rounds.is_empty());
        assert!(session.final_answer.is_none());
    }

    #[tokio::test]
    async fn test_default_scorer_is_used() {
        let a = ScriptedBackend::new("a", Script::Echo);
        let b = ScriptedBackend::new("b", Script::Echo);
        let wrapped = vec![wrap(a), wrap(b)];
        let session = RunDeliberationUseCase::new(wrapped, DeliberationConfig::default().with_rounds(2))
            .unwrap()
            .execute(input())
            .await
            .unwrap();
        let metrics = session.latest_consensus().unwrap();
        assert!((0.0..=1.0).contains(&metrics.convergence_score));
    }
}
