//! The conversation loop.
//!
//! One call to [`Orchestrator::send_message`] drives model turns until the
//! model answers without touching a tool:
//!
//! 1. **Build** the message list: system prompt, converted history, the new
//!    user message
//! 2. **Generate**: stream one model turn, pushing text and tool progress
//!    through the [`FlushController`]
//! 3. **If tool chunks**: append one `Tool result from ...` user message per
//!    completed tool and loop back to step 2
//! 4. **Otherwise** return the accumulated response
//!
//! A failure at any point still flushes what was buffered and hands the
//! partial response back in a [`TurnError`].

use std::sync::Arc;
use std::time::Duration;

use quill_config::AgentConfig;
use quill_core::chunk::{Chunk, ToolResult, ToolState};
use quill_core::display::DisplaySink;
use quill_core::message::{DisplayEntry, Message};
use quill_core::plugin::{PluginDescriptor, PluginRegistry};
use quill_core::provider::{GenerateRequest, ModelAdapter};
use quill_core::Error;
use quill_telemetry::{Attributes, NoopTelemetry, SpanId, SpanStatus, Telemetry};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::to_model_messages;
use crate::flush::{DEFAULT_FLUSH_INTERVAL, DEFAULT_HEIGHT_MARGIN, FlushController};
use crate::turn::{Reply, ToolFault, TurnError, TurnState};

/// Loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Model turns allowed per message; 0 disables the guard.
    pub max_iterations: u32,
    pub flush_interval: Duration,
    pub height_margin: u16,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            height_margin: DEFAULT_HEIGHT_MARGIN,
        }
    }
}

impl From<&AgentConfig> for OrchestratorConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            flush_interval: Duration::from_millis(config.flush_interval_ms),
            height_margin: config.height_margin,
        }
    }
}

/// Telemetry calls that log and swallow failures.
struct Spans<'a>(&'a dyn Telemetry);

impl Spans<'_> {
    fn start(&self, name: &str, parent: Option<&str>, attributes: Attributes) -> Option<SpanId> {
        self.0
            .start_span(name, parent, attributes)
            .inspect_err(|e| warn!(span = name, error = %e, "Telemetry start_span failed"))
            .ok()
    }

    fn set(&self, span: Option<&str>, key: &str, value: Value) {
        if let Some(span) = span {
            if let Err(e) = self.0.set_attribute(span, key, value) {
                warn!(key, error = %e, "Telemetry set_attribute failed");
            }
        }
    }

    fn event(&self, span: Option<&str>, name: &str, attributes: Attributes) {
        if let Some(span) = span {
            if let Err(e) = self.0.add_event(span, name, attributes) {
                warn!(event = name, error = %e, "Telemetry add_event failed");
            }
        }
    }

    fn end(&self, span: Option<&str>, status: SpanStatus) {
        if let Some(span) = span {
            if let Err(e) = self.0.end_span(span, status) {
                warn!(error = %e, "Telemetry end_span failed");
            }
        }
    }
}

fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}

/// Mutable accumulators for one `send_message`.
#[derive(Default)]
struct Progress {
    response: String,
    iterations: u32,
    tool_calls: u32,
    faults: Vec<ToolFault>,
}

/// What one model turn produced.
#[derive(Default)]
struct Iteration {
    response: String,
    has_tool_calls: bool,
    results: Vec<ToolResult>,
    cancelled: bool,
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Drives model turns and tool round-trips for one conversation.
pub struct Orchestrator {
    adapter: Arc<dyn ModelAdapter>,
    registry: Arc<PluginRegistry>,
    system_prompt: String,
    config: OrchestratorConfig,
    telemetry: Arc<dyn Telemetry>,
    state: watch::Sender<TurnState>,
}

impl Orchestrator {
    pub fn new(
        adapter: Arc<dyn ModelAdapter>,
        registry: Arc<PluginRegistry>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(TurnState::Idle);
        Self {
            adapter,
            registry,
            system_prompt: system_prompt.into(),
            config: OrchestratorConfig::default(),
            telemetry: Arc::new(NoopTelemetry),
            state,
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum number of model turns per message (0 = unlimited).
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Watch the loop's state.
    pub fn subscribe(&self) -> watch::Receiver<TurnState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> TurnState {
        *self.state.borrow()
    }

    fn set_state(&self, state: TurnState) {
        self.state.send_replace(state);
    }

    /// Send one user message and run the loop to completion.
    ///
    /// Streamed text and `[Tool: name] status` progress lines go to `sink`;
    /// only model text ends up in [`Reply::text`]. Firing `cancel` stops the
    /// loop and returns what was produced with `cancelled` set.
    pub async fn send_message(
        &self,
        user_text: &str,
        prior_history: &[DisplayEntry],
        sink: &dyn DisplaySink,
        cancel: &CancellationToken,
    ) -> Result<Reply, TurnError> {
        self.set_state(TurnState::Sending);
        let spans = Spans(self.telemetry.as_ref());
        let model = self.adapter.name().to_string();

        let mut messages = Vec::with_capacity(prior_history.len() + 2);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(to_model_messages(prior_history));
        messages.push(Message::user(user_text));

        info!(
            model = %model,
            history = prior_history.len(),
            "Processing message"
        );

        let chat_span = spans.start(
            "chat",
            None,
            attrs(json!({
                "gen_ai.operation.name": "chat",
                "gen_ai.request.model": model,
                "input-json": json!({ "message": user_text }).to_string(),
                "context-json": json!({
                    "model": model,
                    "conversationLength": prior_history.len(),
                })
                .to_string(),
            })),
        );

        let plugins = self.registry.descriptors();
        let mut flush = FlushController::new(self.config.flush_interval, self.config.height_margin);
        let mut progress = Progress::default();

        let outcome = self
            .run(
                &mut messages,
                &plugins,
                sink,
                cancel,
                &mut flush,
                &mut progress,
                chat_span.as_deref(),
            )
            .await;

        match outcome {
            Ok(cancelled) => {
                spans.set(
                    chat_span.as_deref(),
                    "output-json",
                    json!({ "response": progress.response }).to_string().into(),
                );
                spans.end(chat_span.as_deref(), SpanStatus::Ok);
                self.set_state(if cancelled {
                    TurnState::Cancelled
                } else {
                    TurnState::Done
                });
                info!(
                    iterations = progress.iterations,
                    tool_calls = progress.tool_calls,
                    faults = progress.faults.len(),
                    cancelled,
                    "Message processed"
                );
                Ok(Reply {
                    text: progress.response,
                    iterations: progress.iterations,
                    tool_calls: progress.tool_calls,
                    faults: progress.faults,
                    cancelled,
                })
            }
            Err(source) => {
                spans.end(chat_span.as_deref(), SpanStatus::error(source.to_string()));
                self.set_state(TurnState::Failed);
                warn!(
                    error = %source,
                    iterations = progress.iterations,
                    partial_len = progress.response.len(),
                    "Message failed"
                );
                Err(TurnError {
                    partial: progress.response,
                    source,
                })
            }
        }
    }

    /// The loop proper. Returns whether it was cancelled.
    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        messages: &mut Vec<Message>,
        plugins: &[PluginDescriptor],
        sink: &dyn DisplaySink,
        cancel: &CancellationToken,
        flush: &mut FlushController,
        progress: &mut Progress,
        chat_span: Option<&str>,
    ) -> Result<bool, Error> {
        let spans = Spans(self.telemetry.as_ref());
        let model = self.adapter.name();

        loop {
            let iteration = progress.iterations;
            let max = self.config.max_iterations;
            if max > 0 && iteration >= max {
                warn!(limit = max, "Max tool iterations reached");
                flush.finish(sink);
                return Err(Error::ToolLoopExceeded { limit: max });
            }

            self.set_state(TurnState::Generating { iteration });
            debug!(iteration, messages = messages.len(), "Loop iteration");

            let input: Vec<Value> = messages
                .iter()
                .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
                .collect();
            let gen_span = spans.start(
                &format!("generate.{iteration}"),
                chat_span,
                attrs(json!({
                    "gen_ai.operation.name": "generate",
                    "gen_ai.request.model": model,
                    "llm.iteration": iteration,
                    "llm.message_count": messages.len(),
                    "input-json": Value::Array(input.clone()).to_string(),
                })),
            );
            for message in &input {
                let role = message["role"].as_str().unwrap_or("user");
                spans.event(
                    gen_span.as_deref(),
                    &format!("gen_ai.{role}.message"),
                    attrs(json!({
                        "gen_ai.message.role": role,
                        "gen_ai.message.content": message["content"],
                    })),
                );
            }

            let result = self
                .iterate(messages, plugins, sink, cancel, flush, progress, gen_span.as_deref())
                .await;
            flush.finish(sink);
            progress.iterations += 1;
            debug!(iteration, flushes = flush.flush_count(), "Model turn streamed");

            let step = match result {
                Ok(step) => step,
                Err(e) => {
                    spans.end(gen_span.as_deref(), SpanStatus::error(e.to_string()));
                    return Err(e);
                }
            };

            spans.set(
                gen_span.as_deref(),
                "output-json",
                json!([{ "role": "assistant", "content": step.response }])
                    .to_string()
                    .into(),
            );
            spans.set(gen_span.as_deref(), "llm.has_tool_calls", step.has_tool_calls.into());
            spans.end(gen_span.as_deref(), SpanStatus::Ok);

            if step.cancelled {
                info!(iteration, "Message cancelled");
                return Ok(true);
            }
            if !step.has_tool_calls {
                return Ok(false);
            }

            self.set_state(TurnState::ToolDispatch { iteration });
            debug!(iteration, results = step.results.len(), "Feeding tool results back");
            for result in &step.results {
                messages.push(Message::user(result.to_message_text()));
            }
        }
    }

    /// Stream one model turn into the flush controller.
    #[allow(clippy::too_many_arguments)]
    async fn iterate(
        &self,
        messages: &[Message],
        plugins: &[PluginDescriptor],
        sink: &dyn DisplaySink,
        cancel: &CancellationToken,
        flush: &mut FlushController,
        progress: &mut Progress,
        gen_span: Option<&str>,
    ) -> Result<Iteration, Error> {
        let spans = Spans(self.telemetry.as_ref());
        let mut step = Iteration::default();
        let iteration = progress.iterations;

        let request = GenerateRequest {
            messages: messages.to_vec(),
            plugins: plugins.to_vec(),
        };
        let mut chunks = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                step.cancelled = true;
                return Ok(step);
            }
            generated = self.adapter.generate(request) => generated?,
        };

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    step.cancelled = true;
                    return Ok(step);
                }
                _ = wait_until(flush.deadline()) => {
                    flush.on_deadline(sink);
                }
                item = chunks.recv() => {
                    let chunk = match item {
                        None => return Ok(step),
                        Some(Ok(chunk)) => chunk,
                        Some(Err(e)) => return Err(e.into()),
                    };
                    match chunk {
                        Chunk::Content { text } => {
                            step.response.push_str(&text);
                            progress.response.push_str(&text);
                            flush.push(&text);
                        }
                        Chunk::Tool { name, state, status, result } => {
                            step.has_tool_calls = true;
                            flush.push(&format!("[Tool: {name}] {status}\n"));
                            if state == ToolState::Running {
                                continue;
                            }
                            progress.tool_calls += 1;
                            spans.event(
                                gen_span,
                                "tool.completed",
                                attrs(json!({ "tool.name": name })),
                            );
                            match result {
                                Some(result) => step.results.push(ToolResult::new(name, result)),
                                None => {
                                    let fault = ToolFault { iteration, tool: name.clone() };
                                    warn!(error = %fault.to_error(), iteration, "Tool fault");
                                    spans.event(
                                        gen_span,
                                        "tool.fault",
                                        attrs(json!({ "tool.name": name })),
                                    );
                                    progress.faults.push(fault);
                                    step.results.push(ToolResult::missing(name));
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
