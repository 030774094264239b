//! Model adapter that runs tool calls through the plugin registry.
//!
//! The wrapped [`Provider`] streams text and, at the end of a turn, the
//! assembled tool calls. Each call is executed in order and reported to the
//! conversation loop as a running chunk followed by a completed chunk
//! carrying the serialized [`PluginOutput`].

use async_trait::async_trait;
use futures::FutureExt;
use quill_core::chunk::Chunk;
use quill_core::error::ProviderError;
use quill_core::plugin::{PluginOutput, PluginRegistry};
use quill_core::provider::*;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

type ChunkSender = mpsc::Sender<Result<Chunk, ProviderError>>;

pub struct PluginModelAdapter {
    provider: Arc<dyn Provider>,
    registry: Arc<PluginRegistry>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl PluginModelAdapter {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<PluginRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            registry,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Parse the model's argument string. An empty string means no arguments.
fn parse_arguments(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw).map_err(|e| e.to_string())
}

/// Execute one tool call, emitting its running and completed chunks.
/// Returns `false` once the receiving side has gone away.
///
/// A plugin that panics is reported as a completed chunk with no result.
/// If the receiver is dropped mid-execution (the turn was cancelled), the
/// plugin future is dropped with it.
async fn run_tool_call(registry: &PluginRegistry, call: ToolCallRequest, tx: &ChunkSender) -> bool {
    let plugin = registry.get(&call.name);
    let parsed = parse_arguments(&call.arguments);
    let args = parsed.as_ref().cloned().unwrap_or(Value::Null);

    let running = match plugin {
        Some(p) => p.describe_running(&args),
        None => format!("Running {}...", call.name),
    };
    if tx
        .send(Ok(Chunk::tool_running(&call.name, running)))
        .await
        .is_err()
    {
        return false;
    }

    let output = match parsed {
        Ok(args) => {
            let execution = AssertUnwindSafe(registry.execute(&call.name, args)).catch_unwind();
            tokio::select! {
                _ = tx.closed() => {
                    debug!(tool = %call.name, id = %call.id, "Turn dropped, abandoning tool call");
                    return false;
                }
                result = execution => match result {
                    Ok(output) => Some(output),
                    Err(_) => {
                        warn!(tool = %call.name, id = %call.id, "Plugin panicked");
                        None
                    }
                },
            }
        }
        Err(e) => {
            warn!(tool = %call.name, error = %e, "Model sent malformed tool arguments");
            Some(PluginOutput::failed(format!(
                "Invalid arguments for {}: {e}",
                call.name
            )))
        }
    };

    let completed = match (plugin, &output) {
        (Some(p), Some(output)) => p.describe_completed(&args, output),
        _ => format!("Failed {}", call.name),
    };
    debug!(
        tool = %call.name,
        id = %call.id,
        success = output.as_ref().is_some_and(|o| o.success),
        "Tool call finished"
    );

    tx.send(Ok(Chunk::tool_completed(
        call.name,
        completed,
        output.map(|o| o.to_result_string()),
    )))
    .await
    .is_ok()
}

#[async_trait]
impl ModelAdapter for PluginModelAdapter {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn generate(&self, request: GenerateRequest) -> Result<ChunkReceiver, ProviderError> {
        let provider_request = ProviderRequest {
            model: self.model.clone(),
            tools: request.plugins.iter().map(ToolDefinition::from).collect(),
            messages: request.messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut upstream = self.provider.stream(provider_request).await?;
        let (tx, rx) = mpsc::channel(64);
        let registry = self.registry.clone();

        tokio::spawn(async move {
            let mut calls = Vec::new();

            while let Some(item) = upstream.recv().await {
                let chunk = match item {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };
                if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                    if tx.send(Ok(Chunk::content(text))).await.is_err() {
                        return;
                    }
                }
                calls.extend(chunk.tool_calls);
                if chunk.done {
                    if let Some(usage) = chunk.usage {
                        debug!(
                            prompt_tokens = usage.prompt_tokens,
                            completion_tokens = usage.completion_tokens,
                            "Model turn usage"
                        );
                    }
                    break;
                }
            }

            for call in calls {
                if !run_tool_call(&registry, call, &tx).await {
                    return;
                }
            }
        });

        Ok(rx)
    }
}
