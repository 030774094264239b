//! Offline model adapter for demos and tests (`--mock` / `USE_MOCK_MODEL`).

use async_trait::async_trait;
use quill_core::chunk::Chunk;
use quill_core::error::ProviderError;
use quill_core::plugin::PluginRegistry;
use quill_core::provider::{ChunkReceiver, GenerateRequest, ModelAdapter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Prompt fragment that makes the mock run `ls` through the bash plugin.
pub const TOOL_TRIGGER: &str = "use tool ls";

/// Canned responses without network access. A prompt containing
/// [`TOOL_TRIGGER`] runs a real `bash ls` via the registry.
pub struct MockModelAdapter {
    registry: Arc<PluginRegistry>,
    delay: Duration,
}

impl MockModelAdapter {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            delay: Duration::from_millis(100),
        }
    }

    /// Pause after the last chunk, simulating model latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

fn excerpt(prompt: &str) -> String {
    prompt.chars().take(50).collect()
}

#[async_trait]
impl ModelAdapter for MockModelAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<ChunkReceiver, ProviderError> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let registry = self.registry.clone();
        let delay = self.delay;
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            let mut chunks = Vec::new();
            if prompt.to_lowercase().contains(TOOL_TRIGGER) {
                let args = serde_json::json!({ "command": "ls" });
                if tx
                    .send(Ok(Chunk::tool_running("bash", "Executing ls command")))
                    .await
                    .is_err()
                {
                    return;
                }
                let output = registry.execute("bash", args).await;
                chunks.push(Chunk::tool_completed(
                    "bash",
                    "Command completed",
                    Some(output.to_result_string()),
                ));
            } else {
                chunks.push(Chunk::content("I am a mock AI assistant. "));
                chunks.push(Chunk::content("This simulates a streamed model response. "));
                chunks.push(Chunk::content(format!("You said: \"{}...\" ", excerpt(&prompt))));
            }

            for chunk in chunks {
                if tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }
            tokio::time::sleep(delay).await;
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::message::Message;
    use quill_core::ToolState;

    async fn run(adapter: &MockModelAdapter, prompt: &str) -> Vec<Chunk> {
        let mut rx = adapter
            .generate(GenerateRequest {
                messages: vec![Message::system("sys"), Message::user(prompt)],
                plugins: Vec::new(),
            })
            .await
            .unwrap();
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item.unwrap());
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn plain_prompt_streams_canned_content() {
        let adapter = MockModelAdapter::new(Arc::new(PluginRegistry::new()));
        let chunks = run(&adapter, "hello there").await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], Chunk::content("You said: \"hello there...\" "));
    }

    #[tokio::test(start_paused = true)]
    async fn long_prompt_is_truncated_to_fifty_chars() {
        let adapter = MockModelAdapter::new(Arc::new(PluginRegistry::new()));
        let prompt = "é".repeat(80);
        let chunks = run(&adapter, &prompt).await;
        let Chunk::Content { text } = &chunks[2] else {
            panic!("expected content");
        };
        assert_eq!(text.matches('é').count(), 50);
    }

    #[tokio::test]
    async fn trigger_runs_bash_ls_through_the_registry() {
        let registry = Arc::new(quill_tools::default_registry().unwrap());
        let adapter = MockModelAdapter::new(registry).with_delay(Duration::ZERO);
        let chunks = run(&adapter, "Please USE TOOL LS now").await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], Chunk::tool_running("bash", "Executing ls command"));
        match &chunks[1] {
            Chunk::Tool {
                name,
                state: ToolState::Completed,
                result: Some(result),
                ..
            } => {
                assert_eq!(name, "bash");
                let value: serde_json::Value = serde_json::from_str(result).unwrap();
                assert_eq!(value["success"], true);
            }
            other => panic!("unexpected chunk {other:?}"),
        }
    }
}
