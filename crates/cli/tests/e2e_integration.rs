//! End-to-end integration tests for the Quill conversation pipeline.
//!
//! These drive a scripted wire-level provider through the real plugin adapter,
//! the built-in tool registry, the orchestrator, and the session transcript.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quill_agent::{Orchestrator, Session};
use quill_core::error::ProviderError;
use quill_core::message::{DisplayKind, Role};
use quill_core::provider::{
    ModelAdapter, Provider, ProviderRequest, StreamChunk, StreamReceiver, ToolCallRequest,
};
use quill_core::{DisplaySink, Error, NullSink};
use quill_providers::{MockModelAdapter, PluginModelAdapter};
use quill_tools::default_registry;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ── Scripted provider ────────────────────────────────────────────────────

type Turn = Vec<Result<StreamChunk, ProviderError>>;

/// Replays one scripted turn per `stream` call and records each request.
struct ScriptedProvider {
    turns: Mutex<VecDeque<Turn>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(turns: Vec<Turn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_scripted"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<StreamReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![done(vec![])]);
        let (tx, rx) = mpsc::channel(turn.len().max(1));
        for item in turn {
            tx.send(item).await.unwrap();
        }
        Ok(rx)
    }
}

fn text(s: &str) -> Result<StreamChunk, ProviderError> {
    Ok(StreamChunk {
        content: Some(s.into()),
        ..StreamChunk::default()
    })
}

fn done(calls: Vec<ToolCallRequest>) -> Result<StreamChunk, ProviderError> {
    Ok(StreamChunk {
        tool_calls: calls,
        done: true,
        ..StreamChunk::default()
    })
}

fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest {
        id: id.into(),
        name: name.into(),
        arguments: args.to_string(),
    }
}

/// Records everything appended to it.
#[derive(Default)]
struct CaptureSink {
    shown: Mutex<String>,
}

impl CaptureSink {
    fn shown(&self) -> String {
        self.shown.lock().unwrap().clone()
    }
}

impl DisplaySink for CaptureSink {
    fn append(&self, text: &str) {
        self.shown.lock().unwrap().push_str(text);
    }

    fn available_height(&self) -> Option<u16> {
        None
    }

    fn measure_height(&self, _text: &str) -> Option<u16> {
        None
    }
}

fn session_over(provider: Arc<ScriptedProvider>) -> Session {
    let registry = Arc::new(default_registry().unwrap());
    let adapter: Arc<dyn ModelAdapter> =
        Arc::new(PluginModelAdapter::new(provider, registry.clone(), "e2e-model"));
    let orchestrator = Orchestrator::new(adapter, registry, "You are Quill.");
    Session::new(Arc::new(orchestrator))
}

// ── Tool pipeline ────────────────────────────────────────────────────────

#[tokio::test]
async fn write_then_read_file_through_real_tools() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    let path_str = path.to_str().unwrap();

    let provider = ScriptedProvider::new(vec![
        vec![
            text("Writing the note."),
            done(vec![call(
                "call_1",
                "write_file",
                serde_json::json!({"path": path_str, "content": "remember the milk"}),
            )]),
        ],
        vec![done(vec![call(
            "call_2",
            "read_file",
            serde_json::json!({"path": path_str}),
        )])],
        vec![text(" The note says: remember the milk."), done(vec![])],
    ]);
    let session = session_over(provider.clone());
    let sink = CaptureSink::default();

    let reply = session
        .submit("save a note", &sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "remember the milk");
    assert_eq!(reply.iterations, 3);
    assert_eq!(reply.tool_calls, 2);
    assert!(reply.faults.is_empty());
    assert_eq!(
        reply.text,
        "Writing the note. The note says: remember the milk."
    );

    let shown = sink.shown();
    assert!(shown.contains("[Tool: write_file] Writing file: "));
    assert!(shown.contains("[Tool: read_file] "));

    // Each later request carries the earlier tool results as user messages.
    let requests = provider.requests();
    assert_eq!(requests.len(), 3);
    assert!(!requests[0].tools.is_empty());
    let last = requests[2].messages.last().unwrap();
    assert_eq!(last.role, Role::User);
    assert!(last.content.starts_with("Tool result from read_file: "));
    assert!(last.content.contains("remember the milk"));
    assert!(
        requests[1]
            .messages
            .iter()
            .any(|m| m.content.starts_with("Tool result from write_file: "))
    );
}

#[tokio::test]
async fn edit_file_ambiguity_is_reported_back_to_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lib.rs");
    std::fs::write(&path, "let x = 1;\nlet x = 1;\n").unwrap();
    let path_str = path.to_str().unwrap();

    let provider = ScriptedProvider::new(vec![
        vec![done(vec![call(
            "call_1",
            "edit_file",
            serde_json::json!({"path": path_str, "old_string": "x = 1", "new_string": "x = 2"}),
        )])],
        vec![done(vec![call(
            "call_2",
            "edit_file",
            serde_json::json!({
                "path": path_str,
                "old_string": "x = 1",
                "new_string": "x = 2",
                "replace_all": true
            }),
        )])],
        vec![text("Updated both."), done(vec![])],
    ]);
    let session = session_over(provider.clone());

    let reply = session
        .submit("bump x", &NullSink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.text, "Updated both.");
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "let x = 2;\nlet x = 2;\n"
    );

    let requests = provider.requests();
    let feedback = &requests[1].messages.last().unwrap().content;
    assert!(feedback.contains("old_string found 2 times"));
}

#[tokio::test]
async fn unknown_tool_is_fed_back_as_a_result() {
    let provider = ScriptedProvider::new(vec![
        vec![done(vec![call("c1", "teleport", serde_json::json!({}))])],
        vec![text("That tool does not exist."), done(vec![])],
    ]);
    let session = session_over(provider.clone());
    let sink = CaptureSink::default();

    let reply = session
        .submit("go", &sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.iterations, 2);
    assert!(sink.shown().contains("[Tool: teleport] Failed teleport"));
    let requests = provider.requests();
    let feedback = &requests[1].messages.last().unwrap().content;
    assert!(feedback.starts_with("Tool result from teleport: "));
    assert!(feedback.contains("Unknown tool: teleport"));
}

// ── Failure semantics ────────────────────────────────────────────────────

#[tokio::test]
async fn interrupted_stream_keeps_partial_and_adds_error_entry() {
    let provider = ScriptedProvider::new(vec![vec![
        text("Here is the first half"),
        Err(ProviderError::StreamInterrupted("connection reset".into())),
    ]]);
    let session = session_over(provider);

    let err = session
        .submit("explain", &NullSink, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.partial, "Here is the first half");

    let entries = session.transcript().snapshot();
    let kinds: Vec<DisplayKind> = entries.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![DisplayKind::User, DisplayKind::Assistant, DisplayKind::Error]
    );
    assert_eq!(entries[1].text, "Here is the first half");
    assert!(entries[2].text.contains("connection reset"));
    assert!(!session.is_loading());
}

#[tokio::test]
async fn failure_before_any_text_leaves_only_an_error_entry() {
    let provider = ScriptedProvider::new(vec![vec![Err(ProviderError::AuthenticationFailed(
        "bad key".into(),
    ))]]);
    let session = session_over(provider);

    session
        .submit("hi", &NullSink, &CancellationToken::new())
        .await
        .unwrap_err();

    let entries = session.transcript().snapshot();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].kind, DisplayKind::User);
    assert_eq!(entries[1].kind, DisplayKind::Error);
    assert!(entries[1].text.starts_with("Error: "));
}

#[tokio::test]
async fn error_entries_are_not_sent_on_the_next_turn() {
    let provider = ScriptedProvider::new(vec![
        vec![Err(ProviderError::Network("offline".into()))],
        vec![text("Back online."), done(vec![])],
    ]);
    let session = session_over(provider.clone());
    let cancel = CancellationToken::new();

    session.submit("first", &NullSink, &cancel).await.unwrap_err();
    session.submit("second", &NullSink, &cancel).await.unwrap();

    let requests = provider.requests();
    let contents: Vec<&str> = requests[1]
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["You are Quill.", "first", "second"]);
}

#[tokio::test]
async fn runaway_tool_loop_hits_the_iteration_limit() {
    let dir = tempfile::tempdir().unwrap();
    let listing = serde_json::json!({"path": dir.path().to_str().unwrap()});
    let turns = (0..5)
        .map(|i| {
            vec![done(vec![call(
                &format!("c{i}"),
                "list_directory",
                listing.clone(),
            )])]
        })
        .collect();
    let provider = ScriptedProvider::new(turns);

    let registry = Arc::new(default_registry().unwrap());
    let adapter = Arc::new(PluginModelAdapter::new(provider.clone(), registry.clone(), "m"));
    let orchestrator = Orchestrator::new(adapter, registry, "sys").with_max_iterations(3);
    let session = Session::new(Arc::new(orchestrator));

    let err = session
        .submit("loop", &NullSink, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err.source, Error::ToolLoopExceeded { limit: 3 }));
    assert_eq!(provider.requests().len(), 3);
}

// ── Mock model ───────────────────────────────────────────────────────────

#[tokio::test]
async fn mock_model_echoes_without_network() {
    let registry = Arc::new(default_registry().unwrap());
    let adapter = Arc::new(MockModelAdapter::new(registry.clone()).with_delay(Duration::ZERO));
    let orchestrator = Orchestrator::new(adapter, registry, "sys");
    let session = Session::new(Arc::new(orchestrator));

    let reply = session
        .submit("hello there", &NullSink, &CancellationToken::new())
        .await
        .unwrap();
    assert!(reply.text.contains("You said: \"hello there"));
    assert_eq!(reply.tool_calls, 0);
    assert_eq!(reply.iterations, 1);
}

#[tokio::test]
async fn mock_model_runs_bash_on_trigger() {
    let registry = Arc::new(default_registry().unwrap());
    let adapter = Arc::new(MockModelAdapter::new(registry.clone()).with_delay(Duration::ZERO));
    let orchestrator = Orchestrator::new(adapter, registry, "sys").with_max_iterations(2);
    let session = Session::new(Arc::new(orchestrator));
    let sink = CaptureSink::default();

    // The mock requests `ls` on every turn that contains the trigger, and the
    // tool result message does not, so the second iteration answers in text.
    let reply = session
        .submit("please use tool ls", &sink, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(reply.tool_calls, 1);
    assert_eq!(reply.iterations, 2);
    assert!(sink.shown().contains("[Tool: bash] Executing ls command"));
    assert!(sink.shown().contains("[Tool: bash] Command completed"));
}
