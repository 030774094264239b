//! Streamed model output.
//!
//! A model turn arrives as a finite sequence of [`Chunk`]s: incremental text,
//! or progress events for a tool the executing layer is running.

use serde::{Deserialize, Serialize};

/// Lifecycle of a tool call as reported by the model stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolState {
    Running,
    Completed,
}

/// One incremental unit of a streamed model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Chunk {
    /// Partial text from the model.
    Content { text: String },

    /// A tool call event. `result` is only meaningful when `state` is
    /// `Completed`; a completed chunk without one is a protocol violation.
    Tool {
        name: String,
        state: ToolState,
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
}

impl Chunk {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content { text: text.into() }
    }

    pub fn tool_running(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self::Tool {
            name: name.into(),
            state: ToolState::Running,
            status: status.into(),
            result: None,
        }
    }

    pub fn tool_completed(
        name: impl Into<String>,
        status: impl Into<String>,
        result: Option<String>,
    ) -> Self {
        Self::Tool {
            name: name.into(),
            state: ToolState::Completed,
            status: status.into(),
            result,
        }
    }
}

/// A tool outcome fed back into the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,
    pub result: String,
    /// Set when the executing layer failed to populate a result.
    #[serde(default)]
    pub fault: bool,
}

impl ToolResult {
    pub fn new(name: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result: result.into(),
            fault: false,
        }
    }

    /// The stand-in result for a completed tool chunk that carried none.
    pub fn missing(name: impl Into<String>) -> Self {
        let name = name.into();
        let result = format!("Error: tool '{name}' completed without a result");
        Self {
            name,
            result,
            fault: true,
        }
    }

    /// The synthetic user-role text appended before the next model call.
    pub fn to_message_text(&self) -> String {
        format!("Tool result from {}: {}", self.name, self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_serialization_is_tagged() {
        let json = serde_json::to_string(&Chunk::content("Hello")).unwrap();
        assert!(json.contains(r#""type":"content""#));

        let json = serde_json::to_string(&Chunk::tool_running("bash", "Executing: ls")).unwrap();
        assert!(json.contains(r#""state":"running""#));
        assert!(!json.contains("result"));
    }

    #[test]
    fn tool_result_message_format() {
        let r = ToolResult::new("bash", r#"{"stdout":"a.txt"}"#);
        assert_eq!(
            r.to_message_text(),
            r#"Tool result from bash: {"stdout":"a.txt"}"#
        );
    }

    #[test]
    fn missing_result_is_marked_as_fault() {
        let r = ToolResult::missing("git");
        assert!(r.fault);
        assert!(r.result.contains("without a result"));
    }
}
