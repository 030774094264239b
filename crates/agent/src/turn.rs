//! Outcome and progress types for one `send_message` call.

use quill_core::Error;
use serde::Serialize;

/// Where the conversation loop is, published on a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    Sending,
    Generating { iteration: u32 },
    ToolDispatch { iteration: u32 },
    Done,
    Failed,
    Cancelled,
}

/// A completed tool chunk that carried no result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolFault {
    pub iteration: u32,
    pub tool: String,
}

impl ToolFault {
    pub fn to_error(&self) -> Error {
        Error::ToolExecutionFault {
            tool: self.tool.clone(),
        }
    }
}

/// The result of a successful (or cancelled) `send_message`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reply {
    /// All content text across every iteration.
    pub text: String,
    pub iterations: u32,
    /// Completed tool chunks seen.
    pub tool_calls: u32,
    pub faults: Vec<ToolFault>,
    pub cancelled: bool,
}

/// A failed `send_message`, carrying the text produced before the failure.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct TurnError {
    pub partial: String,
    pub source: Error,
}

impl TurnError {
    pub fn has_partial(&self) -> bool {
        !self.partial.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_error_displays_source() {
        let err = TurnError {
            partial: "  \n".into(),
            source: Error::ToolLoopExceeded { limit: 3 },
        };
        assert!(err.to_string().contains('3'));
        assert!(!err.has_partial());
    }

    #[test]
    fn fault_maps_to_execution_fault() {
        let fault = ToolFault {
            iteration: 1,
            tool: "bash".into(),
        };
        assert!(matches!(fault.to_error(), Error::ToolExecutionFault { tool } if tool == "bash"));
    }

    #[test]
    fn state_serializes_tagged() {
        let json = serde_json::to_value(TurnState::ToolDispatch { iteration: 2 }).unwrap();
        assert_eq!(json["state"], "tool_dispatch");
        assert_eq!(json["iteration"], 2);
    }
}
