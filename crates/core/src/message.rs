//! Message and display-history domain types.
//!
//! Two views of the same conversation exist side by side:
//! - [`DisplayEntry`] is what the user sees (user input, assistant output, error notes).
//! - [`Message`] is what the model consumes (role-tagged, error notes removed).

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user (also carries synthetic tool results)
    User,
    /// The model
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message sent to the model. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// What kind of entry a display line is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayKind {
    User,
    Assistant,
    Error,
}

/// Process-lifetime unique, monotonically increasing entry id.
pub type EntryId = u64;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(0);

/// Allocate the next display entry id.
pub fn next_entry_id() -> EntryId {
    NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed)
}

/// One entry of the user-visible history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayEntry {
    pub id: EntryId,
    pub kind: DisplayKind,
    pub text: String,
}

impl DisplayEntry {
    /// Create an entry with a freshly allocated id.
    pub fn new(kind: DisplayKind, text: impl Into<String>) -> Self {
        Self {
            id: next_entry_id(),
            kind,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(DisplayKind::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(DisplayKind::Assistant, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(DisplayKind::Error, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, agent!");
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::system("x")).unwrap();
        assert!(json.contains(r#""role":"system""#));
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }

    #[test]
    fn entry_ids_are_monotonic() {
        let a = DisplayEntry::user("a");
        let b = DisplayEntry::error("b");
        let c = DisplayEntry::assistant("c");
        assert!(a.id < b.id);
        assert!(b.id < c.id);
    }
}
