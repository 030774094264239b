//! Display history to model messages.

use quill_core::message::{DisplayEntry, DisplayKind, Message, Role};

/// Convert display entries into the role-tagged messages the model consumes.
///
/// User and assistant entries map 1:1 in order; error entries are dropped.
pub fn to_model_messages(history: &[DisplayEntry]) -> Vec<Message> {
    history
        .iter()
        .filter_map(|entry| {
            let role = match entry.kind {
                DisplayKind::User => Role::User,
                DisplayKind::Assistant => Role::Assistant,
                DisplayKind::Error => return None,
            };
            Some(Message::new(role, entry.text.clone()))
        })
        .collect()
}
