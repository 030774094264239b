//! The display transcript of one conversation.
//!
//! Readers take cheap [`Transcript::snapshot`]s; writers copy on write, so a
//! renderer holding a snapshot never observes a half-applied change.

use std::sync::{Arc, PoisonError, RwLock};

use quill_core::message::{DisplayEntry, EntryId};

#[derive(Debug, Default)]
pub struct Transcript {
    entries: RwLock<Arc<Vec<DisplayEntry>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current entries.
    pub fn snapshot(&self) -> Arc<Vec<DisplayEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update<R>(&self, f: impl FnOnce(&mut Vec<DisplayEntry>) -> R) -> R {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        f(Arc::make_mut(&mut *guard))
    }

    /// Append an entry, returning its id.
    pub fn push(&self, entry: DisplayEntry) -> EntryId {
        let id = entry.id;
        self.update(|entries| entries.push(entry));
        id
    }

    /// Replace the text of entry `id`. Returns false if there is no such entry.
    pub fn replace(&self, id: EntryId, text: impl Into<String>) -> bool {
        let text = text.into();
        self.update(|entries| match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.text = text;
                true
            }
            None => false,
        })
    }

    /// Remove entry `id`. Returns false if there is no such entry.
    pub fn remove(&self, id: EntryId) -> bool {
        self.update(|entries| {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            entries.len() != before
        })
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
