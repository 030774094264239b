//! One conversation as the user sees it.
//!
//! [`Session::submit`] wraps [`Orchestrator::send_message`] with transcript
//! bookkeeping: a user entry, an assistant placeholder that mirrors streamed
//! output, and on failure either a frozen partial answer followed by an
//! error entry or a single error entry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use quill_core::display::DisplaySink;
use quill_core::message::{DisplayEntry, EntryId};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::orchestrator::Orchestrator;
use crate::transcript::Transcript;
use crate::turn::{Reply, TurnError};

/// Forwards to the real sink and keeps the placeholder entry in step.
struct MirrorSink<'a> {
    inner: &'a dyn DisplaySink,
    transcript: &'a Transcript,
    placeholder: EntryId,
    shown: Mutex<String>,
}

impl DisplaySink for MirrorSink<'_> {
    fn append(&self, text: &str) {
        self.inner.append(text);
        let mut shown = self.shown.lock().unwrap_or_else(PoisonError::into_inner);
        shown.push_str(text);
        self.transcript.replace(self.placeholder, shown.as_str());
    }

    fn available_height(&self) -> Option<u16> {
        self.inner.available_height()
    }

    fn measure_height(&self, text: &str) -> Option<u16> {
        self.inner.measure_height(text)
    }
}

pub struct Session {
    orchestrator: Arc<Orchestrator>,
    transcript: Transcript,
    loading: AtomicBool,
}

impl Session {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            transcript: Transcript::new(),
            loading: AtomicBool::new(false),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Whether a message is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Send `text`, recording the exchange in the transcript.
    pub async fn submit(
        &self,
        text: &str,
        sink: &dyn DisplaySink,
        cancel: &CancellationToken,
    ) -> Result<Reply, TurnError> {
        let prior = self.transcript.snapshot();
        self.transcript.push(DisplayEntry::user(text));
        self.loading.store(true, Ordering::SeqCst);
        let placeholder = self.transcript.push(DisplayEntry::assistant(""));

        let mirror = MirrorSink {
            inner: sink,
            transcript: &self.transcript,
            placeholder,
            shown: Mutex::new(String::new()),
        };
        let result = self
            .orchestrator
            .send_message(text, &prior, &mirror, cancel)
            .await;

        match &result {
            Ok(reply) => self.freeze(placeholder, &reply.text),
            Err(err) => {
                if err.has_partial() {
                    self.transcript.replace(placeholder, err.partial.as_str());
                } else {
                    self.transcript.remove(placeholder);
                }
                self.transcript
                    .push(DisplayEntry::error(format!("Error: {}", err.source)));
            }
        }

        self.loading.store(false, Ordering::SeqCst);
        debug!(entries = self.transcript.len(), "Transcript updated");
        result
    }

    fn freeze(&self, placeholder: EntryId, text: &str) {
        if text.is_empty() {
            self.transcript.remove(placeholder);
        } else {
            self.transcript.replace(placeholder, text);
        }
    }
}
