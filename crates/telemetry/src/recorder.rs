//! Thread-safe in-memory span recorder.

use crate::model::*;
use crate::{Telemetry, TelemetryError};
use std::collections::HashMap;
use std::sync::RwLock;

/// Keeps finished spans beyond this many are pruned oldest-first.
const MAX_FINISHED: usize = 5_000;

/// Collects spans in memory.
///
/// Open spans live in a map until ended; finished spans are kept in end order.
#[derive(Default)]
pub struct TraceRecorder {
    open: RwLock<HashMap<SpanId, Span>>,
    finished: RwLock<Vec<Span>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all finished spans, in the order they ended.
    pub fn finished(&self) -> Vec<Span> {
        self.finished
            .read()
            .map(|spans| spans.clone())
            .unwrap_or_default()
    }

    /// Finished spans with the given name.
    pub fn finished_named(&self, name: &str) -> Vec<Span> {
        self.finished()
            .into_iter()
            .filter(|s| s.name == name)
            .collect()
    }

    /// Number of spans still open.
    pub fn open_count(&self) -> usize {
        self.open.read().map(|open| open.len()).unwrap_or(0)
    }

    /// Drop every finished span.
    pub fn clear(&self) {
        if let Ok(mut finished) = self.finished.write() {
            finished.clear();
        }
    }

    fn with_open<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Span) -> R,
    ) -> Result<R, TelemetryError> {
        let mut open = self.open.write().map_err(|_| TelemetryError::Poisoned)?;
        let span = open
            .get_mut(id)
            .ok_or_else(|| TelemetryError::UnknownSpan(id.to_string()))?;
        Ok(f(span))
    }
}

impl Telemetry for TraceRecorder {
    fn start_span(
        &self,
        name: &str,
        parent: Option<&str>,
        attributes: Attributes,
    ) -> Result<SpanId, TelemetryError> {
        let mut span = Span::new(name).with_attributes(attributes);
        if let Some(parent) = parent {
            span = span.with_parent(parent);
        }
        let id = span.id.clone();
        self.open
            .write()
            .map_err(|_| TelemetryError::Poisoned)?
            .insert(id.clone(), span);
        Ok(id)
    }

    fn set_attribute(
        &self,
        span: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), TelemetryError> {
        self.with_open(span, |s| {
            s.attributes.insert(key.to_string(), value);
        })
    }

    fn add_event(
        &self,
        span: &str,
        name: &str,
        attributes: Attributes,
    ) -> Result<(), TelemetryError> {
        self.with_open(span, |s| s.add_event(name, attributes))
    }

    fn end_span(&self, span: &str, status: SpanStatus) -> Result<(), TelemetryError> {
        let mut ended = {
            let mut open = self.open.write().map_err(|_| TelemetryError::Poisoned)?;
            open.remove(span)
                .ok_or_else(|| TelemetryError::UnknownSpan(span.to_string()))?
        };
        ended.end(status);

        let mut finished = self.finished.write().map_err(|_| TelemetryError::Poisoned)?;
        if finished.len() >= MAX_FINISHED {
            finished.drain(..MAX_FINISHED / 10);
        }
        finished.push(ended);
        Ok(())
    }
}
