//! Conversation telemetry for Quill.
//!
//! The conversation loop reports a `chat` span per user message and a
//! `generate.<i>` span per model round-trip, with `tool.completed` and
//! `tool.fault` events on the latter. Every sink here is best-effort: callers
//! log failures and carry on.

pub mod model;
pub mod recorder;

pub use model::{Attributes, Span, SpanEvent, SpanId, SpanStatus};
pub use recorder::TraceRecorder;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use uuid::Uuid;

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("unknown span id: {0}")]
    UnknownSpan(String),

    #[error("telemetry state lock poisoned")]
    Poisoned,

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

/// A span/event sink.
pub trait Telemetry: Send + Sync {
    /// Open a span and return its id.
    fn start_span(
        &self,
        name: &str,
        parent: Option<&str>,
        attributes: Attributes,
    ) -> Result<SpanId, TelemetryError>;

    fn set_attribute(
        &self,
        span: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), TelemetryError>;

    fn add_event(&self, span: &str, name: &str, attributes: Attributes)
    -> Result<(), TelemetryError>;

    fn end_span(&self, span: &str, status: SpanStatus) -> Result<(), TelemetryError>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn start_span(
        &self,
        _name: &str,
        _parent: Option<&str>,
        _attributes: Attributes,
    ) -> Result<SpanId, TelemetryError> {
        Ok(Uuid::new_v4().to_string())
    }

    fn set_attribute(
        &self,
        _span: &str,
        _key: &str,
        _value: serde_json::Value,
    ) -> Result<(), TelemetryError> {
        Ok(())
    }

    fn add_event(
        &self,
        _span: &str,
        _name: &str,
        _attributes: Attributes,
    ) -> Result<(), TelemetryError> {
        Ok(())
    }

    fn end_span(&self, _span: &str, _status: SpanStatus) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Writes span lifecycles to `tracing` at debug level.
#[derive(Default)]
pub struct TracingTelemetry {
    open: Mutex<HashMap<SpanId, (String, Instant)>>,
}

impl TracingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    fn span_name(&self, span: &str) -> Result<String, TelemetryError> {
        let open = self.open.lock().map_err(|_| TelemetryError::Poisoned)?;
        open.get(span)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| TelemetryError::UnknownSpan(span.to_string()))
    }
}

impl Telemetry for TracingTelemetry {
    fn start_span(
        &self,
        name: &str,
        parent: Option<&str>,
        attributes: Attributes,
    ) -> Result<SpanId, TelemetryError> {
        let id = Uuid::new_v4().to_string();
        self.open
            .lock()
            .map_err(|_| TelemetryError::Poisoned)?
            .insert(id.clone(), (name.to_string(), Instant::now()));
        tracing::debug!(
            span = name,
            span_id = %id,
            parent = parent.unwrap_or("-"),
            attributes = %serde_json::Value::Object(attributes),
            "span started"
        );
        Ok(id)
    }

    fn set_attribute(
        &self,
        span: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), TelemetryError> {
        let name = self.span_name(span)?;
        tracing::trace!(span = %name, key, value = %value, "span attribute");
        Ok(())
    }

    fn add_event(
        &self,
        span: &str,
        name: &str,
        attributes: Attributes,
    ) -> Result<(), TelemetryError> {
        let span_name = self.span_name(span)?;
        tracing::debug!(
            span = %span_name,
            event = name,
            attributes = %serde_json::Value::Object(attributes),
            "span event"
        );
        Ok(())
    }

    fn end_span(&self, span: &str, status: SpanStatus) -> Result<(), TelemetryError> {
        let (name, started) = self
            .open
            .lock()
            .map_err(|_| TelemetryError::Poisoned)?
            .remove(span)
            .ok_or_else(|| TelemetryError::UnknownSpan(span.to_string()))?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match status {
            SpanStatus::Ok => tracing::debug!(span = %name, elapsed_ms, "span ended"),
            SpanStatus::Error(message) => {
                tracing::debug!(span = %name, elapsed_ms, error = %message, "span failed")
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_accepts_everything() {
        let t = NoopTelemetry;
        let id = t.start_span("chat", None, Attributes::new()).unwrap();
        t.add_event(&id, "tool.fault", Attributes::new()).unwrap();
        t.end_span(&id, SpanStatus::Ok).unwrap();
    }

    #[test]
    fn tracing_telemetry_rejects_unknown_span() {
        let t = TracingTelemetry::new();
        let id = t.start_span("chat", None, Attributes::new()).unwrap();
        t.end_span(&id, SpanStatus::error("x")).unwrap();
        assert!(matches!(
            t.add_event(&id, "tool.completed", Attributes::new()),
            Err(TelemetryError::UnknownSpan(_))
        ));
    }
}
