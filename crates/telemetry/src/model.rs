//! Data model for conversation spans and their events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Span attributes: a flat JSON object.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Opaque span handle returned by [`crate::Telemetry::start_span`].
pub type SpanId = String;

// ── Span ──────────────────────────────────────────────────────────────────

/// How a span finished.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "code", content = "message", rename_all = "snake_case")]
pub enum SpanStatus {
    Ok,
    Error(String),
}

impl SpanStatus {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// A point-in-time annotation on a span (e.g. `tool.completed`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanEvent {
    pub name: String,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub attributes: Attributes,
}

/// A single traced execution unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    /// Unique identifier.
    pub id: SpanId,
    /// Parent span id (None for root spans).
    pub parent_id: Option<SpanId>,
    /// Span name (`chat`, `generate.<i>`).
    pub name: String,
    /// When the span started.
    pub started_at: DateTime<Utc>,
    /// When the span ended (None if still running).
    pub ended_at: Option<DateTime<Utc>>,
    /// Duration in milliseconds (computed on end).
    pub duration_ms: Option<u64>,
    /// Final status (None while running).
    pub status: Option<SpanStatus>,
    /// Arbitrary attributes.
    pub attributes: Attributes,
    /// Events recorded while the span was open.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SpanEvent>,
}

impl Span {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            name: name.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            status: None,
            attributes: Attributes::new(),
            events: Vec::new(),
        }
    }

    /// Set the parent span.
    pub fn with_parent(mut self, parent_id: impl Into<SpanId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn add_event(&mut self, name: impl Into<String>, attributes: Attributes) {
        self.events.push(SpanEvent {
            name: name.into(),
            at: Utc::now(),
            attributes,
        });
    }

    /// Mark the span as ended with the given status.
    pub fn end(&mut self, status: SpanStatus) {
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some(
            now.signed_duration_since(self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.status = Some(status);
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Look up an attribute.
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// Events with the given name.
    pub fn events_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a SpanEvent> {
        self.events.iter().filter(move |e| e.name == name)
    }
}
