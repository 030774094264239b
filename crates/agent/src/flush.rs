//! Rate-limited release of streamed text to a display sink.
//!
//! Text is buffered and released on a trailing edge: the first push after a
//! release arms a deadline `interval` away, later pushes only append. When
//! the deadline fires the buffer is released in one piece, unless the text
//! shown so far plus the buffer would not fit the visible area. The owner
//! drives the deadline (see [`FlushController::deadline`]); no task is
//! spawned here.

use std::time::Duration;

use quill_core::display::DisplaySink;
use tokio::time::Instant;
use tracing::trace;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Rows kept free below the streamed text.
pub const DEFAULT_HEIGHT_MARGIN: u16 = 7;

#[derive(Debug)]
pub struct FlushController {
    interval: Duration,
    margin: u16,
    buffer: String,
    /// Everything released to the sink since the controller was created.
    released: String,
    deadline: Option<Instant>,
    flushes: usize,
}

impl Default for FlushController {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_INTERVAL, DEFAULT_HEIGHT_MARGIN)
    }
}

impl FlushController {
    pub fn new(interval: Duration, margin: u16) -> Self {
        Self {
            interval,
            margin,
            buffer: String::new(),
            released: String::new(),
            deadline: None,
            flushes: 0,
        }
    }

    /// Buffer `text`, arming the deadline if none is pending.
    pub fn push(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.buffer.push_str(text);
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.interval);
        }
    }

    /// When the pending timed flush is due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Attempt the timed flush. Returns whether anything was released.
    pub fn on_deadline(&mut self, sink: &dyn DisplaySink) -> bool {
        self.deadline = None;
        if self.buffer.is_empty() {
            return false;
        }
        if !self.fits(sink) {
            trace!(pending = self.buffer.len(), "Flush suppressed: output would not fit");
            return false;
        }
        self.release(sink);
        true
    }

    /// Release whatever is buffered, ignoring the interval and fit check.
    pub fn finish(&mut self, sink: &dyn DisplaySink) {
        self.deadline = None;
        if !self.buffer.is_empty() {
            self.release(sink);
        }
    }

    pub fn released(&self) -> &str {
        &self.released
    }

    /// Number of times text was handed to the sink.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Fails open when the sink cannot measure.
    fn fits(&self, sink: &dyn DisplaySink) -> bool {
        let Some(available) = sink.available_height() else {
            return true;
        };
        let candidate = format!("{}{}", self.released, self.buffer);
        let Some(height) = sink.measure_height(&candidate) else {
            return true;
        };
        height < available.saturating_sub(self.margin)
    }

    fn release(&mut self, sink: &dyn DisplaySink) {
        let text = std::mem::take(&mut self.buffer);
        sink.append(&text);
        self.released.push_str(&text);
        self.flushes += 1;
    }
}
