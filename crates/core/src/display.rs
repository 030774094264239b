//! The display surface streamed text is released to.

/// A rendering surface with bounded refresh capacity.
///
/// Measurements are optional: a sink that cannot tell its size returns `None`
/// and callers must treat that as "fits".
pub trait DisplaySink: Send + Sync {
    /// Append already-flushed text to the visible output.
    fn append(&self, text: &str);

    /// Rows available for streamed output.
    fn available_height(&self) -> Option<u16>;

    /// Rows `text` would occupy once rendered.
    fn measure_height(&self, text: &str) -> Option<u16>;
}

/// A sink that discards output and never reports a size.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn append(&self, _text: &str) {}

    fn available_height(&self) -> Option<u16> {
        None
    }

    fn measure_height(&self, _text: &str) -> Option<u16> {
        None
    }
}
