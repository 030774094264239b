//! The terminal display sink.

use std::io::{self, Write};

use quill_core::DisplaySink;
use unicode_width::UnicodeWidthStr;

/// Streams released text to stdout.
///
/// Height checks go through `crossterm`; when stdout is not a terminal the
/// measurements are `None` and every flush is allowed.
#[derive(Debug, Default)]
pub struct TerminalSink;

impl TerminalSink {
    pub fn new() -> Self {
        Self
    }
}

impl DisplaySink for TerminalSink {
    fn append(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn available_height(&self) -> Option<u16> {
        crossterm::terminal::size().ok().map(|(_, rows)| rows)
    }

    fn measure_height(&self, text: &str) -> Option<u16> {
        let (cols, _) = crossterm::terminal::size().ok()?;
        Some(wrapped_height(text, cols))
    }
}

/// Rows `text` occupies when soft-wrapped at `cols` display columns.
pub fn wrapped_height(text: &str, cols: u16) -> u16 {
    let cols = usize::from(cols.max(1));
    let rows: usize = text
        .split('\n')
        .map(|line| UnicodeWidthStr::width(line).div_ceil(cols).max(1))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}
