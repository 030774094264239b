//! Persisted input history (`~/.config/quill/input_history`).
//!
//! One entry per line; newlines and backslashes inside an entry are escaped.
//! Unreadable or oversized entries are dropped on load with a warning.

use std::io;
use std::path::Path;

use quill_config::HistoryConfig;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct InputHistory {
    entries: Vec<String>,
    max_entries: usize,
    max_entry_chars: usize,
}

impl InputHistory {
    pub fn new(max_entries: usize, max_entry_chars: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
            max_entry_chars,
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.max_entries, config.max_entry_chars)
    }

    /// Load entries from `path`. A missing file is an empty history; read
    /// failures and corrupt entries are logged and skipped.
    pub fn load(mut self, path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return self,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read input history");
                return self;
            }
        };

        let dropped = self.extend_from(&content);
        if dropped > 0 {
            warn!(
                path = %path.display(),
                dropped,
                "Dropped corrupt input history entries"
            );
        }
        debug!(entries = self.entries.len(), "Input history loaded");
        self
    }

    /// Parse serialized history, returning how many entries were dropped.
    fn extend_from(&mut self, content: &str) -> usize {
        let mut dropped = 0;
        for line in content.lines() {
            let entry = unescape(line);
            if entry.trim().is_empty() || entry.chars().count() > self.max_entry_chars {
                dropped += 1;
                continue;
            }
            self.entries.push(entry);
        }
        self.truncate();
        dropped
    }

    /// Record a submitted input. Blank input and immediate repeats are ignored.
    pub fn push(&mut self, entry: &str) {
        if entry.trim().is_empty() || self.entries.last().is_some_and(|last| last == entry) {
            return;
        }
        self.entries.push(entry.to_string());
        self.truncate();
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// The most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[String] {
        &self.entries[self.entries.len().saturating_sub(n)..]
    }

    /// Write the most recent entries to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = String::new();
        for entry in self.recent(self.max_entries) {
            out.push_str(&escape(entry));
            out.push('\n');
        }
        std::fs::write(path, out)
    }

    fn truncate(&mut self) {
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
    }
}

fn escape(entry: &str) -> String {
    entry.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_drops_oversized_and_blank_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input_history");
        let long = "x".repeat(12_000);
        std::fs::write(&path, format!("{long}\n   \nvalid entry\n")).unwrap();

        let history = InputHistory::new(1000, 10_000).load(&path);
        assert_eq!(history.entries(), ["valid entry"]);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = InputHistory::new(10, 100).load(&dir.path().join("absent"));
        assert!(history.entries().is_empty());
    }

    #[test]
    fn save_keeps_most_recent_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/quill/input_history");

        let mut history = InputHistory::new(3, 100);
        for i in 0..5 {
            history.push(&format!("cmd {i}"));
        }
        history.save(&path).unwrap();

        let reloaded = InputHistory::new(3, 100).load(&path);
        assert_eq!(reloaded.entries(), ["cmd 2", "cmd 3", "cmd 4"]);
    }

    #[test]
    fn multi_line_entries_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input_history");

        let mut history = InputHistory::new(10, 100);
        history.push("first line\nsecond line");
        history.push(r"C:\new\path");
        history.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);

        let reloaded = InputHistory::new(10, 100).load(&path);
        assert_eq!(reloaded.entries(), ["first line\nsecond line", r"C:\new\path"]);
    }

    #[test]
    fn push_ignores_blank_and_repeated_input() {
        let mut history = InputHistory::new(10, 100);
        history.push("ls");
        history.push("ls");
        history.push("  ");
        history.push("pwd");
        assert_eq!(history.entries(), ["ls", "pwd"]);
        assert_eq!(history.recent(1), ["pwd"]);
    }
}
