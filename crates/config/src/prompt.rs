//! System prompt assembly.
//!
//! The prompt is a template from `[system].prompt` (or the built-in default)
//! in which the `{{AGENTS}}` placeholder is replaced by the trimmed content of
//! `AGENTS.md` in the working directory. A missing file substitutes nothing.

use std::path::Path;
use tracing::{debug, warn};

/// Project notes file read from the working directory.
pub const AGENTS_FILE: &str = "AGENTS.md";

/// Placeholder replaced by the project notes.
pub const AGENTS_PLACEHOLDER: &str = "{{AGENTS}}";

/// The built-in prompt used when no config file overrides it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a senior software engineer with deep expertise in software development, \
architecture, and best practices. Provide clear, concise, and accurate technical guidance. \
Write clean, maintainable code that follows the conventions of the language at hand, \
and consider edge cases and error handling.

Be direct and professional, and focus on practical solutions.

You have tools for running shell commands, reading, writing and editing files, \
searching the codebase, and inspecting git state and GitHub pull requests. \
Use them to verify facts instead of guessing.

{{AGENTS}}";

/// An assembled system prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompt {
    text: String,
    /// Whether AGENTS.md was found and substituted
    pub agents_loaded: bool,
}

impl SystemPrompt {
    /// Assemble the prompt, reading `AGENTS.md` from `dir`.
    pub fn assemble(template: &str, dir: &Path) -> Self {
        let agents = load_agents_file(dir);
        let agents_loaded = agents.is_some();
        let text = render(template, agents.as_deref().unwrap_or(""));
        Self {
            text: text.trim().to_string(),
            agents_loaded,
        }
    }

    /// Assemble the prompt against the current working directory.
    pub fn from_cwd(template: &str) -> Self {
        match std::env::current_dir() {
            Ok(dir) => Self::assemble(template, &dir),
            Err(e) => {
                warn!(error = %e, "Cannot resolve working directory, skipping {AGENTS_FILE}");
                Self {
                    text: render(template, "").trim().to_string(),
                    agents_loaded: false,
                }
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Substitute every placeholder occurrence.
pub fn render(template: &str, agents: &str) -> String {
    template.replace(AGENTS_PLACEHOLDER, agents)
}

fn load_agents_file(dir: &Path) -> Option<String> {
    let path = dir.join(AGENTS_FILE);
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(&path) {
        Ok(content) => {
            debug!(path = %path.display(), "Loaded project notes");
            Some(content.trim().to_string())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read project notes");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_agents_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(AGENTS_FILE), "\n  Use cargo nextest.  \n").unwrap();

        let prompt = SystemPrompt::assemble("Rules:\n{{AGENTS}}", dir.path());
        assert_eq!(prompt.as_str(), "Rules:\nUse cargo nextest.");
        assert!(prompt.agents_loaded);
    }

    #[test]
    fn missing_agents_file_substitutes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = SystemPrompt::assemble("Hello {{AGENTS}}", dir.path());
        assert_eq!(prompt.as_str(), "Hello");
        assert!(!prompt.agents_loaded);
    }

    #[test]
    fn template_without_placeholder_is_unchanged() {
        assert_eq!(render("plain", "ignored"), "plain");
    }

    #[test]
    fn default_prompt_has_placeholder() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains(AGENTS_PLACEHOLDER));
    }
}
