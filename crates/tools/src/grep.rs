//! Grep plugin: regex search across the non-ignored files of a tree.

use async_trait::async_trait;
use globset::{Glob, GlobMatcher};
use ignore::WalkBuilder;
use quill_core::ToolError;
use quill_core::plugin::{
    ParamType, Plugin, PluginOutput, PluginParameter, arg_bool, arg_opt_str, arg_str, arg_u64,
};
use regex::{Regex, RegexBuilder};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

use crate::fs::resolve_path;

const DEFAULT_MAX_RESULTS: u64 = 50;

/// Files larger than this are skipped.
const MAX_FILE_BYTES: u64 = 4 * 1024 * 1024;

/// Search parameters after validation.
pub struct GrepQuery {
    pub regex: Regex,
    pub file_filter: Option<GlobMatcher>,
    pub max_results: usize,
    pub context_lines: usize,
}

impl GrepQuery {
    pub fn new(
        pattern: &str,
        case_insensitive: bool,
        file_pattern: Option<&str>,
        max_results: usize,
        context_lines: usize,
    ) -> Result<Self, ToolError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| ToolError::InvalidArguments(format!("Invalid regex pattern: {e}")))?;
        let file_filter = file_pattern
            .map(|p| {
                Glob::new(p)
                    .map(|g| g.compile_matcher())
                    .map_err(|e| ToolError::InvalidArguments(format!("Invalid file_pattern: {e}")))
            })
            .transpose()?;
        Ok(Self {
            regex,
            file_filter,
            max_results,
            context_lines,
        })
    }

    fn wants(&self, path: &Path) -> bool {
        match &self.file_filter {
            Some(m) => path.file_name().is_some_and(|n| m.is_match(n)),
            None => true,
        }
    }

    /// Search `root` (a file or a directory).
    pub fn search(&self, root: &Path) -> Vec<Value> {
        let mut matches = Vec::new();
        for path in candidate_files(root) {
            if matches.len() >= self.max_results {
                break;
            }
            if self.wants(&path) {
                self.search_file(&path, &mut matches);
            }
        }
        matches
    }

    fn search_file(&self, path: &Path, out: &mut Vec<Value>) {
        let too_big = std::fs::metadata(path).is_ok_and(|m| m.len() > MAX_FILE_BYTES);
        if too_big {
            return;
        }
        // Binary and non-UTF-8 files are skipped.
        let Ok(content) = std::fs::read_to_string(path) else {
            return;
        };
        let lines: Vec<&str> = content.lines().collect();
        let file = path.display().to_string();

        for (i, line) in lines.iter().enumerate() {
            if out.len() >= self.max_results {
                return;
            }
            if !self.regex.is_match(line) {
                continue;
            }
            let mut m = json!({ "file": file, "line": i + 1, "content": line });
            if self.context_lines > 0 {
                let start = i.saturating_sub(self.context_lines);
                let end = (i + 1).saturating_add(self.context_lines).min(lines.len());
                m["before"] = json!(lines[start..i]);
                m["after"] = json!(lines[i + 1..end]);
            }
            out.push(m);
        }
    }
}

fn saturating_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

fn candidate_files(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .filter_entry(|e| e.file_name() != "node_modules")
        .sort_by_file_name(|a, b| a.cmp(b))
        .build()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
        .map(ignore::DirEntry::into_path)
        .collect()
}

pub struct GrepPlugin;

impl GrepPlugin {
    async fn run(&self, arguments: &Value) -> Result<Value, ToolError> {
        let query = GrepQuery::new(
            arg_str(arguments, "pattern")?,
            arg_bool(arguments, "case_insensitive", false),
            arg_opt_str(arguments, "file_pattern"),
            saturating_usize(arg_u64(arguments, "max_results").unwrap_or(DEFAULT_MAX_RESULTS)),
            saturating_usize(arg_u64(arguments, "context_lines").unwrap_or(0)),
        )?;
        let root = resolve_path(arg_opt_str(arguments, "path").unwrap_or("."));
        if !root.exists() {
            return Err(ToolError::Rejected(format!(
                "Search path does not exist: {}",
                root.display()
            )));
        }

        let matches = tokio::task::spawn_blocking(move || query.search(&root))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "grep".into(),
                reason: e.to_string(),
            })?;

        Ok(json!({ "match_count": matches.len(), "matches": matches }))
    }
}

#[async_trait]
impl Plugin for GrepPlugin {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search for a regex pattern in files. Returns matching lines with file paths and \
         line numbers. Respects .gitignore and skips hidden and binary files."
    }

    fn parameters(&self) -> Vec<PluginParameter> {
        vec![
            PluginParameter::required("pattern", ParamType::String, "The regex pattern to search for"),
            PluginParameter::optional(
                "path",
                ParamType::String,
                "The directory or file to search in (default: current directory)",
            ),
            PluginParameter::optional(
                "file_pattern",
                ParamType::String,
                "Glob pattern to filter files by name (e.g., \"*.rs\", \"*.{js,jsx}\")",
            ),
            PluginParameter::optional(
                "case_insensitive",
                ParamType::Boolean,
                "Whether to search case-insensitively (default: false)",
            ),
            PluginParameter::optional(
                "max_results",
                ParamType::Integer,
                "Maximum number of results to return (default: 50)",
            ),
            PluginParameter::optional(
                "context_lines",
                ParamType::Integer,
                "Number of context lines before and after each match (default: 0)",
            ),
        ]
    }

    fn describe_running(&self, args: &Value) -> String {
        format!("Searching for: {}", args["pattern"].as_str().unwrap_or(""))
    }

    fn describe_completed(&self, args: &Value, output: &PluginOutput) -> String {
        let pattern = args["pattern"].as_str().unwrap_or("");
        if output.success {
            let n = output.get("match_count").and_then(Value::as_u64).unwrap_or(0);
            format!("Found {n} matches for: {pattern}")
        } else {
            format!("Search failed for: {pattern}")
        }
    }

    async fn execute(&self, arguments: Value) -> PluginOutput {
        PluginOutput::from_result(self.run(&arguments).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("target")).unwrap();
        std::fs::write(root.join(".gitignore"), "target/\n").unwrap();
        std::fs::write(
            root.join("src/lib.rs"),
            "// header\nfn alpha() {}\nfn beta() {}\n// TODO: gamma\n",
        )
        .unwrap();
        std::fs::write(root.join("src/readme.md"), "Alpha release notes\n").unwrap();
        std::fs::write(root.join("target/out.rs"), "fn alpha() {}\n").unwrap();
        dir
    }

    #[test]
    fn finds_matches_with_line_numbers() {
        let dir = fixture();
        let q = GrepQuery::new("fn \\w+", false, None, 50, 0).unwrap();
        let matches = q.search(dir.path());
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0]["line"], 2);
        assert_eq!(matches[0]["content"], "fn alpha() {}");
        assert!(matches[0].get("before").is_none());
    }

    #[test]
    fn case_insensitive_and_file_filter() {
        let dir = fixture();
        let q = GrepQuery::new("alpha", true, Some("*.md"), 50, 0).unwrap();
        let matches = q.search(dir.path());
        assert_eq!(matches.len(), 1);
        assert!(matches[0]["file"].as_str().unwrap().ends_with("readme.md"));
    }

    #[test]
    fn context_lines_are_attached() {
        let dir = fixture();
        let q = GrepQuery::new("beta", false, None, 50, 1).unwrap();
        let matches = q.search(dir.path());
        assert_eq!(matches[0]["before"], json!(["fn alpha() {}"]));
        assert_eq!(matches[0]["after"], json!(["// TODO: gamma"]));
    }

    #[tokio::test]
    async fn huge_context_is_clamped_to_the_file() {
        let dir = fixture();
        let file = dir.path().join("src/lib.rs");
        let output = GrepPlugin
            .execute(json!({
                "pattern": "beta",
                "path": file.to_str().unwrap(),
                "context_lines": u64::MAX,
            }))
            .await;
        assert!(output.success);
        let m = &output.get("matches").unwrap()[0];
        assert_eq!(m["before"], json!(["// header", "fn alpha() {}"]));
        assert_eq!(m["after"], json!(["// TODO: gamma"]));
    }

    #[test]
    fn max_results_caps_output() {
        let dir = fixture();
        let q = GrepQuery::new(".", false, None, 3, 0).unwrap();
        assert_eq!(q.search(dir.path()).len(), 3);
    }

    #[tokio::test]
    async fn invalid_regex_is_structured_error() {
        let output = GrepPlugin.execute(json!({"pattern": "(unclosed"})).await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("Invalid regex pattern"));
    }

    #[tokio::test]
    async fn plugin_searches_single_file() {
        let dir = fixture();
        let file = dir.path().join("src/lib.rs");
        let output = GrepPlugin
            .execute(json!({"pattern": "TODO", "path": file.to_str().unwrap()}))
            .await;
        assert!(output.success);
        assert_eq!(output.get("match_count").unwrap(), 1);
    }
}
