//! Glob plugin: find files by pattern, respecting `.gitignore`.

use async_trait::async_trait;
use globset::{Glob, GlobBuilder, GlobMatcher};
use ignore::WalkBuilder;
use quill_core::ToolError;
use quill_core::plugin::{ParamType, Plugin, PluginOutput, PluginParameter, arg_opt_str, arg_str, arg_u64};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

use crate::fs::resolve_path;

const DEFAULT_MAX_RESULTS: u64 = 100;

pub struct GlobPlugin;

/// How a pattern is matched: patterns without a separator match file names
/// anywhere in the tree, others match the path relative to the search root.
enum Matcher {
    FileName(GlobMatcher),
    RelativePath(GlobMatcher),
}

impl Matcher {
    fn new(pattern: &str) -> Result<Self, ToolError> {
        let invalid = |e: globset::Error| ToolError::InvalidArguments(format!("Invalid glob pattern: {e}"));
        if pattern.contains('/') {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(invalid)?;
            Ok(Self::RelativePath(glob.compile_matcher()))
        } else {
            Ok(Self::FileName(Glob::new(pattern).map_err(invalid)?.compile_matcher()))
        }
    }

    fn is_match(&self, root: &Path, path: &Path) -> bool {
        match self {
            Self::FileName(m) => path.file_name().is_some_and(|n| m.is_match(n)),
            Self::RelativePath(m) => path.strip_prefix(root).is_ok_and(|rel| m.is_match(rel)),
        }
    }
}

/// Walk `root` (hidden and ignored files skipped) collecting up to `limit` matches.
pub fn find_files(root: &Path, pattern: &str, limit: usize) -> Result<Vec<PathBuf>, ToolError> {
    let matcher = Matcher::new(pattern)?;
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .filter_entry(|e| e.file_name() != "node_modules")
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut files = Vec::new();
    for entry in walker.filter_map(Result::ok) {
        if files.len() >= limit {
            break;
        }
        if entry.file_type().is_some_and(|t| t.is_file()) && matcher.is_match(root, entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

impl GlobPlugin {
    async fn run(&self, arguments: &Value) -> Result<Value, ToolError> {
        let pattern = arg_str(arguments, "pattern")?.to_string();
        let root = resolve_path(arg_opt_str(arguments, "path").unwrap_or("."));
        let limit = arg_u64(arguments, "max_results").unwrap_or(DEFAULT_MAX_RESULTS) as usize;

        if !root.is_dir() {
            return Err(ToolError::Rejected(format!(
                "Search path is not a directory: {}",
                root.display()
            )));
        }

        let files = tokio::task::spawn_blocking(move || find_files(&root, &pattern, limit))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "glob".into(),
                reason: e.to_string(),
            })??;

        let files: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
        Ok(json!({ "count": files.len(), "files": files }))
    }
}

#[async_trait]
impl Plugin for GlobPlugin {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern. Respects .gitignore and skips hidden files."
    }

    fn parameters(&self) -> Vec<PluginParameter> {
        vec![
            PluginParameter::required(
                "pattern",
                ParamType::String,
                "The glob pattern to match files (e.g., \"**/*.rs\", \"src/**/*.test.js\")",
            ),
            PluginParameter::optional(
                "path",
                ParamType::String,
                "The directory to search in (default: current directory)",
            ),
            PluginParameter::optional(
                "max_results",
                ParamType::Integer,
                "Maximum number of results to return (default: 100)",
            ),
        ]
    }

    fn describe_running(&self, args: &Value) -> String {
        format!("Finding files: {}", args["pattern"].as_str().unwrap_or(""))
    }

    fn describe_completed(&self, args: &Value, output: &PluginOutput) -> String {
        let pattern = args["pattern"].as_str().unwrap_or("");
        if output.success {
            let n = output.get("count").and_then(Value::as_u64).unwrap_or(0);
            format!("Found {n} files matching: {pattern}")
        } else {
            format!("Failed to find files: {pattern}")
        }
    }

    async fn execute(&self, arguments: Value) -> PluginOutput {
        PluginOutput::from_result(self.run(&arguments).await)
    }
}
