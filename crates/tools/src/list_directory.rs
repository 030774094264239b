//! List directory plugin.

use async_trait::async_trait;
use quill_core::ToolError;
use quill_core::plugin::{ParamType, Plugin, PluginOutput, PluginParameter, arg_bool, arg_str, arg_u64};
use serde_json::{Value, json};
use std::path::Path;

use crate::fs::resolve_path;

const DEFAULT_MAX_DEPTH: u64 = 3;

/// Directory names never descended into or listed.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target"];

pub struct ListDirectoryPlugin;

fn is_skipped(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIRS.contains(&name)
}

/// List `dir`, descending while `depth < max_depth` when `recursive`.
/// Unreadable entries are listed with type `unknown`; unreadable
/// directories yield no children.
fn list(dir: &Path, depth: u64, max_depth: u64, recursive: bool) -> Vec<Value> {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut items: Vec<_> = read_dir.filter_map(Result::ok).collect();
    items.sort_by_key(|e| e.file_name());

    let mut entries = Vec::new();
    for item in items {
        let name = item.file_name().to_string_lossy().into_owned();
        if is_skipped(&name) {
            continue;
        }
        let path = item.path();
        let mut entry = json!({ "name": name, "path": path.display().to_string() });

        match item.metadata() {
            Ok(meta) if meta.is_dir() => {
                entry["type"] = "directory".into();
                if recursive && depth < max_depth {
                    entry["children"] = Value::Array(list(&path, depth + 1, max_depth, true));
                }
            }
            Ok(meta) => {
                entry["type"] = "file".into();
                entry["size"] = meta.len().into();
            }
            Err(_) => entry["type"] = "unknown".into(),
        }
        entries.push(entry);
    }
    entries
}

impl ListDirectoryPlugin {
    async fn run(&self, arguments: &Value) -> Result<Value, ToolError> {
        let dir = resolve_path(arg_str(arguments, "path")?);
        let recursive = arg_bool(arguments, "recursive", false);
        let max_depth = arg_u64(arguments, "maxDepth")
            .or_else(|| arg_u64(arguments, "max_depth"))
            .unwrap_or(DEFAULT_MAX_DEPTH);

        if !dir.exists() {
            return Err(ToolError::Rejected("Directory does not exist".into()));
        }
        if !dir.is_dir() {
            return Err(ToolError::Rejected("Path is not a directory".into()));
        }

        let root = dir.clone();
        let entries = tokio::task::spawn_blocking(move || list(&root, 0, max_depth, recursive))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "list_directory".into(),
                reason: e.to_string(),
            })?;

        Ok(json!({ "path": dir.display().to_string(), "entries": entries }))
    }
}

#[async_trait]
impl Plugin for ListDirectoryPlugin {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and directories in a given path"
    }

    fn parameters(&self) -> Vec<PluginParameter> {
        vec![
            PluginParameter::required(
                "path",
                ParamType::String,
                "The path to the directory to list (absolute or relative to current working directory)",
            ),
            PluginParameter::optional(
                "recursive",
                ParamType::Boolean,
                "Whether to list recursively (default: false)",
            ),
            PluginParameter::optional(
                "maxDepth",
                ParamType::Integer,
                "Maximum depth for recursive listing (default: 3)",
            ),
        ]
    }

    fn describe_running(&self, args: &Value) -> String {
        format!("Listing directory: {}", args["path"].as_str().unwrap_or(""))
    }

    fn describe_completed(&self, args: &Value, output: &PluginOutput) -> String {
        let path = args["path"].as_str().unwrap_or("");
        if output.success {
            let n = output
                .get("entries")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            format!("Listed directory: {path} ({n} entries)")
        } else {
            format!("Failed to list directory: {path}")
        }
    }

    async fn execute(&self, arguments: Value) -> PluginOutput {
        PluginOutput::from_result(self.run(&arguments).await)
    }
}
