//! Edit file plugin: exact string replacement.
//!
//! The whole read-modify-write runs under the shared per-path lock, and the
//! new content lands through a temp file + rename.

use async_trait::async_trait;
use quill_core::ToolError;
use quill_core::plugin::{ParamType, Plugin, PluginOutput, PluginParameter, arg_bool, arg_str};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::fs::{PathLocks, resolve_path, write_atomic};

pub struct EditFilePlugin {
    locks: Arc<PathLocks>,
}

/// Apply the replacement to `content`, returning the new text and the
/// number of replacements made.
pub fn apply_edit(
    content: &str,
    old_string: &str,
    new_string: &str,
    replace_all: bool,
) -> Result<(String, usize), ToolError> {
    if old_string.is_empty() || !content.contains(old_string) {
        return Err(ToolError::Rejected("old_string not found in file".into()));
    }

    let occurrences = content.matches(old_string).count();
    if !replace_all && occurrences > 1 {
        return Err(ToolError::Rejected(format!(
            "old_string found {occurrences} times. Use replace_all: true to replace all, \
             or provide a more unique string."
        )));
    }

    if replace_all {
        Ok((content.replace(old_string, new_string), occurrences))
    } else {
        Ok((content.replacen(old_string, new_string, 1), 1))
    }
}

impl EditFilePlugin {
    pub fn new(locks: Arc<PathLocks>) -> Self {
        Self { locks }
    }

    async fn edit(&self, arguments: &Value) -> Result<Value, ToolError> {
        let path = resolve_path(arg_str(arguments, "path")?);
        let old_string = arg_str(arguments, "old_string")?;
        let new_string = arg_str(arguments, "new_string")?;
        let replace_all = arg_bool(arguments, "replace_all", false);

        let _guard = self.locks.lock(&path).await;

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ToolError::Rejected(format!("Failed to read {}: {e}", path.display()))
        })?;
        let (updated, replacements) = apply_edit(&content, old_string, new_string, replace_all)?;

        debug!(path = %path.display(), replacements, "Editing file");
        write_atomic(&path, &updated).await.map_err(|e| {
            ToolError::Rejected(format!("Failed to write {}: {e}", path.display()))
        })?;

        Ok(serde_json::json!({
            "path": path.display().to_string(),
            "replacements": replacements,
        }))
    }
}

#[async_trait]
impl Plugin for EditFilePlugin {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit a file by replacing a specific string with new content. The old_string must match exactly."
    }

    fn parameters(&self) -> Vec<PluginParameter> {
        vec![
            PluginParameter::required("path", ParamType::String, "The path to the file to edit"),
            PluginParameter::required(
                "old_string",
                ParamType::String,
                "The exact string to search for and replace (must be unique in the file)",
            ),
            PluginParameter::required(
                "new_string",
                ParamType::String,
                "The string to replace old_string with",
            ),
            PluginParameter::optional(
                "replace_all",
                ParamType::Boolean,
                "Whether to replace all occurrences (default: false)",
            ),
        ]
    }

    fn describe_running(&self, args: &Value) -> String {
        format!("Editing file: {}", args["path"].as_str().unwrap_or(""))
    }

    fn describe_completed(&self, args: &Value, output: &PluginOutput) -> String {
        let path = args["path"].as_str().unwrap_or("");
        if output.success {
            let n = output
                .get("replacements")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let suffix = if n == 1 { "" } else { "s" };
            format!("Edited file: {path} ({n} replacement{suffix})")
        } else {
            format!("Failed to edit file: {path}")
        }
    }

    async fn execute(&self, arguments: Value) -> PluginOutput {
        PluginOutput::from_result(self.edit(&arguments).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin() -> EditFilePlugin {
        EditFilePlugin::new(Arc::new(PathLocks::new()))
    }

    #[test]
    fn single_occurrence_is_replaced() {
        let (out, n) = apply_edit("let x = 1;", "1", "2", false).unwrap();
        assert_eq!(out, "let x = 2;");
        assert_eq!(n, 1);
    }

    #[test]
    fn ambiguous_edit_is_rejected() {
        let err = apply_edit("a a a", "a", "b", false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "old_string found 3 times. Use replace_all: true to replace all, or provide a more unique string."
        );
    }

    #[test]
    fn replace_all_counts_occurrences() {
        let (out, n) = apply_edit("a a a", "a", "b", true).unwrap();
        assert_eq!(out, "b b b");
        assert_eq!(n, 3);
    }

    #[test]
    fn missing_string_is_rejected() {
        let err = apply_edit("abc", "zzz", "y", false).unwrap_err();
        assert_eq!(err.to_string(), "old_string not found in file");
    }

    #[tokio::test]
    async fn edits_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.rs");
        std::fs::write(&path, "fn main() { old(); old(); }").unwrap();

        let args = serde_json::json!({
            "path": path.to_str().unwrap(),
            "old_string": "old()",
            "new_string": "new()",
            "replace_all": true,
        });
        let output = plugin().execute(args.clone()).await;

        assert!(output.success);
        assert_eq!(output.get("replacements").unwrap(), 2);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "fn main() { new(); new(); }"
        );
        assert!(plugin().describe_completed(&args, &output).ends_with("(2 replacements)"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn editing_a_script_keeps_it_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.sh");
        std::fs::write(&path, "#!/bin/sh\necho old\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let output = plugin()
            .execute(serde_json::json!({
                "path": path.to_str().unwrap(),
                "old_string": "old",
                "new_string": "new",
            }))
            .await;

        assert!(output.success);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "#!/bin/sh\necho new\n");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[tokio::test]
    async fn failed_edit_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.txt");
        std::fs::write(&path, "x x").unwrap();

        let output = plugin()
            .execute(serde_json::json!({
                "path": path.to_str().unwrap(),
                "old_string": "x",
                "new_string": "y",
            }))
            .await;

        assert!(!output.success);
        assert!(output.error.unwrap().starts_with("old_string found 2 times"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x x");
    }

    #[tokio::test]
    async fn concurrent_edits_do_not_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.txt");
        std::fs::write(&path, "A B").unwrap();
        let plugin = Arc::new(plugin());

        let first = {
            let plugin = plugin.clone();
            let p = path.to_str().unwrap().to_string();
            tokio::spawn(async move {
                plugin
                    .execute(serde_json::json!({"path": p, "old_string": "A", "new_string": "1"}))
                    .await
            })
        };
        let second = {
            let plugin = plugin.clone();
            let p = path.to_str().unwrap().to_string();
            tokio::spawn(async move {
                plugin
                    .execute(serde_json::json!({"path": p, "old_string": "B", "new_string": "2"}))
                    .await
            })
        };

        assert!(first.await.unwrap().success);
        assert!(second.await.unwrap().success);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1 2");
    }
}
