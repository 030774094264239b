//! Read file plugin.

use async_trait::async_trait;
use quill_core::ToolError;
use quill_core::plugin::{ParamType, Plugin, PluginOutput, PluginParameter, arg_str};
use serde_json::Value;
use tracing::debug;

use crate::fs::resolve_path;

/// Reads a UTF-8 file, resolving relative paths against the working directory.
pub struct ReadFilePlugin;

impl ReadFilePlugin {
    async fn read(&self, arguments: &Value) -> Result<Value, ToolError> {
        let path = resolve_path(arg_str(arguments, "path")?);
        debug!(path = %path.display(), "Reading file");

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ToolError::Rejected(format!("Failed to read {}: {e}", path.display()))
        })?;

        Ok(serde_json::json!({
            "size": content.len(),
            "path": path.display().to_string(),
            "content": content,
        }))
    }
}

#[async_trait]
impl Plugin for ReadFilePlugin {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file from the filesystem"
    }

    fn parameters(&self) -> Vec<PluginParameter> {
        vec![PluginParameter::required(
            "path",
            ParamType::String,
            "The path to the file to read (absolute or relative to current working directory)",
        )]
    }

    fn describe_running(&self, args: &Value) -> String {
        format!("Reading file: {}", args["path"].as_str().unwrap_or(""))
    }

    fn describe_completed(&self, args: &Value, output: &PluginOutput) -> String {
        let path = args["path"].as_str().unwrap_or("");
        if output.success {
            let size = output.get("size").and_then(Value::as_u64).unwrap_or(0);
            format!("Read file: {path} ({size} bytes)")
        } else {
            format!("Failed to read file: {path}")
        }
    }

    async fn execute(&self, arguments: Value) -> PluginOutput {
        PluginOutput::from_result(self.read(&arguments).await)
    }
}
