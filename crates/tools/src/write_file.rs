//! Write file plugin.

use async_trait::async_trait;
use quill_core::ToolError;
use quill_core::plugin::{ParamType, Plugin, PluginOutput, PluginParameter, arg_str};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::fs::{PathLocks, resolve_path, write_atomic};

/// Writes a file, creating parent directories as needed.
pub struct WriteFilePlugin {
    locks: Arc<PathLocks>,
}

impl WriteFilePlugin {
    pub fn new(locks: Arc<PathLocks>) -> Self {
        Self { locks }
    }

    async fn write(&self, arguments: &Value) -> Result<Value, ToolError> {
        let path = resolve_path(arg_str(arguments, "path")?);
        let content = arg_str(arguments, "content")?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let _guard = self.locks.lock(&path).await;
        debug!(path = %path.display(), bytes = content.len(), "Writing file");
        write_atomic(&path, content).await.map_err(|e| {
            ToolError::Rejected(format!("Failed to write {}: {e}", path.display()))
        })?;

        Ok(serde_json::json!({
            "path": path.display().to_string(),
            "size": content.len(),
        }))
    }
}

#[async_trait]
impl Plugin for WriteFilePlugin {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating the file and parent directories if they do not exist"
    }

    fn parameters(&self) -> Vec<PluginParameter> {
        vec![
            PluginParameter::required(
                "path",
                ParamType::String,
                "The path to the file to write (absolute or relative to current working directory)",
            ),
            PluginParameter::required(
                "content",
                ParamType::String,
                "The content to write to the file",
            ),
        ]
    }

    fn describe_running(&self, args: &Value) -> String {
        format!("Writing file: {}", args["path"].as_str().unwrap_or(""))
    }

    fn describe_completed(&self, args: &Value, output: &PluginOutput) -> String {
        let path = args["path"].as_str().unwrap_or("");
        if output.success {
            let size = output.get("size").and_then(Value::as_u64).unwrap_or(0);
            format!("Wrote file: {path} ({size} bytes)")
        } else {
            format!("Failed to write file: {path}")
        }
    }

    async fn execute(&self, arguments: Value) -> PluginOutput {
        PluginOutput::from_result(self.write(&arguments).await)
    }
}
