//! Git plugin.

use async_trait::async_trait;
use quill_core::plugin::{ParamType, Plugin, PluginOutput, PluginParameter, arg_opt_str, arg_str};
use serde_json::Value;
use std::path::PathBuf;

use crate::fs::resolve_path;
use crate::process::{run_shell, spawn_failure};

/// Runs `git <args>` through the shell, optionally in another directory.
pub struct GitPlugin;

#[async_trait]
impl Plugin for GitPlugin {
    fn name(&self) -> &str {
        "git"
    }

    fn description(&self) -> &str {
        "Execute git commands and return the output"
    }

    fn parameters(&self) -> Vec<PluginParameter> {
        vec![
            PluginParameter::required(
                "args",
                ParamType::String,
                "The git command arguments (e.g., \"status\", \"log --oneline -5\", \"diff HEAD~1\")",
            ),
            PluginParameter::optional(
                "cwd",
                ParamType::String,
                "Optional working directory to run the git command in",
            ),
        ]
    }

    fn describe_running(&self, args: &Value) -> String {
        format!("Running: git {}", args["args"].as_str().unwrap_or(""))
    }

    fn describe_completed(&self, args: &Value, output: &PluginOutput) -> String {
        let git_args = args["args"].as_str().unwrap_or("");
        if output.success {
            format!("Completed: git {git_args}")
        } else {
            format!("Failed: git {git_args}")
        }
    }

    async fn execute(&self, arguments: Value) -> PluginOutput {
        let git_args = match arg_str(&arguments, "args") {
            Ok(a) => a,
            Err(e) => return PluginOutput::failed(e.to_string()),
        };
        let cwd: Option<PathBuf> = arg_opt_str(&arguments, "cwd").map(resolve_path);

        match run_shell(&format!("git {git_args}"), cwd.as_deref()).await {
            Ok(output) => output.into_plugin_output(),
            Err(e) => spawn_failure(e),
        }
    }
}
