//! Bash plugin: execute shell commands.

use async_trait::async_trait;
use quill_core::plugin::{ParamType, Plugin, PluginOutput, PluginParameter, arg_str};
use serde_json::Value;

use crate::process::{run_shell, spawn_failure};

/// Runs `sh -c <command>` in the current working directory.
///
/// No allowlist: commands run with the caller's privileges.
pub struct BashPlugin;

#[async_trait]
impl Plugin for BashPlugin {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute bash commands and return the output. Use this for running programs, \
         checking system state, building and testing code."
    }

    fn parameters(&self) -> Vec<PluginParameter> {
        vec![PluginParameter::required(
            "command",
            ParamType::String,
            "The bash command to execute",
        )]
    }

    fn describe_running(&self, args: &Value) -> String {
        format!("Executing: {}", args["command"].as_str().unwrap_or(""))
    }

    fn describe_completed(&self, args: &Value, _output: &PluginOutput) -> String {
        format!("Executed: {}", args["command"].as_str().unwrap_or(""))
    }

    async fn execute(&self, arguments: Value) -> PluginOutput {
        let command = match arg_str(&arguments, "command") {
            Ok(c) => c,
            Err(e) => return PluginOutput::failed(e.to_string()),
        };

        match run_shell(command, None).await {
            Ok(output) => output.into_plugin_output(),
            Err(e) => spawn_failure(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_echo() {
        let output = BashPlugin
            .execute(serde_json::json!({"command": "echo hello"}))
            .await;
        assert!(output.success);
        assert_eq!(output.get("stdout").unwrap(), "hello");
        assert_eq!(output.get("exit_code").unwrap(), 0);
    }

    #[tokio::test]
    async fn failing_command_reports_stderr() {
        let output = BashPlugin
            .execute(serde_json::json!({"command": "ls /quill/definitely/missing"}))
            .await;
        assert!(!output.success);
        assert!(!output.get("stderr").unwrap().as_str().unwrap().is_empty());
        assert_ne!(output.get("exit_code").unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_command_argument() {
        let output = BashPlugin.execute(serde_json::json!({})).await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("command"));
    }

    #[test]
    fn progress_descriptions() {
        let args = serde_json::json!({"command": "cargo test"});
        assert_eq!(BashPlugin.describe_running(&args), "Executing: cargo test");
        assert_eq!(
            BashPlugin.describe_completed(&args, &PluginOutput::ok(Value::Null)),
            "Executed: cargo test"
        );
    }
}
