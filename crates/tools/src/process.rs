//! Child-process helpers shared by the command-running plugins.

use quill_core::PluginOutput;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// -1 when the process was killed by a signal
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// `{stdout, stderr, exit_code}`, trimmed. Non-zero exits become failures.
    pub fn into_plugin_output(self) -> PluginOutput {
        let data = serde_json::json!({
            "stdout": self.stdout.trim(),
            "stderr": self.stderr.trim(),
            "exit_code": self.exit_code,
        });
        if self.success() {
            PluginOutput::ok(data)
        } else {
            let error = match self.stderr.trim() {
                "" => format!("Command exited with code {}", self.exit_code),
                stderr => stderr.to_string(),
            };
            PluginOutput::failed_with(error, data)
        }
    }
}

/// Run `command` through the platform shell.
pub async fn run_shell(command: &str, cwd: Option<&Path>) -> std::io::Result<CommandOutput> {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", command]);
        c
    } else {
        let mut c = Command::new("sh");
        c.args(["-c", command]);
        c
    };
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    debug!(command = %command, "Executing shell command");
    collect(cmd).await
}

/// Run `program` with explicit arguments (no shell interpolation).
pub async fn run_program(program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    debug!(program, ?args, "Executing program");
    collect(cmd).await
}

async fn collect(mut cmd: Command) -> std::io::Result<CommandOutput> {
    cmd.kill_on_drop(true);
    let output = cmd.output().await?;
    let exit_code = output.status.code().unwrap_or(-1);
    if exit_code != 0 {
        warn!(exit_code, "Command failed");
    }
    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code,
    })
}

/// The failure reported when a command could not be spawned at all.
pub fn spawn_failure(error: std::io::Error) -> PluginOutput {
    let message = error.to_string();
    PluginOutput::failed_with(
        message.clone(),
        serde_json::json!({ "stdout": "", "stderr": message, "exit_code": -1 }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = run_shell("echo hello && echo oops 1>&2", None).await.unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn non_zero_exit_is_failure_with_data() {
        let out = run_shell("exit 3", None).await.unwrap();
        let plugin_output = out.into_plugin_output();
        assert!(!plugin_output.success);
        assert_eq!(plugin_output.get("exit_code").unwrap(), 3);
        assert_eq!(
            plugin_output.error.as_deref(),
            Some("Command exited with code 3")
        );
    }

    #[tokio::test]
    async fn honours_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let out = run_shell("ls", Some(dir.path())).await.unwrap();
        assert!(out.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn missing_program_is_io_error() {
        let result = run_program("quill-definitely-not-a-binary", &[]).await;
        assert!(result.is_err());
        let output = spawn_failure(result.unwrap_err());
        assert_eq!(output.get("exit_code").unwrap(), -1);
    }
}
