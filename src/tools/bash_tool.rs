//! Bash tool: shell command execution with a timeout.

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use super::{InputSchema, Tool};

use crate::constants::{BASH_MAX_OUTPUT_SIZE, BASH_STRIPPED_ENV_VARS};

/// Tool that executes shell commands in a child process.
///
/// Commands run in `work_dir` with a timeout, an output size cap, and
/// credential environment variables stripped. Failures of the command
/// itself (non-zero exit, timeout, spawn error) are reported as output
/// text so the model can react to them.
pub struct BashTool {
    work_dir: PathBuf,
    timeout_secs: u64,
}

impl BashTool {
    /// Create a new `BashTool` running commands in `work_dir`.
    pub fn new(work_dir: PathBuf, timeout_secs: u64) -> Self {
        Self {
            work_dir,
            timeout_secs,
        }
    }
}

#[derive(Deserialize)]
struct BashInput {
    command: String,
}

/// Truncate `output` to at most `BASH_MAX_OUTPUT_SIZE` bytes, appending a
/// notice when truncation occurs.
fn cap_output(output: &str) -> String {
    if output.len() <= BASH_MAX_OUTPUT_SIZE {
        return output.to_string();
    }
    let mut end = BASH_MAX_OUTPUT_SIZE;
    while end > 0 && !output.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n... output truncated at {} bytes",
        &output[..end],
        BASH_MAX_OUTPUT_SIZE
    )
}

/// Lays out captured output as `STDOUT:` / `STDERR:` / `Exit code:` sections.
fn format_output(stdout: &str, stderr: &str, code: i32) -> String {
    let mut parts = Vec::new();
    if !stdout.is_empty() {
        parts.push(format!("STDOUT:\n{}", stdout));
    }
    if !stderr.is_empty() {
        parts.push(format!("STDERR:\n{}", stderr));
    }
    if code != 0 {
        parts.push(format!("Exit code: {}", code));
    }
    if parts.is_empty() {
        "Command executed successfully (no output)".to_string()
    } else {
        cap_output(&parts.join("\n"))
    }
}

#[async_trait::async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a bash command and return the output."
    }

    fn schema(&self) -> InputSchema {
        InputSchema::new().param("command", "string", "Shell command to execute", true)
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: BashInput = serde_json::from_value(input)?;

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(&input.command);
        cmd.current_dir(&self.work_dir);
        cmd.kill_on_drop(true);

        for var in BASH_STRIPPED_ENV_VARS {
            cmd.env_remove(var);
        }

        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        let child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                return Ok(Value::String(format!("Error executing command: {}", e)));
            }
        };

        let result = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await;

        let text = match result {
            Ok(Ok(output)) => format_output(
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
                output.status.code().unwrap_or(-1),
            ),
            Ok(Err(e)) => format!("Error executing command: {}", e),
            Err(_) => format!(
                "Error: Command timed out after {} seconds",
                self.timeout_secs
            ),
        };
        Ok(Value::String(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_output_sections() {
        assert_eq!(
            format_output("", "", 0),
            "Command executed successfully (no output)"
        );
        assert_eq!(format_output("hi\n", "", 0), "STDOUT:\nhi\n");
        assert_eq!(
            format_output("", "boom\n", 2),
            "STDERR:\nboom\n\nExit code: 2"
        );
    }

    #[test]
    fn test_cap_output_respects_char_boundary() {
        let long = "é".repeat(BASH_MAX_OUTPUT_SIZE);
        let capped = cap_output(&long);
        assert!(capped.ends_with(&format!("truncated at {} bytes", BASH_MAX_OUTPUT_SIZE)));
    }
}
