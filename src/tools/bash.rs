//! Persistent bash session tool.
//!
//! One `/bin/bash` process lives for the whole run, so working directory,
//! exported variables and shell functions carry over between calls. Each
//! command is followed by a sentinel line; everything printed before it is
//! the command's output. stderr is folded into stdout when the session
//! starts.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::agent::tool::{Tool, ToolArguments, ToolExecutionResult, format_duration};
use crate::error::ToolError;

const TOOL_NAME: &str = "bash";
const SHELL: &str = "/bin/bash";
const SENTINEL: &str = "<<qa-agent-bash-exit>>";

/// Default time a single command may run before the session is marked timed out.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Headroom between the session's own timeout and the collection's hard timeout.
const TIMEOUT_GRACE: Duration = Duration::from_secs(5);

struct BashSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    /// Set while a command is in flight and left set if it never finished.
    timed_out: bool,
}

impl BashSession {
    async fn spawn() -> Result<Self, ToolError> {
        let mut child = Command::new(SHELL)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| execution_error(format!("failed to start {SHELL}: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| execution_error("failed to capture bash stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| execution_error("failed to capture bash stdout"))?;

        stdin
            .write_all(b"exec 2>&1\n")
            .await
            .map_err(|e| execution_error(format!("failed to configure bash session: {e}")))?;

        debug!(pid = child.id(), "bash session started");
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            timed_out: false,
        })
    }

    /// Sends one command and collects its output up to the sentinel.
    ///
    /// Returns `Ok(None)` on timeout.
    async fn run(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> std::io::Result<Option<(String, Option<i32>)>> {
        let script = format!("{command}\nprintf '%s%s\\n' '{SENTINEL}' \"$?\"\n");
        self.timed_out = true;
        self.stdin.write_all(script.as_bytes()).await?;
        self.stdin.flush().await?;

        let outcome = tokio::time::timeout(timeout, read_until_sentinel(&mut self.stdout)).await;
        match outcome {
            Ok(Ok(done)) => {
                self.timed_out = false;
                Ok(Some(done))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    async fn kill(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(error = %e, "failed to kill bash session");
        }
    }
}

/// Runs shell commands in a persistent bash session.
pub struct BashTool {
    session: Mutex<Option<BashSession>>,
    command_timeout: Duration,
}

impl BashTool {
    /// Creates a tool with the default command timeout. The shell starts lazily.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_COMMAND_TIMEOUT)
    }

    /// Creates a tool whose commands may run for at most `command_timeout`.
    #[must_use]
    pub fn with_timeout(command_timeout: Duration) -> Self {
        Self {
            session: Mutex::new(None),
            command_timeout,
        }
    }

    async fn restart(&self) -> Result<ToolExecutionResult, ToolError> {
        let mut guard = self.session.lock().await;
        if let Some(old) = guard.take() {
            old.kill().await;
        }
        *guard = Some(BashSession::spawn().await?);
        Ok(ToolExecutionResult::ok("bash session restarted"))
    }

    async fn run_command(&self, command: &str) -> Result<ToolExecutionResult, ToolError> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(BashSession::spawn().await?);
        }
        let Some(session) = guard.as_mut() else {
            return Err(execution_error("bash session unavailable"));
        };

        if session.timed_out {
            return Ok(ToolExecutionResult::failure(
                "bash session timed out previously; call bash with {\"restart\": true} to continue",
            ));
        }

        match session.run(command, self.command_timeout).await {
            Ok(Some((output, exit_code))) => {
                let mut result = ToolExecutionResult::ok(output.trim_end_matches('\n'));
                if let Some(code) = exit_code {
                    result = result.with_metadata("exit_code", code);
                }
                Ok(result)
            }
            Ok(None) => {
                warn!(command, "bash command timed out");
                Ok(ToolExecutionResult::failure(format!(
                    "bash command timed out after {}",
                    format_duration(&self.command_timeout)
                )))
            }
            Err(e) => {
                // the shell is gone; the next call starts a fresh one
                if let Some(dead) = guard.take() {
                    dead.kill().await;
                }
                Ok(ToolExecutionResult::failure(format!("bash session failed: {e}")))
            }
        }
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BashTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BashTool")
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Execute shell commands in a persistent bash session. State such as the working \
         directory and exported variables is kept between calls. Pass {\"restart\": true} \
         to start a fresh session."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to run"
                },
                "restart": {
                    "type": "boolean",
                    "description": "Kill the current session and start a new one"
                }
            },
            "required": []
        })
    }

    fn timeout(&self) -> Duration {
        self.command_timeout.saturating_add(TIMEOUT_GRACE)
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<ToolExecutionResult, ToolError> {
        if arguments
            .get("restart")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return self.restart().await;
        }

        match arguments.get("command") {
            Some(Value::String(command)) if !command.trim().is_empty() => {
                self.run_command(command).await
            }
            Some(Value::String(_)) | None => Ok(ToolExecutionResult::failure(
                "Missing 'command'. Provide {\"command\": \"<shell command>\"}",
            )),
            Some(other) => Err(ToolError::InvalidArguments {
                name: TOOL_NAME.to_string(),
                message: format!("'command' must be a string, got {other}"),
            }),
        }
    }

    async fn close(&self) -> Result<(), ToolError> {
        if let Some(session) = self.session.lock().await.take() {
            session.kill().await;
        }
        Ok(())
    }
}

/// Reads lines until the sentinel, returning the output and the exit status.
async fn read_until_sentinel(
    stdout: &mut Lines<BufReader<ChildStdout>>,
) -> std::io::Result<(String, Option<i32>)> {
    let mut output = String::new();
    while let Some(line) = stdout.next_line().await? {
        if let Some(pos) = line.find(SENTINEL) {
            output.push_str(&line[..pos]);
            let exit_code = line[pos + SENTINEL.len()..].trim().parse::<i32>().ok();
            return Ok((output, exit_code));
        }
        output.push_str(&line);
        output.push('\n');
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "bash session exited",
    ))
}

fn execution_error(message: impl Into<String>) -> ToolError {
    ToolError::Execution {
        name: TOOL_NAME.to_string(),
        message: message.into(),
    }
}
