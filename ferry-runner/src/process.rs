//! External process execution
//!
//! Every external tool the pipeline drives (git, python, docker, aws) is
//! invoked through a `ProcessRunner`. The system implementation spawns real
//! child processes; tests substitute a scripted runner.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{FerryError, Result};
use crate::secrets::SECRET_VARS;
use crate::service::LogBufferService;

/// A command to run
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Extra environment, added after secrets are scrubbed
    pub envs: Vec<(String, String)>,
    /// Data written to the child's stdin
    pub stdin: Option<String>,
    /// Stdout carries a secret and must never be logged
    pub sensitive_output: bool,
    /// Positions in `args` left out of the printed command line
    pub redacted: Vec<usize>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Argument whose value must not show up in logs or errors
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.redacted.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn envs<I>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.envs.extend(envs);
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn sensitive_output(mut self) -> Self {
        self.sensitive_output = true;
        self
    }

    /// Command line for log messages
    ///
    /// Environment values, stdin and secret arguments are never included.
    pub fn command_line(&self) -> String {
        let args = self.args.iter().enumerate().map(|(i, arg)| {
            if self.redacted.contains(&i) {
                "<redacted>"
            } else {
                arg.as_str()
            }
        });

        std::iter::once(self.program.as_str())
            .chain(args)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Value of an environment override, if set
    #[cfg(test)]
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.envs.iter().map(|(k, _)| k.as_str()).collect();

        f.debug_struct("CommandSpec")
            .field("command", &self.command_line())
            .field("cwd", &self.cwd)
            .field("env", &env_keys)
            .field("stdin", &self.stdin.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turns a non-zero exit into a `Process` error
    pub fn check(self, spec: &CommandSpec) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }

        Err(FerryError::Process {
            command: spec.command_line(),
            exit_code: self.exit_code,
            stderr: self.stderr.trim().to_string(),
        })
    }
}

/// Runs external commands
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs a command to completion, capturing its output
    ///
    /// A non-zero exit is not an error at this level.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Runs a command and fails on non-zero exit
    async fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.run(spec).await?.check(spec)
    }
}

/// Spawns real child processes
///
/// Secret variables inherited from the parent are removed from every child.
/// A stage that needs one passes it explicitly through `CommandSpec::env`.
pub struct SystemProcessRunner {
    scrubbed: Vec<String>,
}

impl SystemProcessRunner {
    pub fn new() -> Self {
        Self {
            scrubbed: SECRET_VARS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for SystemProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!("Executing: {}", spec.command_line());

        let mut command = tokio::process::Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        for key in &self.scrubbed {
            command.env_remove(key);
        }
        for (key, value) in &spec.envs {
            command.env(key, value);
        }

        let spawn_error = |source| FerryError::Spawn {
            program: spec.program.clone(),
            source,
        };

        let mut child = command.spawn().map_err(spawn_error)?;

        if let Some(input) = &spec.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(input.as_bytes())
                    .await
                    .map_err(spawn_error)?;
                // Dropping closes the pipe so the child sees EOF
                drop(stdin);
            }
        }

        let output = child.wait_with_output().await.map_err(spawn_error)?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        debug!(
            "Command '{}' exited with {} (stdout_len={}, stderr_len={})",
            spec.program,
            result.exit_code,
            result.stdout.len(),
            result.stderr.len()
        );

        Ok(result)
    }
}

/// Copies every command and its output into the run log
pub struct LoggingProcessRunner {
    inner: Arc<dyn ProcessRunner>,
    log_buffer: Arc<dyn LogBufferService>,
}

impl LoggingProcessRunner {
    pub fn new(inner: Arc<dyn ProcessRunner>, log_buffer: Arc<dyn LogBufferService>) -> Self {
        Self { inner, log_buffer }
    }

    fn log_output(&self, output: &str, warning: bool) {
        let trimmed = output.trim();
        if trimmed.is_empty() {
            return;
        }

        if warning {
            self.log_buffer.log_warning(trimmed.to_string());
        } else {
            self.log_buffer.log_info(trimmed.to_string());
        }
    }
}

#[async_trait]
impl ProcessRunner for LoggingProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.log_buffer.log_info(format!("$ {}", spec.command_line()));

        let output = match self.inner.run(spec).await {
            Ok(output) => output,
            Err(e) => {
                self.log_buffer.log_error(e.to_string());
                return Err(e);
            }
        };

        if !spec.sensitive_output {
            self.log_output(&output.stdout, false);
        }
        self.log_output(&output.stderr, !output.success());

        if !output.success() {
            self.log_buffer.log_error(format!(
                "'{}' exited with code {}",
                spec.program, output.exit_code
            ));
        }

        Ok(output)
    }
}
