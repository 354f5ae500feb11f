//! External command execution.
//!
//! Package managers, shadow-utils and hooks are all driven through the
//! [`CommandRunner`] seam so the orchestration logic can be exercised
//! without touching the real user database or package cache.

use async_trait::async_trait;
use hostbridge_shared::errors::{HostbridgeError, HostbridgeResult};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;

/// A single command line, built like `std::process::Command`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    stdin: Option<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Feed `input` to the child's stdin.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    #[cfg(test)]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    #[cfg(test)]
    pub fn get_stdin(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    /// Command line as a single string, for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command.
#[derive(Clone, Debug, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Turn a non-zero exit into [`HostbridgeError::Command`].
    pub fn check(self, invocation: &Invocation) -> HostbridgeResult<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(HostbridgeError::Command {
            program: invocation.program().to_string(),
            status: self
                .status
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            stderr: self.stderr.trim().to_string(),
        })
    }
}

/// Runs external commands and answers PATH lookups.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. `Err` only when the command could not be spawned;
    /// a non-zero exit is reported through [`CommandOutput::status`].
    async fn run(&self, invocation: &Invocation) -> HostbridgeResult<CommandOutput>;

    /// Whether `program` resolves to an executable on PATH.
    fn has_command(&self, program: &str) -> bool;

    /// Run and require a zero exit status.
    async fn run_checked(&self, invocation: &Invocation) -> HostbridgeResult<CommandOutput> {
        self.run(invocation).await?.check(invocation)
    }
}

/// Runs commands on the real system via `tokio::process`.
#[derive(Debug, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> HostbridgeResult<CommandOutput> {
        tracing::debug!("Running: {}", invocation.display());

        let mut cmd = tokio::process::Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn().map_err(|e| {
            HostbridgeError::Internal(format!("Failed to run {}: {}", invocation.program, e))
        })?;

        if let (Some(input), Some(mut stdin)) = (invocation.stdin.as_ref(), child.stdin.take()) {
            stdin.write_all(input.as_bytes()).await.map_err(|e| {
                HostbridgeError::Internal(format!(
                    "Failed to write stdin of {}: {}",
                    invocation.program, e
                ))
            })?;
            // Dropping closes the pipe so the child sees EOF.
            drop(stdin);
        }

        let output = child.wait_with_output().await.map_err(|e| {
            HostbridgeError::Internal(format!("Failed to wait for {}: {}", invocation.program, e))
        })?;

        let result = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() {
            tracing::debug!(
                "{} exited with {:?}: {}",
                invocation.program,
                result.status,
                result.stderr.trim()
            );
        }
        Ok(result)
    }

    fn has_command(&self, program: &str) -> bool {
        find_in_path(program).is_some()
    }
}

/// Locate an executable the way `command -v` does.
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = Path::new(program);
        return is_executable(path).then(|| path.to_path_buf());
    }

    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
