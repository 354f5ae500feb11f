//! Error types shared by every hostbridge component.
//!
//! Errors fall into two classes:
//! - fatal: returned up to `main`, which maps them to an exit status via
//!   [`HostbridgeError::exit_code`]
//! - degraded: logged as warnings by the caller, never returned
//!
//! Only the fatal variants carry a dedicated exit status; everything else
//! exits with [`exit::FAILURE`](crate::constants::exit::FAILURE).

use crate::constants::exit;
use std::io;
use thiserror::Error;

/// Result alias used across the workspace.
pub type HostbridgeResult<T> = Result<T, HostbridgeError>;

#[derive(Debug, Error)]
pub enum HostbridgeError {
    /// Unknown flag or malformed flag value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A required identity argument was not supplied.
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// No container runtime marker was found.
    #[error("not running inside a container: {0}")]
    NotInContainer(String),

    /// None of the known package manager executables is on PATH.
    #[error("no supported package manager found (probed: {0})")]
    NoBackend(String),

    /// An external command exited unsuccessfully.
    #[error("{program} exited with status {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    /// Mandatory dependency installation failed.
    #[error("dependency installation failed: {0}")]
    Dependency(String),

    /// Bind mount or unmount failure.
    #[error("mount: {0}")]
    Mount(String),

    /// User or group database failure.
    #[error("identity: {0}")]
    Identity(String),

    /// Filesystem artifact could not be written or read.
    #[error("storage: {0}")]
    Storage(String),

    /// A user supplied hook failed.
    #[error("hook failed: {0}")]
    Hook(String),

    /// Terminal hand-off failed (signal setup, exec).
    #[error("terminal: {0}")]
    Terminal(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl HostbridgeError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => exit::INVALID_ARGUMENT,
            Self::MissingArgument(_) => exit::MISSING_ARGUMENT,
            Self::NotInContainer(_) => exit::NOT_IN_CONTAINER,
            Self::NoBackend(_) => exit::NO_BACKEND,
            _ => exit::FAILURE,
        }
    }
}

impl From<String> for HostbridgeError {
    fn from(msg: String) -> Self {
        Self::Internal(msg)
    }
}

impl From<&str> for HostbridgeError {
    fn from(msg: &str) -> Self {
        Self::Internal(msg.to_string())
    }
}
