//! Execution context for a single bootstrap run.

use hostbridge_shared::constants::shell;
use std::path::{Path, PathBuf};

/// Identity and mode of this run, built once from arguments.
///
/// Everything is fixed for the run except [`effective_shell`], which the
/// dependency step may replace with the fallback shell when the requested
/// one cannot be installed. Later steps read the effective value, never
/// the environment.
///
/// [`effective_shell`]: ExecutionContext::effective_shell
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionContext {
    pub username: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
    requested_shell: PathBuf,
    effective_shell: PathBuf,
    /// Exec into the init system instead of idling.
    pub init: bool,
    /// Shell snippet run before dependency installation.
    pub pre_init_hook: Option<String>,
    /// Shell snippet run after all bridging, before the terminal phase.
    pub init_hook: Option<String>,
    /// Value of the `container` environment variable, if set.
    pub runtime_hint: Option<String>,
}

impl ExecutionContext {
    pub fn new(
        username: impl Into<String>,
        uid: u32,
        gid: u32,
        home: impl Into<PathBuf>,
        shell_path: Option<PathBuf>,
    ) -> Self {
        let shell_path = shell_path
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(shell::DEFAULT));
        Self {
            username: username.into(),
            uid,
            gid,
            home: home.into(),
            requested_shell: shell_path.clone(),
            effective_shell: shell_path,
            init: false,
            pre_init_hook: None,
            init_hook: None,
            runtime_hint: None,
        }
    }

    /// Shell the host asked for.
    pub fn requested_shell(&self) -> &Path {
        &self.requested_shell
    }

    /// Shell assigned to the user; may differ from the requested one after
    /// a fallback.
    pub fn effective_shell(&self) -> &Path {
        &self.effective_shell
    }

    pub fn set_effective_shell(&mut self, shell_path: impl Into<PathBuf>) {
        self.effective_shell = shell_path.into();
    }

    /// Package name of the effective shell (`/usr/bin/zsh` → `zsh`).
    pub fn shell_package(&self) -> String {
        shell_name(&self.effective_shell)
    }

    pub fn shell_fell_back(&self) -> bool {
        self.requested_shell != self.effective_shell
    }
}

/// Base name of a shell path.
pub fn shell_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
