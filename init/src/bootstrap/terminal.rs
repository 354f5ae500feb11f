//! Terminal phase: idle until told to stop, or become the init system.

use crate::bridge::{table::INIT_SENSITIVE_TARGETS, Mounter};
use hostbridge_shared::constants::init;
use hostbridge_shared::errors::{HostbridgeError, HostbridgeResult};
use hostbridge_shared::RootLayout;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};

/// What the process does once bootstrap is complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminalAction {
    /// Keep the container alive until SIGTERM or SIGINT.
    Idle,
    /// Release init-owned bridges and exec the init system.
    ExecInit,
}

impl TerminalAction {
    /// Perform the action.
    ///
    /// `Idle` returns once a termination signal arrives. `ExecInit` only
    /// returns if the exec itself failed.
    pub async fn enter(self, layout: &RootLayout, mounter: &dyn Mounter) -> HostbridgeResult<()> {
        match self {
            Self::Idle => wait_for_termination().await,
            Self::ExecInit => {
                let released = release_init_sensitive(layout, mounter);
                tracing::info!("Released {} bridges for init", released.len());
                Err(exec_init(layout))
            }
        }
    }
}

/// Unmount the bridges a real init must own. Returns the targets that
/// were unmounted.
pub fn release_init_sensitive(layout: &RootLayout, mounter: &dyn Mounter) -> Vec<PathBuf> {
    let mut released = Vec::new();
    for target in INIT_SENSITIVE_TARGETS {
        let resolved = layout.resolve(target);
        match mounter.is_mountpoint(&resolved) {
            Ok(true) => match mounter.unmount(&resolved) {
                Ok(()) => released.push(PathBuf::from(target)),
                Err(e) => tracing::warn!("Cannot unmount {}: {}", target, e),
            },
            Ok(false) => {}
            Err(e) => tracing::debug!("Cannot inspect {}: {}", target, e),
        }
    }
    released
}

async fn wait_for_termination() -> HostbridgeResult<()> {
    let mut term = signal(SignalKind::terminate())
        .map_err(|e| HostbridgeError::Terminal(format!("Failed to watch SIGTERM: {}", e)))?;
    let mut int = signal(SignalKind::interrupt())
        .map_err(|e| HostbridgeError::Terminal(format!("Failed to watch SIGINT: {}", e)))?;

    tracing::info!("Idling until terminated");
    tokio::select! {
        _ = term.recv() => tracing::info!("Received SIGTERM"),
        _ = int.recv() => tracing::info!("Received SIGINT"),
    }
    Ok(())
}

fn exec_init(layout: &RootLayout) -> HostbridgeError {
    let path = layout.resolve(init::ENTRYPOINT);
    let program = match CString::new(path.as_os_str().as_bytes()) {
        Ok(program) => program,
        Err(e) => return HostbridgeError::Terminal(format!("Invalid init path: {}", e)),
    };
    let argv0 = match CString::new(init::ENTRYPOINT) {
        Ok(argv0) => argv0,
        Err(e) => return HostbridgeError::Terminal(format!("Invalid init name: {}", e)),
    };

    tracing::info!("Executing {}", path.display());
    match nix::unistd::execv(&program, &[argv0]) {
        Ok(never) => match never {},
        Err(errno) => {
            HostbridgeError::Terminal(format!("Failed to exec {}: {}", path.display(), errno))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{MountMode, Propagation};
    use crate::testing::FakeMounter;

    #[test]
    fn test_release_only_init_sensitive_mounts() {
        let layout = RootLayout::new("/scratch");
        let mounter = FakeMounter::default();
        for target in ["/var/log/journal", "/run/systemd/resolve", "/mnt"] {
            mounter
                .bind(
                    &layout.resolve(RootLayout::host_path(target)),
                    &layout.resolve(target),
                    MountMode::ReadWrite,
                    Propagation::Slave,
                )
                .unwrap();
        }

        let released = release_init_sensitive(&layout, &mounter);

        assert_eq!(
            released,
            vec![
                PathBuf::from("/var/log/journal"),
                PathBuf::from("/run/systemd/resolve")
            ]
        );
        let remaining: Vec<PathBuf> = mounter.mounts().into_iter().map(|m| m.1).collect();
        assert_eq!(remaining, vec![layout.resolve("/mnt")]);
    }

    #[tokio::test]
    async fn test_exec_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RootLayout::new(dir.path());
        let mounter = FakeMounter::default();

        let err = TerminalAction::ExecInit
            .enter(&layout, &mounter)
            .await
            .unwrap_err();

        assert!(matches!(err, HostbridgeError::Terminal(_)));
    }
}
