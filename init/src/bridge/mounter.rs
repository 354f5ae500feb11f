//! Kernel mount operations.

use super::spec::{MountMode, Propagation};
use hostbridge_shared::errors::{HostbridgeError, HostbridgeResult};
use nix::mount::{mount, umount2, MntFlags, MsFlags};
use std::fs;
use std::path::Path;

/// Mount table operations used by the bridge.
///
/// Paths are already resolved against the container root.
pub trait Mounter: Send + Sync {
    /// Whether `path` is currently a mountpoint.
    fn is_mountpoint(&self, path: &Path) -> HostbridgeResult<bool>;

    /// Recursively bind `source` onto `target`.
    fn bind(
        &self,
        source: &Path,
        target: &Path,
        mode: MountMode,
        propagation: Propagation,
    ) -> HostbridgeResult<()>;

    /// Detach the mount at `target`.
    fn unmount(&self, target: &Path) -> HostbridgeResult<()>;
}

/// Mounts through `mount(2)` and reads `/proc/self/mountinfo`.
#[derive(Debug, Default)]
pub struct KernelMounter;

impl Mounter for KernelMounter {
    fn is_mountpoint(&self, path: &Path) -> HostbridgeResult<bool> {
        // mountinfo lists canonical paths; a symlinked target must match too.
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Ok(active_mounts(&path)? > 0)
    }

    fn bind(
        &self,
        source: &Path,
        target: &Path,
        mode: MountMode,
        propagation: Propagation,
    ) -> HostbridgeResult<()> {
        tracing::debug!(
            "Binding {} → {} ({:?}, {:?})",
            source.display(),
            target.display(),
            mode,
            propagation
        );

        mount(
            Some(source),
            target,
            None::<&str>,
            MsFlags::MS_BIND | MsFlags::MS_REC,
            None::<&str>,
        )
        .map_err(|e| {
            HostbridgeError::Mount(format!(
                "Failed to bind {} to {}: {}",
                source.display(),
                target.display(),
                e
            ))
        })?;

        mount(
            None::<&str>,
            target,
            None::<&str>,
            propagation.flags(),
            None::<&str>,
        )
        .map_err(|e| {
            HostbridgeError::Mount(format!(
                "Failed to set {:?} propagation on {}: {}",
                propagation,
                target.display(),
                e
            ))
        })?;

        // Read-only has to be applied by a remount of the bind itself.
        if mode == MountMode::ReadOnly {
            mount(
                None::<&str>,
                target,
                None::<&str>,
                MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY,
                None::<&str>,
            )
            .map_err(|e| {
                HostbridgeError::Mount(format!(
                    "Failed to remount {} read-only: {}",
                    target.display(),
                    e
                ))
            })?;
        }

        Ok(())
    }

    fn unmount(&self, target: &Path) -> HostbridgeResult<()> {
        umount2(target, MntFlags::MNT_DETACH).map_err(|e| {
            HostbridgeError::Mount(format!("Failed to unmount {}: {}", target.display(), e))
        })
    }
}

/// Number of mount table entries whose mount point is exactly `path`.
fn active_mounts(path: &Path) -> HostbridgeResult<usize> {
    let mounts = procfs::process::Process::myself()
        .and_then(|me| me.mountinfo())
        .map_err(|e| HostbridgeError::Mount(format!("Failed to read mountinfo: {}", e)))?;

    Ok(mounts
        .iter()
        .filter(|m| m.mount_point.as_path() == path)
        .count())
}
