//! Skeleton propagation into the user's home.

use crate::context::ExecutionContext;
use hostbridge_shared::errors::{HostbridgeError, HostbridgeResult};
use hostbridge_shared::RootLayout;
use nix::unistd::{Gid, Uid};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Copy every top-level `/etc/skel` entry missing from the home directory.
///
/// Existing entries are never touched. Returns how many entries failed.
pub fn propagate_skeleton(ctx: &ExecutionContext, layout: &RootLayout) -> usize {
    let skel = layout.skel_dir();
    let home = layout.resolve(&ctx.home);

    let entries = match fs::read_dir(&skel) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("No skeleton at {}: {}", skel.display(), e);
            return 0;
        }
    };
    let created_home = !home.exists();
    if let Err(e) = fs::create_dir_all(&home) {
        tracing::warn!("Cannot create home {}: {}", home.display(), e);
        return 1;
    }
    if created_home {
        give_to(&home, ctx.uid, ctx.gid, false);
    }

    let mut failed = 0;
    for entry in entries.flatten() {
        let dest = home.join(entry.file_name());
        if fs::symlink_metadata(&dest).is_ok() {
            continue;
        }
        if let Err(e) = copy_tree(&entry.path(), &dest, ctx.uid, ctx.gid) {
            failed += 1;
            tracing::warn!("Cannot copy {}: {}", entry.path().display(), e);
        }
    }
    failed
}

/// Recursive copy preserving symlinks, each copy owned by uid:gid.
fn copy_tree(src: &Path, dest: &Path, uid: u32, gid: u32) -> HostbridgeResult<()> {
    for entry in WalkDir::new(src).follow_links(false).follow_root_links(false) {
        let entry = entry.map_err(|e| HostbridgeError::Storage(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| HostbridgeError::Internal(e.to_string()))?;
        let target = if rel.as_os_str().is_empty() {
            dest.to_path_buf()
        } else {
            dest.join(rel)
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            std::os::unix::fs::symlink(fs::read_link(entry.path())?, &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
        give_to(&target, uid, gid, file_type.is_symlink());
    }
    Ok(())
}

/// Hand `path` to uid:gid; failure is logged only.
pub(super) fn give_to(path: &Path, uid: u32, gid: u32, is_symlink: bool) {
    let result = if is_symlink {
        std::os::unix::fs::lchown(path, Some(uid), Some(gid)).map_err(|e| e.to_string())
    } else {
        nix::unistd::chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
            .map_err(|e| e.to_string())
    };
    if let Err(e) = result {
        tracing::debug!("Cannot chown {} to {}:{}: {}", path.display(), uid, gid, e);
    }
}
