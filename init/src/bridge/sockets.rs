//! Host socket mirroring.
//!
//! Links every IPC socket found under `/run/host/run` to the same path
//! without the host prefix, so clients inside the container find host
//! daemons (docker, podman, pipewire, ...) at their usual locations.

use hostbridge_shared::layout::paths;
use hostbridge_shared::RootLayout;
use std::fs;
use std::os::unix::fs::{symlink, FileTypeExt};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Session and identity scoped entries. Pruned at any depth.
pub const EXCLUDED_NAMES: &[&str] = &["user", "nscd", "system_bus_socket"];

/// A created link: `container` → `host`. Both container-absolute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocketLink {
    pub host: PathBuf,
    pub container: PathBuf,
}

/// Mirror host sockets into the container. Never fails; entries that
/// cannot be linked are logged and skipped.
pub fn mirror_sockets(layout: &RootLayout) -> Vec<SocketLink> {
    let scan_root = layout.host_root().join("run");
    if !scan_root.is_dir() {
        tracing::debug!("No host runtime directory at {}", scan_root.display());
        return Vec::new();
    }

    let mut links = Vec::new();
    let walker = WalkDir::new(&scan_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_excluded(e.file_name()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Skipping unreadable host entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_socket() {
            continue;
        }

        let Some(link) = socket_link(layout, entry.path()) else {
            continue;
        };
        match create_link(layout, &link) {
            Ok(true) => {
                tracing::debug!(
                    "Linked {} → {}",
                    link.container.display(),
                    link.host.display()
                );
                links.push(link);
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(
                "Cannot link host socket {}: {}",
                link.host.display(),
                e
            ),
        }
    }

    tracing::info!("Mirrored {} host sockets", links.len());
    links
}

fn is_excluded(name: &std::ffi::OsStr) -> bool {
    name.to_str()
        .map(|n| EXCLUDED_NAMES.contains(&n))
        .unwrap_or(false)
}

fn socket_link(layout: &RootLayout, resolved: &Path) -> Option<SocketLink> {
    let host = layout.container_path(resolved)?;
    let rel = host.strip_prefix(paths::HOST_ROOT).ok()?;
    Some(SocketLink {
        container: Path::new("/").join(rel),
        host,
    })
}

/// Returns `Ok(false)` when a socket or link is already in place.
fn create_link(layout: &RootLayout, link: &SocketLink) -> std::io::Result<bool> {
    let at = layout.resolve(&link.container);

    if let Ok(meta) = fs::symlink_metadata(&at) {
        let file_type = meta.file_type();
        if file_type.is_socket() || file_type.is_symlink() {
            return Ok(false);
        }
        // Stale regular file left behind by a previous boot.
        fs::remove_file(&at)?;
    }

    if let Some(parent) = at.parent() {
        fs::create_dir_all(parent)?;
    }
    symlink(&link.host, &at)?;
    Ok(true)
}
