//! Idempotent bind bridge.

use super::mounter::Mounter;
use super::spec::{BridgeResult, MountSpec};
use hostbridge_shared::RootLayout;
use std::fs;
use std::path::Path;

/// Expose `spec.source` at `spec.target`.
///
/// - source missing (neither dir nor file): no-op success
/// - target already a mountpoint: unmounted first, so repeated runs over the
///   same rootfs never stack binds
/// - directory source → directory target, file source → empty file target
pub fn bridge(layout: &RootLayout, mounter: &dyn Mounter, spec: &MountSpec) -> BridgeResult {
    let source = layout.resolve(&spec.source);
    let target = layout.resolve(&spec.target);

    let source_is_dir = source.is_dir();
    if !source_is_dir && !source.is_file() {
        tracing::debug!(
            "Skipping bridge for {}: {} not present",
            spec.target.display(),
            spec.source.display()
        );
        return BridgeResult::ok();
    }

    if target.exists() {
        match mounter.is_mountpoint(&target) {
            Ok(true) => {
                tracing::debug!("Unmounting stale bridge at {}", target.display());
                if let Err(e) = mounter.unmount(&target) {
                    return BridgeResult::failed(e.to_string());
                }
            }
            Ok(false) => {}
            Err(e) => return BridgeResult::failed(e.to_string()),
        }
    }

    if let Err(reason) = prepare_target(&target, source_is_dir) {
        return BridgeResult::failed(reason);
    }

    match mounter.bind(&source, &target, spec.mode, spec.propagation) {
        Ok(()) => {
            tracing::info!(
                "Bridged {} → {} ({:?})",
                spec.source.display(),
                spec.target.display(),
                spec.mode
            );
            BridgeResult::ok()
        }
        Err(e) => BridgeResult::failed(e.to_string()),
    }
}

/// Bridge every spec in order, logging failures. Returns how many failed.
pub fn bridge_all<'a>(
    layout: &RootLayout,
    mounter: &dyn Mounter,
    specs: impl IntoIterator<Item = &'a MountSpec>,
) -> usize {
    let mut failed = 0;
    for spec in specs {
        let result = bridge(layout, mounter, spec);
        if !result.success {
            failed += 1;
            tracing::warn!(
                "Cannot bridge {}: {}",
                spec.target.display(),
                result.reason.as_deref().unwrap_or("unknown error")
            );
        }
    }
    failed
}

fn prepare_target(target: &Path, is_dir: bool) -> Result<(), String> {
    if is_dir {
        return fs::create_dir_all(target)
            .map_err(|e| format!("Failed to create mount point {}: {}", target.display(), e));
    }

    if target.exists() {
        return Ok(());
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create directory {}: {}", parent.display(), e))?;
    }
    fs::File::create(target)
        .map(|_| ())
        .map_err(|e| format!("Failed to create mount point {}: {}", target.display(), e))
}
