//! dpkg path-exclude fragment and APT journal hooks.

use super::write_artifact;
use crate::bridge::table::JOURNAL_TARGET;
use crate::bridge::BridgedPaths;
use hostbridge_shared::errors::HostbridgeResult;
use hostbridge_shared::layout::paths;
use hostbridge_shared::RootLayout;
use std::fmt::Write;

pub(super) const DPKG_FILE: &str = "/etc/dpkg/dpkg.cfg.d/00_hostbridge";
pub(super) const APT_FILE: &str = "/etc/apt/apt.conf.d/00_hostbridge";

pub(super) fn render_dpkg(bridged: &BridgedPaths) -> String {
    let mut out = String::new();
    for target in bridged.all() {
        let _ = writeln!(out, "path-exclude {}/*", target.display());
    }
    out
}

/// Journal bridge is dropped while dpkg runs and restored read-only after.
pub(super) fn render_apt() -> String {
    let host = RootLayout::host_path(JOURNAL_TARGET);
    format!(
        "DPkg::Pre-Invoke {{\"if findmnt {target} >/dev/null; then umount {target}; fi\";}};\n\
         DPkg::Post-Invoke {{\"if [ -e {host} ]; then mount --rbind -o ro {host} {target}; fi\";}};\n",
        target = JOURNAL_TARGET,
        host = host.display(),
    )
}

pub(super) fn register(layout: &RootLayout, bridged: &BridgedPaths) -> HostbridgeResult<()> {
    write_artifact(layout, DPKG_FILE, &render_dpkg(bridged), 0o644)?;
    if layout.resolve(paths::APT_CONF_DIR).is_dir() {
        write_artifact(layout, APT_FILE, &render_apt(), 0o644)?;
    }
    Ok(())
}
