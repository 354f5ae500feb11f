//! RPM net-shared path macro.

use super::write_artifact;
use crate::bridge::table::SYSTEM_EXCLUDED;
use crate::bridge::BridgedPaths;
use hostbridge_shared::errors::HostbridgeResult;
use hostbridge_shared::RootLayout;
use std::collections::HashSet;

pub(super) const MACROS_FILE: &str = "/usr/lib/rpm/macros.d/macros.hostbridge";

/// Bridged targets followed by the system set, first occurrence wins.
pub fn net_shared_paths(bridged: &BridgedPaths) -> Vec<String> {
    let mut seen = HashSet::new();
    bridged
        .all()
        .map(|p| p.to_string_lossy().into_owned())
        .chain(SYSTEM_EXCLUDED.iter().map(|p| p.to_string()))
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

pub(super) fn render(bridged: &BridgedPaths) -> String {
    format!("%_netsharedpath {}\n", net_shared_paths(bridged).join(":"))
}

pub(super) fn register(layout: &RootLayout, bridged: &BridgedPaths) -> HostbridgeResult<()> {
    write_artifact(layout, MACROS_FILE, &render(bridged), 0o644)
}
