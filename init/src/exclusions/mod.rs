//! Exclusion registrar.
//!
//! Tells each packaging toolchain found in the rootfs to keep its hands off
//! bridged paths. Detection is by metadata directory, not by executable, so
//! a toolchain gets its artifact even when its CLI is absent.

mod alpm;
mod dpkg;
mod rpm;

use crate::bridge::BridgedPaths;
use hostbridge_shared::errors::{HostbridgeError, HostbridgeResult};
use hostbridge_shared::layout::paths;
use hostbridge_shared::RootLayout;
use std::fmt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toolchain {
    Rpm,
    Dpkg,
    Alpm,
}

impl Toolchain {
    pub const ALL: [Toolchain; 3] = [Self::Rpm, Self::Dpkg, Self::Alpm];

    /// Directory whose presence means the toolchain is installed.
    pub fn marker(self) -> &'static str {
        match self {
            Self::Rpm => paths::RPM_MACROS_DIR,
            Self::Dpkg => paths::DPKG_CFG_DIR,
            Self::Alpm => paths::ALPM_SCRIPTS_DIR,
        }
    }

    pub fn is_present(self, layout: &RootLayout) -> bool {
        layout.resolve(self.marker()).is_dir()
    }

    fn register(self, layout: &RootLayout, bridged: &BridgedPaths) -> HostbridgeResult<()> {
        match self {
            Self::Rpm => rpm::register(layout, bridged),
            Self::Dpkg => dpkg::register(layout, bridged),
            Self::Alpm => alpm::register(layout, bridged),
        }
    }
}

impl fmt::Display for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rpm => "rpm",
            Self::Dpkg => "dpkg",
            Self::Alpm => "alpm",
        })
    }
}

/// Write exclusion artifacts for every toolchain present in the rootfs.
///
/// Returns the toolchains whose artifacts were written. A write failure is
/// logged and does not stop the others.
pub fn register_exclusions(layout: &RootLayout, bridged: &BridgedPaths) -> Vec<Toolchain> {
    let mut registered = Vec::new();
    for toolchain in Toolchain::ALL {
        if !toolchain.is_present(layout) {
            continue;
        }
        match toolchain.register(layout, bridged) {
            Ok(()) => {
                tracing::info!("Registered {} exclusions", toolchain);
                registered.push(toolchain);
            }
            Err(e) => tracing::warn!("Cannot register {} exclusions: {}", toolchain, e),
        }
    }
    registered
}

/// Overwrite `path` (container-absolute) with `content` and `mode`.
fn write_artifact(
    layout: &RootLayout,
    path: &str,
    content: &str,
    mode: u32,
) -> HostbridgeResult<()> {
    let resolved = layout.resolve(path);
    if let Some(parent) = resolved.parent() {
        std::fs::create_dir_all(parent).map_err(|e| storage_error(parent, e))?;
    }
    std::fs::write(&resolved, content).map_err(|e| storage_error(&resolved, e))?;
    std::fs::set_permissions(&resolved, std::fs::Permissions::from_mode(mode))
        .map_err(|e| storage_error(&resolved, e))
}

fn storage_error(path: &Path, e: std::io::Error) -> HostbridgeError {
    HostbridgeError::Storage(format!("Failed to write {}: {}", path.display(), e))
}
