//! Bootstrap marker.
//!
//! Records the shell decision of the last successful dependency step so a
//! restart over the same rootfs does not reinstall everything just because
//! the requested shell is uninstallable.

use super::backend::PackageBackend;
use hostbridge_shared::errors::{HostbridgeError, HostbridgeResult};
use hostbridge_shared::RootLayout;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapMarker {
    pub requested_shell: PathBuf,
    pub effective_shell: PathBuf,
    /// Backend that installed the dependencies; `None` when they were
    /// already present.
    #[serde(default)]
    pub backend: Option<PackageBackend>,
}

impl BootstrapMarker {
    /// Load the marker, treating a missing or unreadable file as absent.
    pub fn load(layout: &RootLayout) -> Option<Self> {
        let path = layout.bootstrap_marker();
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(marker) => Some(marker),
            Err(e) => {
                tracing::warn!("Ignoring corrupt bootstrap marker {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, layout: &RootLayout) -> HostbridgeResult<()> {
        let path = layout.bootstrap_marker();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                HostbridgeError::Storage(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| HostbridgeError::Internal(format!("Failed to encode marker: {}", e)))?;
        std::fs::write(&path, json + "\n").map_err(|e| {
            HostbridgeError::Storage(format!("Failed to write {}: {}", path.display(), e))
        })
    }
}
