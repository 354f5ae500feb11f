//! Passwordless sudo for the reconciled user.

use super::db;
use hostbridge_shared::errors::{HostbridgeError, HostbridgeResult};
use hostbridge_shared::layout::paths;
use hostbridge_shared::RootLayout;
use std::fs;
use std::os::unix::fs::PermissionsExt;

const FRAGMENT_MODE: u32 = 0o440;

const INCLUDE_DIRECTIVE: &str = "#includedir /etc/sudoers.d";

pub fn nopasswd_line(username: &str) -> String {
    format!("{} ALL = (root) NOPASSWD:ALL", username)
}

/// Lines the fragment must contain for `username`.
pub fn required_lines(username: &str) -> [String; 2] {
    [nopasswd_line(username), "Defaults !fqdn".to_string()]
}

/// Append each required line to the sudoers fragment unless an identical
/// line is already there.
pub fn grant_passwordless_sudo(layout: &RootLayout, username: &str) -> HostbridgeResult<()> {
    let fragment = layout.sudoers_fragment();
    let dir = layout.resolve(paths::SUDOERS_DIR);
    fs::create_dir_all(&dir).map_err(|e| {
        HostbridgeError::Identity(format!("Failed to create {}: {}", dir.display(), e))
    })?;

    let mut content = fs::read_to_string(&fragment).unwrap_or_default();
    let missing: Vec<String> = required_lines(username)
        .into_iter()
        .filter(|line| !content.lines().any(|existing| existing == line.as_str()))
        .collect();

    if !missing.is_empty() {
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        for line in &missing {
            content.push_str(line);
            content.push('\n');
        }
        db::replace(&fragment, &content, FRAGMENT_MODE)?;
        tracing::info!("Granted passwordless sudo to {}", username);
    }

    ensure_includedir(layout)
}

/// Older images ship a sudoers without the drop-in include.
fn ensure_includedir(layout: &RootLayout) -> HostbridgeResult<()> {
    let sudoers = layout.sudoers();
    let Ok(content) = fs::read_to_string(&sudoers) else {
        return Ok(());
    };
    let included = content.lines().any(|line| {
        let line = line.trim();
        line == INCLUDE_DIRECTIVE || line == "@includedir /etc/sudoers.d"
    });
    if included {
        return Ok(());
    }
    let mode = fs::metadata(&sudoers)
        .map(|m| m.permissions().mode() & 0o7777)
        .unwrap_or(FRAGMENT_MODE);
    let mut updated = content;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(INCLUDE_DIRECTIVE);
    updated.push('\n');
    db::replace(&sudoers, &updated, mode)
}
