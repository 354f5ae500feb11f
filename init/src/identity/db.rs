//! Colon-separated account databases (`/etc/passwd`, `/etc/group`,
//! `/etc/shadow`).

use hostbridge_shared::errors::{HostbridgeError, HostbridgeResult};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Fields of the first record named `name`, if any.
pub fn find(path: &Path, name: &str) -> Option<Vec<String>> {
    let content = fs::read_to_string(path).ok()?;
    content
        .lines()
        .map(|line| line.split(':').collect::<Vec<_>>())
        .find(|fields| fields.first() == Some(&name))
        .map(|fields| fields.into_iter().map(str::to_string).collect())
}

pub fn contains(path: &Path, name: &str) -> bool {
    find(path, name).is_some()
}

/// Number of records named `name`.
#[cfg(test)]
pub fn count(path: &Path, name: &str) -> usize {
    fs::read_to_string(path)
        .map(|content| {
            content
                .lines()
                .filter(|line| line.split(':').next() == Some(name))
                .count()
        })
        .unwrap_or(0)
}

/// Append `record` as its own line, creating the file if needed.
pub fn append(path: &Path, record: &str) -> HostbridgeResult<()> {
    let needs_newline = fs::read(path)
        .map(|bytes| bytes.last().is_some_and(|b| *b != b'\n'))
        .unwrap_or(false);

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| identity_error(path, e))?;
    if needs_newline {
        file.write_all(b"\n").map_err(|e| identity_error(path, e))?;
    }
    writeln!(file, "{}", record).map_err(|e| identity_error(path, e))
}

/// Empty the password field of every record in `names`. Returns how many
/// records changed.
pub fn clear_password(path: &Path, names: &[&str]) -> HostbridgeResult<usize> {
    let content = fs::read_to_string(path).map_err(|e| identity_error(path, e))?;

    let mut changed = 0;
    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        let mut fields: Vec<&str> = line.split(':').collect();
        if fields.len() > 1 && names.contains(&fields[0]) && !fields[1].is_empty() {
            fields[1] = "";
            changed += 1;
        }
        out.push_str(&fields.join(":"));
        out.push('\n');
    }

    if changed > 0 {
        let mode = fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o7777)
            .unwrap_or(0o640);
        replace(path, &out, mode)?;
    }
    Ok(changed)
}

/// Replace `path` through a sibling temp file so readers never see a
/// partial database and read-only modes do not block the rewrite.
pub fn replace(path: &Path, content: &str, mode: u32) -> HostbridgeResult<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| HostbridgeError::Identity(format!("Invalid path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    fs::write(&tmp, content).map_err(|e| identity_error(&tmp, e))?;
    fs::set_permissions(&tmp, fs::Permissions::from_mode(mode))
        .map_err(|e| identity_error(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| identity_error(path, e))
}

fn identity_error(path: &Path, e: std::io::Error) -> HostbridgeError {
    HostbridgeError::Identity(format!("{}: {}", path.display(), e))
}
