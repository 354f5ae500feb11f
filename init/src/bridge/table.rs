//! Static mount tables.
//!
//! Targets are container-absolute; each is bridged from the same path
//! under the host root.

use super::spec::{BridgedPaths, MountMode, MountSpec, Propagation};
use std::path::PathBuf;

/// Host state the container may read but never modify.
pub const READ_ONLY_TARGETS: &[&str] = &[
    "/etc/machine-id",
    "/var/lib/flatpak",
    "/var/lib/systemd/coredump",
    "/var/log/journal",
];

/// Host resources shared read-write.
pub const READ_WRITE_TARGETS: &[&str] = &[
    "/media",
    "/mnt",
    "/run/libvirt",
    "/run/media",
    "/run/systemd/journal",
    "/run/systemd/resolve",
    "/run/systemd/seats",
    "/run/systemd/sessions",
    "/run/systemd/users",
    "/run/udev",
    "/var/lib/libvirt",
    "/var/mnt",
];

/// Paths a real init inside the container must own. Unmounted before
/// handing off to it.
pub const INIT_SENSITIVE_TARGETS: &[&str] = &[
    "/var/lib/systemd/coredump",
    "/var/log/journal",
    "/run/systemd/journal",
    "/run/systemd/resolve",
    "/run/systemd/seats",
    "/run/systemd/sessions",
    "/run/systemd/users",
];

/// Journal bridge, toggled around dpkg runs.
pub const JOURNAL_TARGET: &str = "/var/log/journal";

/// Never-local paths that package managers must not touch, on top of the
/// bridged set.
pub const SYSTEM_EXCLUDED: &[&str] = &[
    "/dev",
    "/proc",
    "/sys",
    "/tmp",
    "/etc/host.conf",
    "/etc/hosts",
    "/etc/resolv.conf",
    "/etc/localtime",
    "/etc/timezone",
];

/// Desktop resources shared from `/usr/share` and `~/.local/share`.
pub const DESKTOP_RESOURCES: &[&str] = &["themes", "icons", "fonts"];

pub fn read_only_specs() -> Vec<MountSpec> {
    READ_ONLY_TARGETS
        .iter()
        .map(|t| MountSpec::from_host(t, MountMode::ReadOnly))
        .collect()
}

pub fn read_write_specs() -> Vec<MountSpec> {
    READ_WRITE_TARGETS
        .iter()
        .map(|t| MountSpec::from_host(t, MountMode::ReadWrite))
        .collect()
}

/// Host `/usr/share/<resource>` exposed at `/usr/local/share/<resource>`.
///
/// Private: these trees never carry submounts worth following.
pub fn desktop_resource_specs() -> Vec<MountSpec> {
    DESKTOP_RESOURCES
        .iter()
        .map(|name| {
            MountSpec::new(
                PathBuf::from("/run/host/usr/share").join(name),
                PathBuf::from("/usr/local/share").join(name),
                MountMode::ReadOnly,
            )
            .with_propagation(Propagation::Private)
        })
        .collect()
}

/// Every bridged target from both tables.
pub fn bridged_paths() -> BridgedPaths {
    let read_only = read_only_specs();
    let read_write = read_write_specs();
    BridgedPaths::from_specs(read_only.iter().chain(read_write.iter()))
}
