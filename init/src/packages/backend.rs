//! Package manager backends.

use crate::command::{CommandRunner, Invocation};
use hostbridge_shared::errors::{HostbridgeError, HostbridgeResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One package management toolchain.
///
/// Variants are declared in probe priority order; [`PackageBackend::ALL`]
/// preserves it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageBackend {
    Apk,
    AptGet,
    Emerge,
    Microdnf,
    Dnf,
    Pacman,
    Slackpkg,
    Swupd,
    Xbps,
    Yum,
    Zypper,
}

impl PackageBackend {
    /// Probe order.
    pub const ALL: [PackageBackend; 11] = [
        Self::Apk,
        Self::AptGet,
        Self::Emerge,
        Self::Microdnf,
        Self::Dnf,
        Self::Pacman,
        Self::Slackpkg,
        Self::Swupd,
        Self::Xbps,
        Self::Yum,
        Self::Zypper,
    ];

    /// First backend whose executable is on PATH.
    pub fn detect(runner: &dyn CommandRunner) -> HostbridgeResult<Self> {
        Self::ALL
            .into_iter()
            .find(|backend| runner.has_command(backend.executable()))
            .ok_or_else(|| {
                HostbridgeError::NoBackend(
                    Self::ALL
                        .iter()
                        .map(|b| b.executable())
                        .collect::<Vec<_>>()
                        .join(", "),
                )
            })
    }

    /// Executable probed on PATH.
    pub fn executable(self) -> &'static str {
        match self {
            Self::Apk => "apk",
            Self::AptGet => "apt-get",
            Self::Emerge => "emerge",
            Self::Microdnf => "microdnf",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
            Self::Slackpkg => "slackpkg",
            Self::Swupd => "swupd",
            Self::Xbps => "xbps-install",
            Self::Yum => "yum",
            Self::Zypper => "zypper",
        }
    }

    fn command(self) -> Invocation {
        let inv = Invocation::new(self.executable());
        match self {
            Self::AptGet => inv.env("DEBIAN_FRONTEND", "noninteractive"),
            _ => inv,
        }
    }

    /// Repository refresh required before installing, if any.
    pub fn sync(self) -> Option<Invocation> {
        let cmd = self.command();
        let cmd = match self {
            Self::Apk => cmd.arg("update"),
            Self::AptGet => cmd.arg("update"),
            Self::Emerge => cmd.arg("--sync"),
            Self::Pacman => cmd.args(["-Syu", "--noconfirm"]),
            Self::Slackpkg => cmd.args(["-default_answer=yes", "-batch=yes", "update"]),
            Self::Xbps => cmd.args(["-Syu", "xbps"]),
            Self::Zypper => cmd.args(["--non-interactive", "refresh"]),
            Self::Microdnf | Self::Dnf | Self::Swupd | Self::Yum => return None,
        };
        Some(cmd)
    }

    /// Install `packages` in a single transaction.
    pub fn install<S: AsRef<str>>(self, packages: &[S]) -> Invocation {
        let cmd = self.command();
        let cmd = match self {
            Self::Apk => cmd.arg("add"),
            Self::AptGet => cmd.args(["install", "-y", "--no-install-recommends"]),
            Self::Emerge => cmd.args(["--ask=n", "--noreplace", "--quiet-build"]),
            Self::Microdnf => cmd.args(["install", "-y"]),
            Self::Dnf => cmd.args(["install", "-y", "--setopt=install_weak_deps=False"]),
            Self::Pacman => cmd.args(["-S", "--needed", "--noconfirm"]),
            Self::Slackpkg => cmd.args(["-default_answer=yes", "-batch=yes", "install"]),
            Self::Swupd => cmd.args(["bundle-add", "--quiet"]),
            Self::Xbps => cmd.arg("-Sy"),
            Self::Yum => cmd.args(["install", "-y"]),
            Self::Zypper => cmd.args(["--non-interactive", "install"]),
        };
        cmd.args(packages.iter().map(|p| p.as_ref().to_string()))
    }

    /// Full system upgrade, run after [`sync`](Self::sync).
    pub fn upgrade(self) -> Invocation {
        let cmd = self.command();
        match self {
            Self::Apk => cmd.arg("upgrade"),
            Self::AptGet => cmd.args(["upgrade", "-y"]),
            Self::Emerge => cmd.args(["--ask=n", "--update", "--deep", "--newuse", "@world"]),
            Self::Microdnf => cmd.args(["upgrade", "-y"]),
            Self::Dnf => cmd.args(["upgrade", "-y"]),
            Self::Pacman => cmd.args(["-Su", "--noconfirm"]),
            Self::Slackpkg => cmd.args(["-default_answer=yes", "-batch=yes", "upgrade-all"]),
            Self::Swupd => cmd.arg("update"),
            Self::Xbps => cmd.arg("-Syu"),
            Self::Yum => cmd.args(["upgrade", "-y"]),
            Self::Zypper => cmd.args(["--non-interactive", "dist-upgrade"]),
        }
    }

    /// Packages providing terminal integration, process tools, shadow
    /// tools, file search, pinentry, sudo and core utilities.
    pub fn base_packages(self) -> &'static [&'static str] {
        match self {
            Self::Apk => &[
                "coreutils",
                "findutils",
                "mount",
                "ncurses",
                "ncurses-terminfo",
                "pinentry",
                "procps",
                "shadow",
                "sudo",
                "util-linux",
                "vte3",
            ],
            Self::AptGet => &[
                "coreutils",
                "findutils",
                "libvte-2.91-common",
                "mount",
                "ncurses-base",
                "passwd",
                "pinentry-curses",
                "procps",
                "sudo",
                "util-linux",
            ],
            Self::Emerge => &[
                "app-admin/sudo",
                "app-crypt/pinentry",
                "sys-apps/coreutils",
                "sys-apps/findutils",
                "sys-apps/shadow",
                "sys-apps/util-linux",
                "sys-libs/ncurses",
                "sys-process/procps",
                "x11-libs/vte",
            ],
            Self::Microdnf | Self::Dnf | Self::Yum => &[
                "coreutils",
                "findutils",
                "ncurses",
                "passwd",
                "pinentry",
                "procps-ng",
                "shadow-utils",
                "sudo",
                "util-linux",
                "vte-profile",
            ],
            Self::Pacman => &[
                "coreutils",
                "findutils",
                "ncurses",
                "pinentry",
                "procps-ng",
                "shadow",
                "sudo",
                "util-linux",
                "vte-common",
            ],
            Self::Slackpkg => &[
                "coreutils",
                "findutils",
                "ncurses",
                "pinentry",
                "procps-ng",
                "shadow",
                "sudo",
                "util-linux",
                "vte",
            ],
            Self::Swupd => &["os-core", "os-core-search", "sudo", "sysadmin-basic"],
            Self::Xbps => &[
                "coreutils",
                "findutils",
                "ncurses-base",
                "pinentry",
                "procps-ng",
                "shadow",
                "sudo",
                "util-linux",
                "vte3",
            ],
            Self::Zypper => &[
                "coreutils",
                "findutils",
                "libvte-2_91-0",
                "ncurses-utils",
                "pinentry",
                "procps",
                "shadow",
                "sudo",
                "util-linux",
            ],
        }
    }
}

impl fmt::Display for PackageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.executable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;
    use rstest::rstest;

    #[test]
    fn test_detect_follows_priority() {
        let runner = FakeRunner::default().with_commands(&["zypper", "dnf", "microdnf"]);
        assert_eq!(
            PackageBackend::detect(&runner).unwrap(),
            PackageBackend::Microdnf
        );

        let runner = FakeRunner::default().with_commands(&["yum", "apt-get"]);
        assert_eq!(
            PackageBackend::detect(&runner).unwrap(),
            PackageBackend::AptGet
        );
    }

    #[test]
    fn test_detect_none() {
        let runner = FakeRunner::default().with_commands(&["find", "mount"]);
        let err = PackageBackend::detect(&runner).unwrap_err();

        assert_eq!(err.exit_code(), 127);
        assert!(err.to_string().contains("xbps-install"));
    }

    #[test]
    fn test_every_backend_detectable() {
        for backend in PackageBackend::ALL {
            let runner = FakeRunner::default().with_commands(&[backend.executable()]);
            assert_eq!(PackageBackend::detect(&runner).unwrap(), backend);
        }
    }

    #[rstest]
    #[case(PackageBackend::Apk, "apk add zsh")]
    #[case(PackageBackend::AptGet, "apt-get install -y --no-install-recommends zsh")]
    #[case(PackageBackend::Dnf, "dnf install -y --setopt=install_weak_deps=False zsh")]
    #[case(PackageBackend::Pacman, "pacman -S --needed --noconfirm zsh")]
    #[case(PackageBackend::Xbps, "xbps-install -Sy zsh")]
    #[case(PackageBackend::Zypper, "zypper --non-interactive install zsh")]
    fn test_install_command_line(#[case] backend: PackageBackend, #[case] expected: &str) {
        assert_eq!(backend.install(&["zsh"]).display(), expected);
    }

    #[rstest]
    #[case(PackageBackend::Apk, Some("apk update"))]
    #[case(PackageBackend::AptGet, Some("apt-get update"))]
    #[case(PackageBackend::Pacman, Some("pacman -Syu --noconfirm"))]
    #[case(PackageBackend::Dnf, None)]
    #[case(PackageBackend::Yum, None)]
    fn test_sync_command_line(#[case] backend: PackageBackend, #[case] expected: Option<&str>) {
        let line = backend.sync().map(|s| s.display());
        assert_eq!(line.as_deref(), expected);
    }

    #[test]
    fn test_base_packages_cover_sudo() {
        for backend in PackageBackend::ALL {
            // Gentoo lists category-qualified atoms.
            assert!(
                backend
                    .base_packages()
                    .iter()
                    .any(|p| p.rsplit('/').next() == Some("sudo")),
                "{} lacks sudo",
                backend
            );
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&PackageBackend::AptGet).unwrap();
        assert_eq!(json, "\"apt-get\"");
        let back: PackageBackend = serde_json::from_str("\"xbps\"").unwrap();
        assert_eq!(back, PackageBackend::Xbps);
    }
}
