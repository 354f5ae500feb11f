//! Filesystem layout of the container root.
//!
//! Every path the agent reads or writes is a container-absolute path
//! (`/etc/passwd`, `/run/host/var/log/journal`) resolved against a root
//! prefix. In production the prefix is `/`; staging tools and tests point it
//! at a scratch directory so the same code can run unprivileged.
//!
//! ```text
//! {root}/
//! ├── .dockerenv                      # docker marker
//! ├── etc/{passwd,group,shadow,skel/,sudoers,sudoers.d/}
//! ├── etc/dpkg/dpkg.cfg.d/            # dpkg toolchain marker
//! ├── etc/apt/apt.conf.d/             # apt hook directory
//! ├── run/.containerenv               # podman marker
//! ├── run/host/                       # host root, mounted by the launcher
//! ├── usr/lib/rpm/macros.d/           # rpm toolchain marker
//! ├── usr/share/libalpm/{hooks,scripts}/
//! └── var/lib/hostbridge/bootstrap.json
//! ```

use std::path::{Component, Path, PathBuf};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Container-absolute paths.
pub mod paths {
    /// Host root, bind mounted by the launcher before the agent starts.
    pub const HOST_ROOT: &str = "/run/host";

    /// Podman container marker.
    pub const PODMAN_MARKER: &str = "/run/.containerenv";

    /// Docker container marker.
    pub const DOCKER_MARKER: &str = "/.dockerenv";

    pub const PASSWD: &str = "/etc/passwd";
    pub const GROUP: &str = "/etc/group";
    pub const SHADOW: &str = "/etc/shadow";
    pub const SKEL: &str = "/etc/skel";

    pub const SUDOERS: &str = "/etc/sudoers";
    pub const SUDOERS_DIR: &str = "/etc/sudoers.d";
    pub const SUDOERS_FRAGMENT: &str = "/etc/sudoers.d/hostbridge";

    /// Terminal integration profile script, shipped by vte.
    pub const VTE_PROFILE: &str = "/etc/profile.d/vte.sh";

    pub const RPM_MACROS_DIR: &str = "/usr/lib/rpm/macros.d";
    pub const DPKG_CFG_DIR: &str = "/etc/dpkg/dpkg.cfg.d";
    pub const APT_CONF_DIR: &str = "/etc/apt/apt.conf.d";
    pub const ALPM_HOOKS_DIR: &str = "/usr/share/libalpm/hooks";
    pub const ALPM_SCRIPTS_DIR: &str = "/usr/share/libalpm/scripts";

    /// Bootstrap completion marker.
    pub const BOOTSTRAP_MARKER: &str = "/var/lib/hostbridge/bootstrap.json";
}

// ============================================================================
// ROOT LAYOUT
// ============================================================================

/// Resolves container-absolute paths against a root prefix.
#[derive(Clone, Debug)]
pub struct RootLayout {
    root: PathBuf,
}

impl RootLayout {
    /// Create a layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root prefix of this layout.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a container-absolute path onto the root prefix.
    ///
    /// `..` components are dropped so a path can never escape the root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let mut resolved = self.root.clone();
        for component in path.as_ref().components() {
            if let Component::Normal(part) = component {
                resolved.push(part);
            }
        }
        resolved
    }

    /// Inverse of [`resolve`](Self::resolve): container-absolute form of a
    /// path that lives under the root prefix.
    pub fn container_path(&self, resolved: &Path) -> Option<PathBuf> {
        resolved
            .strip_prefix(&self.root)
            .ok()
            .map(|rel| Path::new("/").join(rel))
    }

    /// Host root directory: {root}/run/host
    pub fn host_root(&self) -> PathBuf {
        self.resolve(paths::HOST_ROOT)
    }

    /// Host view of a container-absolute path: `/x` → `/run/host/x`.
    ///
    /// Returned path is container-absolute; pass it through
    /// [`resolve`](Self::resolve) to touch the filesystem.
    pub fn host_path(path: impl AsRef<Path>) -> PathBuf {
        let mut host = PathBuf::from(paths::HOST_ROOT);
        for component in path.as_ref().components() {
            if let Component::Normal(part) = component {
                host.push(part);
            }
        }
        host
    }

    /// Container runtime markers (podman, docker).
    pub fn container_markers(&self) -> [PathBuf; 2] {
        [
            self.resolve(paths::PODMAN_MARKER),
            self.resolve(paths::DOCKER_MARKER),
        ]
    }

    pub fn passwd(&self) -> PathBuf {
        self.resolve(paths::PASSWD)
    }

    pub fn group(&self) -> PathBuf {
        self.resolve(paths::GROUP)
    }

    pub fn shadow(&self) -> PathBuf {
        self.resolve(paths::SHADOW)
    }

    pub fn skel_dir(&self) -> PathBuf {
        self.resolve(paths::SKEL)
    }

    pub fn sudoers(&self) -> PathBuf {
        self.resolve(paths::SUDOERS)
    }

    pub fn sudoers_fragment(&self) -> PathBuf {
        self.resolve(paths::SUDOERS_FRAGMENT)
    }

    pub fn bootstrap_marker(&self) -> PathBuf {
        self.resolve(paths::BOOTSTRAP_MARKER)
    }
}

impl Default for RootLayout {
    fn default() -> Self {
        Self::new("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_under_root() {
        let layout = RootLayout::new("/scratch/root");

        assert_eq!(
            layout.resolve("/etc/passwd"),
            PathBuf::from("/scratch/root/etc/passwd")
        );
        assert_eq!(
            layout.host_root(),
            PathBuf::from("/scratch/root/run/host")
        );
        assert_eq!(
            layout.sudoers_fragment(),
            PathBuf::from("/scratch/root/etc/sudoers.d/hostbridge")
        );
    }

    #[test]
    fn test_resolve_production_root() {
        let layout = RootLayout::default();

        assert_eq!(layout.passwd(), PathBuf::from("/etc/passwd"));
        assert_eq!(
            layout.container_markers(),
            [
                PathBuf::from("/run/.containerenv"),
                PathBuf::from("/.dockerenv")
            ]
        );
    }

    #[test]
    fn test_resolve_cannot_escape_root() {
        let layout = RootLayout::new("/scratch/root");

        assert_eq!(
            layout.resolve("/etc/../../../etc/shadow"),
            PathBuf::from("/scratch/root/etc/etc/shadow")
        );
    }

    #[test]
    fn test_container_path_roundtrip() {
        let layout = RootLayout::new("/scratch/root");
        let resolved = layout.resolve("/run/host/run/docker.sock");

        assert_eq!(
            layout.container_path(&resolved),
            Some(PathBuf::from("/run/host/run/docker.sock"))
        );
        assert_eq!(layout.container_path(Path::new("/elsewhere")), None);
    }

    #[test]
    fn test_host_path() {
        assert_eq!(
            RootLayout::host_path("/var/log/journal"),
            PathBuf::from("/run/host/var/log/journal")
        );
        assert_eq!(
            RootLayout::host_path("etc/machine-id"),
            PathBuf::from("/run/host/etc/machine-id")
        );
    }
}
