//! Mount specifications.

use hostbridge_shared::RootLayout;
use nix::mount::MsFlags;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MountMode {
    ReadOnly,
    ReadWrite,
}

/// Mount propagation applied after binding. Always recursive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Propagation {
    /// Host mount events propagate in, ours never propagate out.
    #[default]
    Slave,
    /// No propagation in either direction.
    Private,
}

impl Propagation {
    pub(crate) fn flags(self) -> MsFlags {
        let kind = match self {
            Self::Slave => MsFlags::MS_SLAVE,
            Self::Private => MsFlags::MS_PRIVATE,
        };
        MsFlags::MS_REC | kind
    }
}

/// One host path to expose inside the container.
///
/// Both paths are container-absolute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountSpec {
    pub source: PathBuf,
    pub target: PathBuf,
    pub mode: MountMode,
    pub propagation: Propagation,
}

impl MountSpec {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>, mode: MountMode) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            mode,
            propagation: Propagation::default(),
        }
    }

    /// Bridge `target` from the same path under the host root.
    pub fn from_host(target: impl AsRef<Path>, mode: MountMode) -> Self {
        let target = target.as_ref();
        Self::new(RootLayout::host_path(target), target, mode)
    }

    pub fn with_propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }
}

/// Outcome of a single bridge attempt. A failure degrades one
/// integration, it never aborts the bootstrap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeResult {
    pub success: bool,
    pub reason: Option<String>,
}

impl BridgeResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }
}

/// Container targets of every bridged path, split by mode.
///
/// Built once from the mount tables and passed to each exclusion
/// registrar, so they all see the same ordered set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BridgedPaths {
    read_only: Vec<PathBuf>,
    read_write: Vec<PathBuf>,
}

impl BridgedPaths {
    pub fn from_specs<'a>(specs: impl IntoIterator<Item = &'a MountSpec>) -> Self {
        let mut paths = Self::default();
        for spec in specs {
            match spec.mode {
                MountMode::ReadOnly => paths.read_only.push(spec.target.clone()),
                MountMode::ReadWrite => paths.read_write.push(spec.target.clone()),
            }
        }
        paths
    }

    pub fn read_only(&self) -> &[PathBuf] {
        &self.read_only
    }

    #[cfg(test)]
    pub fn read_write(&self) -> &[PathBuf] {
        &self.read_write
    }

    /// Read-only targets first, then read-write.
    pub fn all(&self) -> impl Iterator<Item = &PathBuf> {
        self.read_only.iter().chain(self.read_write.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_host() {
        let spec = MountSpec::from_host("/var/log/journal", MountMode::ReadOnly);

        assert_eq!(spec.source, PathBuf::from("/run/host/var/log/journal"));
        assert_eq!(spec.target, PathBuf::from("/var/log/journal"));
        assert_eq!(spec.mode, MountMode::ReadOnly);
        assert_eq!(spec.propagation, Propagation::Slave);

        let spec = spec.with_propagation(Propagation::Private);
        assert_eq!(spec.propagation, Propagation::Private);
    }

    #[test]
    fn test_propagation_flags_are_recursive() {
        for p in [Propagation::Slave, Propagation::Private] {
            assert!(p.flags().contains(MsFlags::MS_REC));
        }
        let flags = Propagation::default().flags();
        assert!(flags.contains(MsFlags::MS_SLAVE));
    }

    #[test]
    fn test_bridged_paths_partition() {
        let specs = [
            MountSpec::from_host("/mnt", MountMode::ReadWrite),
            MountSpec::from_host("/var/log/journal", MountMode::ReadOnly),
            MountSpec::from_host("/media", MountMode::ReadWrite),
        ];
        let paths = BridgedPaths::from_specs(&specs);

        assert_eq!(paths.read_only(), [PathBuf::from("/var/log/journal")]);
        assert_eq!(
            paths.read_write(),
            [PathBuf::from("/mnt"), PathBuf::from("/media")]
        );
        let all: Vec<_> = paths.all().cloned().collect();
        assert_eq!(all[0], PathBuf::from("/var/log/journal"));
        assert_eq!(all.len(), 3);
    }
}
