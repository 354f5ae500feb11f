//! Package backend registry.
//!
//! Detects the container's package manager and installs what an
//! interactive login needs.

mod backend;
mod deps;
mod marker;

pub use backend::PackageBackend;
pub use deps::{ensure_base_dependencies, upgrade_packages, DependencyOutcome};
#[cfg(test)]
pub use marker::BootstrapMarker;
