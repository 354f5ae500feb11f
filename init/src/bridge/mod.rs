//! Host integration bridge.
//!
//! - [`bridge_all`]: idempotent recursive binds of host paths
//! - [`mirror_sockets`]: symlinks for host IPC sockets
//! - [`table`]: the fixed read-only / read-write mount tables

mod bind;
mod mounter;
mod sockets;
mod spec;
pub mod table;

pub use bind::bridge_all;
pub use mounter::{KernelMounter, Mounter};
pub use sockets::mirror_sockets;
pub use spec::BridgedPaths;
#[cfg(test)]
pub use spec::{MountMode, MountSpec, Propagation};
