//! hostbridge shared code
//!
//! Error types, constants and the container root layout used by the
//! bootstrap agent and by anything that launches or supervises it.

pub mod constants;
pub mod errors;
pub mod layout;

pub use errors::{HostbridgeError, HostbridgeResult};
pub use layout::RootLayout;
