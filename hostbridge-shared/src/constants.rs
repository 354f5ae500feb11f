//! Constants shared between the bootstrap agent and its supervisors.
//!
//! Exit statuses and the readiness sentinel are part of the external
//! contract: launchers poll stdout for the sentinel and branch on the
//! exit status, so these values must not drift.

/// Process exit statuses
pub mod exit {
    /// Normal termination (help, version, upgrade, terminated idle)
    pub const SUCCESS: i32 = 0;

    /// Invalid flag
    pub const INVALID_ARGUMENT: i32 = 1;

    /// Any other fatal failure (dependency install, hooks)
    pub const FAILURE: i32 = 1;

    /// A required identity argument is missing
    pub const MISSING_ARGUMENT: i32 = 2;

    /// Not running inside a container
    pub const NOT_IN_CONTAINER: i32 = 126;

    /// No supported package manager on PATH
    pub const NO_BACKEND: i32 = 127;
}

/// Readiness signalling
pub mod readiness {
    /// Line written to stdout once bootstrap is complete.
    pub const SENTINEL: &str = "container_setup_done";
}

/// Shell selection
pub mod shell {
    /// Used when `SHELL` is unset.
    pub const DEFAULT: &str = "/bin/bash";

    /// Substituted when the requested shell package cannot be installed.
    pub const FALLBACK: &str = "/bin/bash";

    /// Interpreter for user supplied hooks.
    pub const HOOK_INTERPRETER: &str = "/bin/sh";
}

/// Init system hand-off
pub mod init {
    /// Entrypoint exec'd in `--init` mode.
    pub const ENTRYPOINT: &str = "/sbin/init";

    /// Present when systemd is the running init.
    pub const SYSTEMD_RUNTIME_DIR: &str = "/run/systemd/system";
}

/// Environment variables consulted at startup
pub mod env {
    /// Set by podman/docker/systemd-nspawn inside containers.
    pub const CONTAINER: &str = "container";

    /// Container root prefix override.
    pub const ROOT: &str = "HOSTBRIDGE_ROOT";

    /// Login shell of the host user.
    pub const SHELL: &str = "SHELL";
}
