#![allow(dead_code)]

use assert_cmd::Command;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

pub struct TestContext {
    pub cmd: Command,
    pub root: TempDir,
}

impl TestContext {
    /// Command bound to the same scratch root.
    pub fn new_cmd(&self) -> Command {
        command_for(self.root.path())
    }

    /// Mark the scratch root as a docker container.
    pub fn as_docker(&self) {
        std::fs::write(self.root.path().join(".dockerenv"), "").unwrap();
    }
}

fn command_for(root: &Path) -> Command {
    let bin_path = env!("CARGO_BIN_EXE_hostbridge-init");
    let mut cmd = Command::new(bin_path);
    cmd.timeout(Duration::from_secs(30));
    cmd.env("HOSTBRIDGE_ROOT", root);
    cmd.env("SHELL", "/bin/bash");
    cmd.env_remove("container");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Agent pointed at an empty scratch root, outside any container.
pub fn hostbridge() -> TestContext {
    let root = tempfile::tempdir().unwrap();
    let cmd = command_for(root.path());
    TestContext { cmd, root }
}

pub const ALICE: &[&str] = &[
    "--user",
    "alice",
    "--uid",
    "1000",
    "--gid",
    "1000",
    "--home",
    "/home/alice",
];
