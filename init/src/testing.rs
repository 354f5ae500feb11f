//! In-memory stand-ins for the command runner and the mount table.

use crate::bridge::{MountMode, Mounter, Propagation};
use crate::command::{CommandOutput, CommandRunner, Invocation};
use async_trait::async_trait;
use hostbridge_shared::errors::{HostbridgeError, HostbridgeResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type Handler = Box<dyn Fn(&Invocation) -> Option<i32> + Send + Sync>;

/// Records invocations; every command succeeds unless a handler says
/// otherwise.
#[derive(Default)]
pub(crate) struct FakeRunner {
    commands: HashSet<String>,
    handlers: Vec<Handler>,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeRunner {
    /// Pretend these executables are on PATH.
    pub fn with_commands(mut self, commands: &[&str]) -> Self {
        self.commands.extend(commands.iter().map(|c| c.to_string()));
        self
    }

    /// First handler returning `Some(code)` decides the exit status.
    pub fn on(
        mut self,
        handler: impl Fn(&Invocation) -> Option<i32> + Send + Sync + 'static,
    ) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Fail every invocation of `program`.
    pub fn failing(self, program: &'static str) -> Self {
        self.on(move |inv| (inv.program() == program).then_some(1))
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::display).collect()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, invocation: &Invocation) -> HostbridgeResult<CommandOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        let status = self
            .handlers
            .iter()
            .find_map(|h| h(invocation))
            .unwrap_or(0);
        Ok(CommandOutput {
            status: Some(status),
            stdout: String::new(),
            stderr: if status == 0 {
                String::new()
            } else {
                format!("{} failed", invocation.program())
            },
        })
    }

    fn has_command(&self, program: &str) -> bool {
        self.commands.contains(program)
    }
}

/// Mount table kept in memory.
#[derive(Default)]
pub(crate) struct FakeMounter {
    table: Mutex<Vec<(PathBuf, PathBuf, MountMode)>>,
    unmounted: Mutex<Vec<PathBuf>>,
    propagations: Mutex<Vec<Propagation>>,
    fail_bind: bool,
}

impl FakeMounter {
    pub fn failing() -> Self {
        Self {
            fail_bind: true,
            ..Default::default()
        }
    }

    /// Active mounts as (source, target, mode).
    pub fn mounts(&self) -> Vec<(PathBuf, PathBuf, MountMode)> {
        self.table.lock().unwrap().clone()
    }

    pub fn unmounts(&self) -> Vec<PathBuf> {
        self.unmounted.lock().unwrap().clone()
    }

    /// Propagation requested by each successful bind, in order.
    pub fn propagations(&self) -> Vec<Propagation> {
        self.propagations.lock().unwrap().clone()
    }
}

impl Mounter for FakeMounter {
    fn is_mountpoint(&self, path: &Path) -> HostbridgeResult<bool> {
        let table = self.table.lock().unwrap();
        Ok(table.iter().any(|(_, t, _)| t == path))
    }

    fn bind(
        &self,
        source: &Path,
        target: &Path,
        mode: MountMode,
        propagation: Propagation,
    ) -> HostbridgeResult<()> {
        if self.fail_bind {
            return Err(HostbridgeError::Mount(format!(
                "Failed to bind {}: permission denied",
                target.display()
            )));
        }
        self.table
            .lock()
            .unwrap()
            .push((source.to_path_buf(), target.to_path_buf(), mode));
        self.propagations.lock().unwrap().push(propagation);
        Ok(())
    }

    fn unmount(&self, target: &Path) -> HostbridgeResult<()> {
        let mut table = self.table.lock().unwrap();
        let pos = table
            .iter()
            .rposition(|(_, t, _)| t == target)
            .ok_or_else(|| HostbridgeError::Mount(format!("{} not mounted", target.display())))?;
        table.remove(pos);
        self.unmounted.lock().unwrap().push(target.to_path_buf());
        Ok(())
    }
}
