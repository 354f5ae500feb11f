//! Bootstrap orchestrator.
//!
//! Runs every stage in order, then hands back the terminal action. The
//! action is only produced after the last stage completed, so nothing can
//! idle or exec half-way through provisioning.

mod resources;
mod skeleton;
mod terminal;

pub use resources::bridge_resources;
pub use skeleton::propagate_skeleton;
pub use terminal::TerminalAction;

use crate::bridge::{bridge_all, mirror_sockets, table, BridgedPaths, Mounter};
use crate::command::{CommandRunner, Invocation};
use crate::context::ExecutionContext;
use crate::exclusions::register_exclusions;
use crate::identity;
use crate::packages::{self, DependencyOutcome, PackageBackend};
use hostbridge_shared::constants::{readiness, shell};
use hostbridge_shared::errors::{HostbridgeError, HostbridgeResult};
use hostbridge_shared::RootLayout;
use std::fmt;
use std::io::Write;

/// Provisioning stages, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    PreconditionCheck,
    PreInitHooks,
    DependencyEnsure,
    HostBridge,
    SocketMirror,
    ExclusionRegistration,
    IdentityReconcile,
    CredentialReset,
    SkeletonPropagation,
    ResourceBridge,
    InitHookExecution,
}

#[cfg(test)]
impl Stage {
    pub const ALL: [Stage; 11] = [
        Self::PreconditionCheck,
        Self::PreInitHooks,
        Self::DependencyEnsure,
        Self::HostBridge,
        Self::SocketMirror,
        Self::ExclusionRegistration,
        Self::IdentityReconcile,
        Self::CredentialReset,
        Self::SkeletonPropagation,
        Self::ResourceBridge,
        Self::InitHookExecution,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub struct Bootstrap<'a> {
    ctx: ExecutionContext,
    layout: RootLayout,
    runner: &'a dyn CommandRunner,
    mounter: &'a dyn Mounter,
    completed: Vec<Stage>,
}

impl<'a> Bootstrap<'a> {
    pub fn new(
        ctx: ExecutionContext,
        layout: RootLayout,
        runner: &'a dyn CommandRunner,
        mounter: &'a dyn Mounter,
    ) -> Self {
        Self {
            ctx,
            layout,
            runner,
            mounter,
            completed: Vec::new(),
        }
    }

    /// Stages finished so far, in order.
    #[cfg(test)]
    pub fn completed(&self) -> &[Stage] {
        &self.completed
    }

    /// Provision the container and write the readiness sentinel to `out`.
    pub async fn run<W: Write>(&mut self, out: &mut W) -> HostbridgeResult<TerminalAction> {
        check_container(&self.layout, self.ctx.runtime_hint.as_deref())?;
        self.finish(Stage::PreconditionCheck);

        if let Some(hook) = self.ctx.pre_init_hook.clone() {
            self.run_hook("pre-init", &hook).await?;
        }
        self.finish(Stage::PreInitHooks);

        match packages::ensure_base_dependencies(&mut self.ctx, &self.layout, self.runner).await? {
            DependencyOutcome::AlreadyPresent => tracing::debug!("Dependencies already present"),
            DependencyOutcome::Installed(backend) => {
                tracing::info!("Installed base packages with {}", backend)
            }
        }
        if self.ctx.shell_fell_back() {
            tracing::warn!(
                "Using {} instead of {}",
                self.ctx.effective_shell().display(),
                self.ctx.requested_shell().display()
            );
        }
        self.finish(Stage::DependencyEnsure);

        let bridged = self.bridge_host();
        self.finish(Stage::HostBridge);

        mirror_sockets(&self.layout);
        self.finish(Stage::SocketMirror);

        let toolchains = register_exclusions(&self.layout, &bridged);
        tracing::debug!("Exclusions registered for {:?}", toolchains);
        self.finish(Stage::ExclusionRegistration);

        identity::reconcile(&self.ctx, &self.layout, self.runner).await?;
        self.finish(Stage::IdentityReconcile);

        if let Err(e) = identity::reset_credentials(&self.ctx, &self.layout, self.runner).await {
            tracing::warn!("Cannot reset credentials: {}", e);
        }
        self.finish(Stage::CredentialReset);

        let failed = propagate_skeleton(&self.ctx, &self.layout);
        if failed > 0 {
            tracing::warn!("{} skeleton entries not copied", failed);
        }
        self.finish(Stage::SkeletonPropagation);

        let failed = bridge_resources(&self.ctx, &self.layout, self.mounter);
        if failed > 0 {
            tracing::warn!("{} desktop resources unavailable", failed);
        }
        self.finish(Stage::ResourceBridge);

        if let Some(hook) = self.ctx.init_hook.clone() {
            self.run_hook("init", &hook).await?;
        }
        self.finish(Stage::InitHookExecution);

        writeln!(out, "{}", readiness::SENTINEL)?;
        out.flush()?;

        Ok(if self.ctx.init {
            TerminalAction::ExecInit
        } else {
            TerminalAction::Idle
        })
    }

    /// Read-only set first, then read-write.
    fn bridge_host(&self) -> BridgedPaths {
        let read_only = table::read_only_specs();
        let read_write = table::read_write_specs();
        let failed = bridge_all(
            &self.layout,
            self.mounter,
            read_only.iter().chain(read_write.iter()),
        );
        if failed > 0 {
            tracing::warn!("{} host bridges unavailable", failed);
        }
        table::bridged_paths()
    }

    async fn run_hook(&self, kind: &str, hook: &str) -> HostbridgeResult<()> {
        tracing::info!("Running {} hook", kind);
        let invocation = Invocation::new(shell::HOOK_INTERPRETER).args(["-c", hook]);
        let output = self
            .runner
            .run_checked(&invocation)
            .await
            .map_err(|e| HostbridgeError::Hook(format!("{} hook: {}", kind, e)))?;
        if !output.stdout.is_empty() {
            tracing::info!("{} hook output: {}", kind, output.stdout.trim_end());
        }
        Ok(())
    }

    fn finish(&mut self, stage: Stage) {
        tracing::debug!("Stage {} complete", stage);
        self.completed.push(stage);
    }
}

/// Refuse to run unless a runtime marker file or the `container`
/// environment value says we are inside a container.
pub fn check_container(layout: &RootLayout, runtime_hint: Option<&str>) -> HostbridgeResult<()> {
    if let Some(marker) = layout.container_markers().iter().find(|m| m.exists()) {
        tracing::debug!("Container marker {}", marker.display());
        return Ok(());
    }
    if let Some(hint) = runtime_hint.filter(|h| !h.is_empty()) {
        tracing::debug!("Container runtime {}", hint);
        return Ok(());
    }
    Err(HostbridgeError::NotInContainer(
        "no container marker found; refusing to run on the host".to_string(),
    ))
}

/// Refresh and upgrade the container's packages instead of bootstrapping.
pub async fn upgrade(
    layout: &RootLayout,
    runtime_hint: Option<&str>,
    runner: &dyn CommandRunner,
) -> HostbridgeResult<PackageBackend> {
    check_container(layout, runtime_hint)?;
    packages::upgrade_packages(runner).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MountMode;
    use crate::packages::BootstrapMarker;
    use crate::testing::{FakeMounter, FakeRunner};
    use std::fs;
    use std::path::{Path, PathBuf};

    fn alice(shell_path: &str) -> ExecutionContext {
        ExecutionContext::new("alice", 1000, 1000, "/home/alice", Some(shell_path.into()))
    }

    /// Minimal docker rootfs with a host root carrying a journal and a
    /// media directory.
    fn rootfs() -> (tempfile::TempDir, RootLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = RootLayout::new(dir.path());
        fs::create_dir_all(layout.resolve("/etc/skel")).unwrap();
        fs::create_dir_all(layout.resolve("/etc/dpkg/dpkg.cfg.d")).unwrap();
        fs::write(layout.resolve("/.dockerenv"), "").unwrap();
        fs::write(layout.passwd(), "root:x:0:0:root:/root:/bin/bash\n").unwrap();
        fs::write(layout.group(), "root:x:0:\nsudo:x:27:\n").unwrap();
        fs::write(layout.shadow(), "root:*:19000::::::\n").unwrap();
        fs::write(layout.resolve("/etc/skel/.bashrc"), "# skel\n").unwrap();
        fs::create_dir_all(layout.resolve("/run/host/var/log/journal")).unwrap();
        fs::create_dir_all(layout.resolve("/run/host/media")).unwrap();
        (dir, layout)
    }

    /// Shadow-utils stand-ins that write the records they are asked for.
    fn shadow_utils(
        layout: &RootLayout,
    ) -> impl Fn(&Invocation) -> Option<i32> + Send + Sync + 'static {
        let passwd = layout.passwd();
        let group = layout.group();
        move |inv| {
            let args = inv.get_args();
            let value = |flag: &str| {
                args.iter()
                    .position(|a| a == flag)
                    .and_then(|i| args.get(i + 1))
                    .cloned()
                    .unwrap_or_default()
            };
            let name = args.last().cloned().unwrap_or_default();
            let (path, record): (&Path, String) = match inv.program() {
                "groupadd" => (group.as_path(), format!("{}:x:{}:", name, value("--gid"))),
                "useradd" => (
                    passwd.as_path(),
                    format!(
                        "{}:x:{}:{}::{}:{}",
                        name,
                        value("--uid"),
                        value("--gid"),
                        value("--home-dir"),
                        value("--shell")
                    ),
                ),
                _ => return None,
            };
            let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
            writeln!(file, "{}", record).unwrap();
            Some(0)
        }
    }

    fn passwd_entry(layout: &RootLayout, name: &str) -> Vec<String> {
        fs::read_to_string(layout.passwd())
            .unwrap()
            .lines()
            .map(|l| l.split(':').map(str::to_string).collect::<Vec<_>>())
            .find(|fields| fields[0] == name)
            .unwrap()
    }

    #[tokio::test]
    async fn test_alice_with_requested_shell() {
        let (_dir, layout) = rootfs();
        let runner = FakeRunner::default()
            .with_commands(&["apt-get"])
            .on(shadow_utils(&layout));
        let mounter = FakeMounter::default();
        let mut out = Vec::new();

        let mut bootstrap = Bootstrap::new(alice("/bin/zsh"), layout.clone(), &runner, &mounter);
        let action = bootstrap.run(&mut out).await.unwrap();

        assert_eq!(action, TerminalAction::Idle);
        assert_eq!(bootstrap.completed(), &Stage::ALL);
        assert_eq!(String::from_utf8(out).unwrap(), "container_setup_done\n");

        let user = passwd_entry(&layout, "alice");
        assert_eq!(user[2], "1000");
        assert_eq!(user[6], "/bin/zsh");
        let group = fs::read_to_string(layout.group()).unwrap();
        assert!(group.lines().any(|l| l == "alice:x:1000:"));
        let sudoers = fs::read_to_string(layout.sudoers_fragment()).unwrap();
        assert!(sudoers.lines().any(|l| l == "alice ALL = (root) NOPASSWD:ALL"));

        assert!(layout.resolve("/home/alice/.bashrc").is_file());
        assert!(layout.resolve("/etc/dpkg/dpkg.cfg.d/00_hostbridge").is_file());

        let mounts = mounter.mounts();
        assert!(mounts.contains(&(
            layout.resolve("/run/host/var/log/journal"),
            layout.resolve("/var/log/journal"),
            MountMode::ReadOnly
        )));
        assert!(mounts.contains(&(
            layout.resolve("/run/host/media"),
            layout.resolve("/media"),
            MountMode::ReadWrite
        )));

        let lines = runner.command_lines();
        assert!(lines.contains(&"usermod -aG sudo alice".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("chpasswd")));
    }

    #[tokio::test]
    async fn test_alice_falls_back_to_bash() {
        let (_dir, layout) = rootfs();
        let runner = FakeRunner::default()
            .with_commands(&["apt-get"])
            .on(|inv| {
                (inv.program() == "apt-get" && inv.get_args().last().is_some_and(|a| a == "zsh"))
                    .then_some(100)
            })
            .on(shadow_utils(&layout));
        let mounter = FakeMounter::default();
        let mut out = Vec::new();

        let mut bootstrap = Bootstrap::new(alice("/bin/zsh"), layout.clone(), &runner, &mounter);
        bootstrap.run(&mut out).await.unwrap();

        assert_eq!(passwd_entry(&layout, "alice")[6], "/bin/bash");
        let batch = runner
            .calls()
            .into_iter()
            .rev()
            .find(|inv| inv.program() == "apt-get")
            .unwrap();
        assert!(batch.get_args().iter().any(|a| a == "bash"));
        assert!(!batch.get_args().iter().any(|a| a == "zsh"));
        assert_eq!(
            BootstrapMarker::load(&layout).unwrap().effective_shell,
            PathBuf::from("/bin/bash")
        );
    }

    #[tokio::test]
    async fn test_rerun_over_same_rootfs() {
        let (_dir, layout) = rootfs();
        let runner = FakeRunner::default()
            .with_commands(&["apt-get"])
            .on(shadow_utils(&layout));
        let mounter = FakeMounter::default();

        for _ in 0..2 {
            let mut out = Vec::new();
            let mut bootstrap =
                Bootstrap::new(alice("/bin/zsh"), layout.clone(), &runner, &mounter);
            bootstrap.run(&mut out).await.unwrap();
        }

        let passwd = fs::read_to_string(layout.passwd()).unwrap();
        let records = passwd.lines().filter(|l| l.starts_with("alice:"));
        assert_eq!(records.count(), 1);
        let journal = layout.resolve("/var/log/journal");
        assert_eq!(
            mounter.mounts().iter().filter(|m| m.1 == journal).count(),
            1
        );
        assert!(mounter.unmounts().contains(&journal));
    }

    #[tokio::test]
    async fn test_refuses_to_run_on_host() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RootLayout::new(dir.path());
        let runner = FakeRunner::default().with_commands(&["apt-get"]);
        let mounter = FakeMounter::default();
        let mut out = Vec::new();

        let mut bootstrap = Bootstrap::new(alice("/bin/bash"), layout, &runner, &mounter);
        let err = bootstrap.run(&mut out).await.unwrap_err();

        assert_eq!(err.exit_code(), 126);
        assert!(bootstrap.completed().is_empty());
        assert!(out.is_empty());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_container_env_is_enough() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RootLayout::new(dir.path());
        let runner = FakeRunner::default();
        let mounter = FakeMounter::default();
        let mut ctx = alice("/bin/bash");
        ctx.runtime_hint = Some("podman".to_string());

        let mut bootstrap = Bootstrap::new(ctx, layout, &runner, &mounter);
        let err = bootstrap.run(&mut Vec::<u8>::new()).await.unwrap_err();

        assert_eq!(err.exit_code(), 127);
        assert_eq!(bootstrap.completed(), &Stage::ALL[..2]);
    }

    #[tokio::test]
    async fn test_init_hook_failure_is_fatal() {
        let (_dir, layout) = rootfs();
        let runner = FakeRunner::default()
            .with_commands(&["apt-get"])
            .on(|inv| (inv.program() == "/bin/sh").then_some(3))
            .on(shadow_utils(&layout));
        let mounter = FakeMounter::default();
        let mut ctx = alice("/bin/bash");
        ctx.init_hook = Some("exit 3".to_string());
        let mut out = Vec::new();

        let mut bootstrap = Bootstrap::new(ctx, layout, &runner, &mounter);
        let err = bootstrap.run(&mut out).await.unwrap_err();

        assert!(matches!(err, HostbridgeError::Hook(_)));
        assert_eq!(bootstrap.completed().last(), Some(&Stage::ResourceBridge));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_hooks_run_in_order() {
        let (_dir, layout) = rootfs();
        let runner = FakeRunner::default()
            .with_commands(&["apt-get"])
            .on(shadow_utils(&layout));
        let mounter = FakeMounter::default();
        let mut ctx = alice("/bin/bash");
        ctx.pre_init_hook = Some("echo pre".to_string());
        ctx.init_hook = Some("echo post".to_string());
        ctx.init = true;

        let mut bootstrap = Bootstrap::new(ctx, layout, &runner, &mounter);
        let action = bootstrap.run(&mut Vec::<u8>::new()).await.unwrap();

        assert_eq!(action, TerminalAction::ExecInit);
        let lines = runner.command_lines();
        assert_eq!(lines.first().unwrap(), "/bin/sh -c echo pre");
        assert_eq!(lines.last().unwrap(), "/bin/sh -c echo post");
    }

    #[tokio::test]
    async fn test_bridge_failures_degrade() {
        let (_dir, layout) = rootfs();
        let runner = FakeRunner::default()
            .with_commands(&["apt-get"])
            .on(shadow_utils(&layout));
        let mounter = FakeMounter::failing();
        let mut out = Vec::new();

        let mut bootstrap = Bootstrap::new(alice("/bin/bash"), layout, &runner, &mounter);
        bootstrap.run(&mut out).await.unwrap();

        assert_eq!(bootstrap.completed(), &Stage::ALL);
        assert_eq!(String::from_utf8(out).unwrap(), "container_setup_done\n");
    }

    #[tokio::test]
    async fn test_upgrade() {
        let (_dir, layout) = rootfs();
        let runner = FakeRunner::default().with_commands(&["dnf"]);

        let backend = upgrade(&layout, None, &runner).await.unwrap();

        assert_eq!(backend, PackageBackend::Dnf);
        assert_eq!(runner.command_lines(), vec!["dnf upgrade -y"]);
    }

    #[tokio::test]
    async fn test_upgrade_checks_container() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RootLayout::new(dir.path());
        let runner = FakeRunner::default().with_commands(&["dnf"]);

        let err = upgrade(&layout, Some(""), &runner).await.unwrap_err();

        assert_eq!(err.exit_code(), 126);
        assert!(runner.calls().is_empty());
    }
}
