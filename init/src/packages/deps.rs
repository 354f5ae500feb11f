//! Base dependency installation with shell fallback.

use super::backend::PackageBackend;
use super::marker::BootstrapMarker;
use crate::command::CommandRunner;
use crate::context::{shell_name, ExecutionContext};
use hostbridge_shared::constants::shell;
use hostbridge_shared::errors::{HostbridgeError, HostbridgeResult};
use hostbridge_shared::layout::paths;
use hostbridge_shared::RootLayout;
use std::path::Path;

/// Executables whose presence lets the install step be skipped.
pub const REQUIRED_TOOLS: &[&str] = &[
    "find", "mount", "passwd", "sudo", "useradd", "usermod",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DependencyOutcome {
    /// Everything needed was already installed.
    AlreadyPresent,
    /// Packages were installed with this backend.
    Installed(PackageBackend),
}

/// Make sure the interactive shell environment is installed.
///
/// On return `ctx.effective_shell()` is the shell the user should get:
/// either the requested one or [`shell::FALLBACK`] when the requested
/// package could not be installed.
pub async fn ensure_base_dependencies(
    ctx: &mut ExecutionContext,
    layout: &RootLayout,
    runner: &dyn CommandRunner,
) -> HostbridgeResult<DependencyOutcome> {
    reuse_previous_fallback(ctx, layout, runner);

    if dependencies_present(ctx, layout, runner) {
        tracing::info!("Base dependencies already present");
        record(ctx, layout, None);
        return Ok(DependencyOutcome::AlreadyPresent);
    }

    let backend = PackageBackend::detect(runner)?;
    tracing::info!("Installing base dependencies with {}", backend);

    if let Some(sync) = backend.sync() {
        runner
            .run_checked(&sync)
            .await
            .map_err(|e| HostbridgeError::Dependency(format!("{} refresh: {}", backend, e)))?;
    }

    let requested = ctx.shell_package();
    let shell_installed = match runner.run(&backend.install(&[&requested])).await {
        Ok(output) => output.success(),
        Err(e) => {
            tracing::debug!("Shell install did not run: {}", e);
            false
        }
    };
    if !shell_installed {
        tracing::warn!(
            "Cannot install shell {}, falling back to {}",
            requested,
            shell::FALLBACK
        );
        ctx.set_effective_shell(shell::FALLBACK);
    }

    let mut batch = vec![ctx.shell_package()];
    batch.extend(backend.base_packages().iter().map(|p| p.to_string()));
    runner
        .run_checked(&backend.install(&batch))
        .await
        .map_err(|e| HostbridgeError::Dependency(e.to_string()))?;

    record(ctx, layout, Some(backend));
    Ok(DependencyOutcome::Installed(backend))
}

/// Refresh repositories and upgrade every installed package.
pub async fn upgrade_packages(runner: &dyn CommandRunner) -> HostbridgeResult<PackageBackend> {
    let backend = PackageBackend::detect(runner)?;
    tracing::info!("Upgrading container packages with {}", backend);

    if let Some(sync) = backend.sync() {
        runner
            .run_checked(&sync)
            .await
            .map_err(|e| HostbridgeError::Dependency(format!("{} refresh: {}", backend, e)))?;
    }
    runner
        .run_checked(&backend.upgrade())
        .await
        .map_err(|e| HostbridgeError::Dependency(format!("{} upgrade: {}", backend, e)))?;
    Ok(backend)
}

/// Whether every required tool, the vte profile and the shell exist.
pub fn dependencies_present(
    ctx: &ExecutionContext,
    layout: &RootLayout,
    runner: &dyn CommandRunner,
) -> bool {
    let missing: Vec<&str> = REQUIRED_TOOLS
        .iter()
        .copied()
        .filter(|tool| !runner.has_command(tool))
        .collect();
    if !missing.is_empty() {
        tracing::debug!("Missing tools: {}", missing.join(", "));
        return false;
    }
    if !layout.resolve(paths::VTE_PROFILE).exists() {
        tracing::debug!("Missing {}", paths::VTE_PROFILE);
        return false;
    }
    shell_present(ctx.effective_shell(), layout, runner)
}

fn shell_present(shell_path: &Path, layout: &RootLayout, runner: &dyn CommandRunner) -> bool {
    layout.resolve(shell_path).exists() || runner.has_command(&shell_name(shell_path))
}

/// Keep the previous boot's fallback while the requested shell is still
/// missing.
fn reuse_previous_fallback(
    ctx: &mut ExecutionContext,
    layout: &RootLayout,
    runner: &dyn CommandRunner,
) {
    if shell_present(ctx.requested_shell(), layout, runner) {
        return;
    }
    let Some(marker) = BootstrapMarker::load(layout) else {
        return;
    };
    if marker.requested_shell == ctx.requested_shell()
        && marker.effective_shell != marker.requested_shell
    {
        tracing::info!(
            "Reusing fallback shell {} from previous bootstrap",
            marker.effective_shell.display()
        );
        ctx.set_effective_shell(marker.effective_shell);
    }
}

fn record(ctx: &ExecutionContext, layout: &RootLayout, backend: Option<PackageBackend>) {
    let marker = BootstrapMarker {
        requested_shell: ctx.requested_shell().to_path_buf(),
        effective_shell: ctx.effective_shell().to_path_buf(),
        backend,
    };
    if let Err(e) = marker.save(layout) {
        tracing::warn!("Cannot record bootstrap marker: {}", e);
    }
}
