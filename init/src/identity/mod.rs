//! Identity reconciler.
//!
//! Brings the container's group and user records in line with the host
//! identity. Shadow-utils are preferred; when they reject the request
//! (unusual usernames, missing binaries) records are appended directly.

mod credentials;
mod db;
mod sudoers;

use crate::command::{CommandRunner, Invocation};
use crate::context::ExecutionContext;
use hostbridge_shared::errors::HostbridgeResult;
use hostbridge_shared::RootLayout;

pub use credentials::reset_credentials;
pub use sudoers::grant_passwordless_sudo;

/// Groups granting administrative rights, first match wins.
pub const ADMIN_GROUPS: &[&str] = &["sudo", "wheel"];

/// Create or update the group, the user and the sudoers grant.
///
/// Only a failed direct database write is an error; tool failures fall
/// back or degrade to warnings.
pub async fn reconcile(
    ctx: &ExecutionContext,
    layout: &RootLayout,
    runner: &dyn CommandRunner,
) -> HostbridgeResult<()> {
    ensure_group(ctx, layout, runner).await?;
    ensure_user(ctx, layout, runner).await?;
    join_admin_group(ctx, layout, runner).await;

    if let Err(e) = grant_passwordless_sudo(layout, &ctx.username) {
        tracing::warn!("Cannot configure sudo for {}: {}", ctx.username, e);
    }
    Ok(())
}

async fn ensure_group(
    ctx: &ExecutionContext,
    layout: &RootLayout,
    runner: &dyn CommandRunner,
) -> HostbridgeResult<()> {
    let group = layout.group();
    if db::contains(&group, &ctx.username) {
        return Ok(());
    }

    let groupadd = Invocation::new("groupadd")
        .args(["--force", "--gid"])
        .arg(ctx.gid.to_string())
        .arg(&ctx.username);
    if run_quietly(runner, &groupadd).await && db::contains(&group, &ctx.username) {
        return Ok(());
    }

    if !db::contains(&group, &ctx.username) {
        tracing::info!("Appending group record for {}", ctx.username);
        db::append(&group, &format!("{}:x:{}:", ctx.username, ctx.gid))?;
    }
    Ok(())
}

async fn ensure_user(
    ctx: &ExecutionContext,
    layout: &RootLayout,
    runner: &dyn CommandRunner,
) -> HostbridgeResult<()> {
    let passwd = layout.passwd();
    let home = ctx.home.to_string_lossy().into_owned();
    let shell = ctx.effective_shell().to_string_lossy().into_owned();

    if db::contains(&passwd, &ctx.username) {
        let usermod = Invocation::new("usermod")
            .args(["--home", home.as_str(), "--shell", shell.as_str()])
            .args(["--uid".to_string(), ctx.uid.to_string()])
            .args(["--gid".to_string(), ctx.gid.to_string()])
            .arg(&ctx.username);
        if let Err(e) = runner.run_checked(&usermod).await {
            tracing::warn!("Cannot update user {}: {}", ctx.username, e);
        }
        return Ok(());
    }

    let useradd = Invocation::new("useradd")
        .args([
            "--home-dir",
            home.as_str(),
            "--no-create-home",
            "--shell",
            shell.as_str(),
        ])
        .args(["--uid".to_string(), ctx.uid.to_string()])
        .args(["--gid".to_string(), ctx.gid.to_string()])
        .arg(&ctx.username);
    if run_quietly(runner, &useradd).await && db::contains(&passwd, &ctx.username) {
        return Ok(());
    }

    if !db::contains(&passwd, &ctx.username) {
        tracing::info!("Appending user record for {}", ctx.username);
        db::append(
            &passwd,
            &format!(
                "{name}:x:{uid}:{gid}:{name}:{home}:{shell}",
                name = ctx.username,
                uid = ctx.uid,
                gid = ctx.gid,
            ),
        )?;
    }
    let shadow = layout.shadow();
    if !db::contains(&shadow, &ctx.username) {
        db::append(&shadow, &format!("{}::1::::::", ctx.username))?;
    }
    Ok(())
}

async fn join_admin_group(
    ctx: &ExecutionContext,
    layout: &RootLayout,
    runner: &dyn CommandRunner,
) {
    let group = layout.group();
    let Some(admin) = ADMIN_GROUPS.iter().find(|g| db::contains(&group, g)) else {
        return;
    };
    let usermod = Invocation::new("usermod")
        .args(["-aG", *admin])
        .arg(&ctx.username);
    if let Err(e) = runner.run_checked(&usermod).await {
        tracing::warn!("Cannot add {} to {}: {}", ctx.username, admin, e);
    }
}

/// Run a tool whose failure has a fallback; only log why it failed.
async fn run_quietly(runner: &dyn CommandRunner, invocation: &Invocation) -> bool {
    match runner.run_checked(invocation).await {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!("{} failed, using direct write: {}", invocation.program(), e);
            false
        }
    }
}
