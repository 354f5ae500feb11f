//! Credential reset.
//!
//! Some toolchains refuse an empty password outright, so a random one is
//! set through `chpasswd` first and the hash is cleared afterwards.

use super::db;
use crate::command::{CommandRunner, Invocation};
use crate::context::ExecutionContext;
use hostbridge_shared::errors::HostbridgeResult;
use hostbridge_shared::RootLayout;
use rand::distr::Alphanumeric;
use rand::Rng;

const PASSWORD_LEN: usize = 32;

pub fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect()
}

/// Leave root and the user with an empty password.
pub async fn reset_credentials(
    ctx: &ExecutionContext,
    layout: &RootLayout,
    runner: &dyn CommandRunner,
) -> HostbridgeResult<()> {
    let password = generate_password();
    let chpasswd = Invocation::new("chpasswd").stdin(format!(
        "root:{password}\n{user}:{password}\n",
        user = ctx.username
    ));
    if let Err(e) = runner.run_checked(&chpasswd).await {
        tracing::warn!("Cannot set passwords: {}", e);
    }

    let cleared = db::clear_password(&layout.shadow(), &["root", ctx.username.as_str()])?;
    tracing::debug!("Cleared {} password hashes", cleared);
    Ok(())
}
