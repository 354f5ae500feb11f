//! ALPM transaction hooks.
//!
//! Three hooks, each backed by a script in the libalpm scripts directory:
//! unmount read-only bridges before a transaction, stub out systemd-hook
//! when systemd is not running, and restore the read-only bridges after.

use super::write_artifact;
use crate::bridge::BridgedPaths;
use hostbridge_shared::constants::init;
use hostbridge_shared::errors::HostbridgeResult;
use hostbridge_shared::layout::paths;
use hostbridge_shared::RootLayout;
use std::fmt::Write;

pub(super) const PRE_HOOK: &str = "/usr/share/libalpm/hooks/00_hostbridge_pre_hook.hook";
pub(super) const SYSTEMD_HOOK: &str = "/usr/share/libalpm/hooks/01_hostbridge_post_hook.hook";
pub(super) const POST_HOOK: &str = "/usr/share/libalpm/hooks/02_hostbridge_post_hook.hook";

const PRE_SCRIPT: &str = "/usr/share/libalpm/scripts/00_hostbridge_pre_hook.sh";
const SYSTEMD_SCRIPT: &str = "/usr/share/libalpm/scripts/01_hostbridge_post_hook.sh";
const POST_SCRIPT: &str = "/usr/share/libalpm/scripts/02_hostbridge_post_hook.sh";

#[derive(Clone, Copy)]
enum When {
    PreTransaction,
    PostTransaction,
}

impl When {
    fn as_str(self) -> &'static str {
        match self {
            Self::PreTransaction => "PreTransaction",
            Self::PostTransaction => "PostTransaction",
        }
    }
}

fn render_hook(description: &str, when: When, script: &str) -> String {
    format!(
        "[Trigger]\n\
         Operation = Install\n\
         Operation = Upgrade\n\
         Operation = Remove\n\
         Type = Package\n\
         Target = *\n\
         \n\
         [Action]\n\
         Description = {description}\n\
         When = {when}\n\
         Exec = {script}\n",
        when = when.as_str(),
    )
}

pub(super) fn render_pre_script(bridged: &BridgedPaths) -> String {
    let mut out = String::from("#!/bin/sh\n");
    for target in bridged.read_only() {
        let _ = writeln!(
            out,
            "if findmnt {t} >/dev/null 2>&1; then umount {t}; fi",
            t = target.display()
        );
    }
    out.push_str("exit 0\n");
    out
}

pub(super) fn render_systemd_script() -> String {
    let stub = format!("{}/systemd-hook", paths::ALPM_SCRIPTS_DIR);
    format!(
        "#!/bin/sh\n\
         if [ ! -e {runtime} ]; then\n\
         \tprintf '#!/bin/sh\\nexit 0\\n' > {stub}\n\
         \tchmod 0755 {stub}\n\
         fi\n\
         exit 0\n",
        runtime = init::SYSTEMD_RUNTIME_DIR,
    )
}

pub(super) fn render_post_script(bridged: &BridgedPaths) -> String {
    let mut out = String::from("#!/bin/sh\n");
    for target in bridged.read_only() {
        let host = RootLayout::host_path(target);
        let _ = writeln!(
            out,
            "if [ -e {h} ] && ! findmnt {t} >/dev/null 2>&1; then mount --rbind -o ro {h} {t}; fi",
            h = host.display(),
            t = target.display()
        );
    }
    out.push_str("exit 0\n");
    out
}

pub(super) fn register(layout: &RootLayout, bridged: &BridgedPaths) -> HostbridgeResult<()> {
    write_artifact(layout, PRE_SCRIPT, &render_pre_script(bridged), 0o755)?;
    write_artifact(layout, SYSTEMD_SCRIPT, &render_systemd_script(), 0o755)?;
    write_artifact(layout, POST_SCRIPT, &render_post_script(bridged), 0o755)?;

    write_artifact(
        layout,
        PRE_HOOK,
        &render_hook("Unmounting host bridges", When::PreTransaction, PRE_SCRIPT),
        0o644,
    )?;
    write_artifact(
        layout,
        SYSTEMD_HOOK,
        &render_hook(
            "Disabling systemd-hook without systemd",
            When::PostTransaction,
            SYSTEMD_SCRIPT,
        ),
        0o644,
    )?;
    write_artifact(
        layout,
        POST_HOOK,
        &render_hook("Restoring host bridges", When::PostTransaction, POST_SCRIPT),
        0o644,
    )
}
