//! Desktop resources (themes, icons, fonts).

use super::skeleton::give_to;
use crate::bridge::{bridge_all, table, Mounter};
use crate::context::ExecutionContext;
use hostbridge_shared::RootLayout;
use std::fs;

/// Bridge host themes, icons and fonts and prepare the per-user
/// directories. Returns how many steps failed.
pub fn bridge_resources(
    ctx: &ExecutionContext,
    layout: &RootLayout,
    mounter: &dyn Mounter,
) -> usize {
    let mut failed = bridge_all(layout, mounter, &table::desktop_resource_specs());

    let home = layout.resolve(&ctx.home);
    let created_home = !home.exists();
    let local = home.join(".local");
    let share = local.join("share");
    for name in table::DESKTOP_RESOURCES {
        let dir = share.join(name);
        if let Err(e) = fs::create_dir_all(&dir) {
            failed += 1;
            tracing::warn!("Cannot create {}: {}", dir.display(), e);
            continue;
        }
        give_to(&dir, ctx.uid, ctx.gid, false);
    }
    let mut created = vec![&local, &share];
    if created_home {
        created.push(&home);
    }
    for dir in created {
        if dir.is_dir() {
            give_to(dir, ctx.uid, ctx.gid, false);
        }
    }
    failed
}
