//! `slipway clean` command

use anyhow::Result;

use crate::cli::CleanArgs;
use slipway::util::fs::{dir_size, remove_dir_all_if_exists};
use slipway::GlobalContext;

pub fn execute(args: CleanArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let layout = ctx.project_layout()?;

    let slipway_dir = layout.slipway_dir();
    let freed = dir_size(&slipway_dir);
    remove_dir_all_if_exists(&slipway_dir)?;
    eprintln!(
        "     Removed {} ({})",
        slipway_dir.display(),
        human_size(freed)
    );

    if args.dist {
        let dist_dir = layout.dist_dir();
        let freed = dir_size(&dist_dir);
        remove_dir_all_if_exists(&dist_dir)?;
        eprintln!("     Removed {} ({})", dist_dir.display(), human_size(freed));
    }

    Ok(())
}

/// Format a byte count for status output.
fn human_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}
