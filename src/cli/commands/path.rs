//! path command - Print the lock path for a working directory

use anyhow::Result;

use super::resolve_target;
use crate::cli::args::TargetArgs;
use crate::core::paths::lock_path_for;

/// Print the derived lock path. Touches nothing on disk.
pub fn path(args: &TargetArgs) -> Result<()> {
    let target = resolve_target(args)?;
    let lock_path = lock_path_for(&target.identity, &target.config.cache_dir());
    println!("{}", lock_path);
    Ok(())
}
