//! Implementation of the `br <target> build` command.
//!
//! Loads and validates the configuration folder, then executes the target's
//! build rules followed by the deployment rules, stopping at the first failure.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use buildrules_lib::execute::Builder;
use buildrules_lib::target;

use crate::output::{print_info, print_stat, print_success};

/// Execute the build command.
///
/// With `dry_run` every rule is still invoked and logs its message, but no
/// process is spawned, no action runs and the ledger is left untouched.
pub fn cmd_build(target_name: &str, folder: &Path, dry_run: bool) -> Result<()> {
  let target = target::lookup(target_name)?;
  let builder = Builder::new(target, folder)
    .with_context(|| format!("Failed to load configuration from {}", folder.display()))?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let summary = rt.block_on(builder.build(dry_run)).context("Build failed")?;
  info!(invoked = summary.invoked(), effects = summary.effects(), "build finished");

  println!();
  if summary.dry_run {
    print_info("Dry run complete, nothing was changed");
  } else {
    print_success("Build complete!");
  }
  print_stat("Rules invoked", &summary.invoked().to_string());
  print_stat("Rules with effects", &summary.effects().to_string());

  Ok(())
}
