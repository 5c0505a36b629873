//! Implementation of the `br <target> describe` command.

use std::path::Path;

use anyhow::{Context, Result};

use buildrules_lib::execute::Builder;
use buildrules_lib::target;

use crate::output::print_stat;

/// Log the configuration files and every rule description without executing.
pub fn cmd_describe(target_name: &str, folder: &Path) -> Result<()> {
  let target = target::lookup(target_name)?;
  let builder = Builder::new(target, folder)
    .with_context(|| format!("Failed to load configuration from {}", folder.display()))?;

  let descriptions = builder.describe().context("Failed to describe build")?;

  println!();
  print_stat("Rules", &descriptions.len().to_string());
  Ok(())
}
