//! The `ci` target: validates configuration and deployments only.
//!
//! Useful to exercise a configuration folder, including its deployers, without
//! installing anything.

use super::{Target, TargetError};
use crate::config::{ConfigStore, Schema};
use crate::rule::Rule;

pub const NAME: &str = "ci";

pub struct Ci;

impl Target for Ci {
  fn name(&self) -> &'static str {
    NAME
  }

  fn documents(&self) -> Vec<(&'static str, Schema)> {
    vec![("build_config.yaml", Schema::any())]
  }

  fn rules(&self, _store: &ConfigStore) -> Result<Vec<Rule>, TargetError> {
    Ok(Vec::new())
  }
}
