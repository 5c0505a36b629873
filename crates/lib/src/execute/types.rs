//! Types for rule execution.
//!
//! This module defines the summary returned by a successful run and the
//! errors a [`Builder`](super::Builder) can fail with.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::deploy::DeployError;
use crate::rule::{Outcome, RuleError};
use crate::target::TargetError;

/// What a completed run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
  /// Outcome of every rule, in execution order.
  pub outcomes: Vec<Outcome>,
  pub dry_run: bool,
}

impl RunSummary {
  /// Number of rules invoked.
  pub fn invoked(&self) -> usize {
    self.outcomes.len()
  }

  /// Number of actions and processes that actually ran.
  pub fn effects(&self) -> usize {
    self
      .outcomes
      .iter()
      .filter(|o| matches!(o, Outcome::Completed | Outcome::Exited(_)))
      .count()
  }
}

/// Errors that can occur while assembling or running a build.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("configuration folder {0} is not a directory")]
  NotADirectory(PathBuf),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Deploy(#[from] DeployError),

  #[error(transparent)]
  Target(#[from] TargetError),

  #[error(transparent)]
  Rule(#[from] RuleError),
}
