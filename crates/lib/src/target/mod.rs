//! Build targets: the rule-producers selectable from the command line.
//!
//! A [`Target`] names the configuration documents it reads, with a schema for
//! each, and turns a validated [`ConfigStore`] into a rule list. Targets that
//! install logical units route every unit through the idempotency gate.

pub mod ci;
pub mod scripts;

use thiserror::Error;

use crate::config::{ConfigError, ConfigStore, Schema};
use crate::ledger::LedgerError;
use crate::rule::Rule;

/// A domain rule-producer.
pub trait Target: Send + Sync {
  fn name(&self) -> &'static str;

  /// Configuration files read from the configuration folder, each with the
  /// schema it is validated against.
  fn documents(&self) -> Vec<(&'static str, Schema)>;

  /// Produce the build rules for a validated configuration.
  fn rules(&self, store: &ConfigStore) -> Result<Vec<Rule>, TargetError>;
}

/// Errors that can occur while producing rules.
#[derive(Debug, Error)]
pub enum TargetError {
  #[error("unknown target '{0}', expected one of: {list}", list = names().join(", "))]
  Unknown(String),

  #[error(transparent)]
  Config(#[from] ConfigError),

  /// A validated document still could not be read into its typed form.
  #[error("invalid configuration '{document}': {source}")]
  Invalid {
    document: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("unit '{0}' is defined more than once")]
  DuplicateUnit(String),

  #[error(transparent)]
  Ledger(#[from] LedgerError),
}

/// Names of every registered target.
pub fn names() -> Vec<&'static str> {
  vec![ci::NAME, scripts::NAME]
}

/// Find a target by name.
pub fn lookup(name: &str) -> Result<Box<dyn Target>, TargetError> {
  match name {
    ci::NAME => Ok(Box::new(ci::Ci)),
    scripts::NAME => Ok(Box::new(scripts::Scripts)),
    other => Err(TargetError::Unknown(other.to_string())),
  }
}
