//! Outcome and error types for rule invocation.

use std::io;

use thiserror::Error;

/// What a successful invocation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  /// An action ran to completion.
  Completed,
  /// A process ran and exited with this code (`-1` when killed by a signal).
  Exited(i32),
  /// Effects were suppressed by dry-run.
  DryRun,
  /// A log message was written.
  Logged,
}

/// The underlying cause of a failed rule.
#[derive(Debug, Error)]
pub enum RuleFailure {
  /// A native action returned an error.
  #[error("{0:#}")]
  Action(anyhow::Error),

  /// The process could not be started (missing executable, bad cwd, ...).
  #[error("failed to spawn '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  /// The process exited unsuccessfully and its exit code was checked.
  #[error("command '{command}' failed with exit code {code:?}")]
  Exit { command: String, code: Option<i32> },

  /// Reading process output or waiting for it failed.
  #[error("i/o error while running '{command}': {source}")]
  Io {
    command: String,
    #[source]
    source: io::Error,
  },
}

/// A failed rule: its description, the cause, and a captured diagnostic.
#[derive(Debug, Error)]
#[error("{rule}: {cause}")]
pub struct RuleError {
  /// Description of the rule that failed.
  pub rule: String,

  pub cause: RuleFailure,

  /// Error chain and backtrace for actions, tail of stderr for processes.
  pub diagnostic: String,
}

impl RuleError {
  pub fn new(rule: impl Into<String>, cause: RuleFailure, diagnostic: impl Into<String>) -> Self {
    Self {
      rule: rule.into(),
      cause,
      diagnostic: diagnostic.into(),
    }
  }

  /// Exit code of a failed process rule, if that is what failed.
  pub fn exit_code(&self) -> Option<i32> {
    match &self.cause {
      RuleFailure::Exit { code, .. } => *code,
      _ => None,
    }
  }
}
