//! Sequential, fail-fast rule execution.
//!
//! The [`Executor`] runs a rule list strictly in order. The first failing
//! rule is logged on the executor's error sink and returned; nothing after it
//! is invoked. [`Builder`] assembles the list for a target from its
//! configuration folder and hands it to an executor.

mod builder;
mod types;

pub use builder::Builder;
pub use types::*;

use tracing::{debug, info};

use crate::rule::{Rule, RuleError, Sink};

/// Runs rule lists.
#[derive(Debug, Clone)]
pub struct Executor {
  error: Sink,
}

impl Default for Executor {
  fn default() -> Self {
    Self { error: Sink::error() }
  }
}

impl Executor {
  pub fn new() -> Self {
    Self::default()
  }

  /// Send failure reports to `sink` instead of `tracing`.
  pub fn with_error_sink(sink: Sink) -> Self {
    Self { error: sink }
  }

  /// Invoke every rule in order, stopping at the first failure.
  pub async fn run(&self, rules: &[Rule], dry_run: bool) -> Result<RunSummary, RuleError> {
    info!(rules = rules.len(), dry_run, "executing rules");
    let mut summary = RunSummary {
      outcomes: Vec::with_capacity(rules.len()),
      dry_run,
    };

    for (index, rule) in rules.iter().enumerate() {
      debug!(index, "invoking rule");
      match rule.invoke(dry_run).await {
        Ok(outcome) => summary.outcomes.push(outcome),
        Err(err) => {
          self.error.write(&format!(
            "Encountered an error while executing rule: {}: {}",
            err.rule, err.cause
          ));
          if !err.diagnostic.is_empty() {
            self.error.write(&err.diagnostic);
          }
          return Err(err);
        }
      }
    }

    info!(invoked = summary.invoked(), effects = summary.effects(), "rules completed");
    Ok(summary)
  }

  /// Descriptions of `rules`, without invoking any of them.
  pub fn describe(&self, rules: &[Rule]) -> Vec<String> {
    rules.iter().map(Rule::description).collect()
  }
}
