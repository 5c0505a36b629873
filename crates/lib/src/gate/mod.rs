//! Idempotency gate for logical units.
//!
//! Every rule-producer runs each of its units through the same gate: look up
//! the unit in the ledger and compare fingerprints.
//!
//! - No entry: install, then record the new fingerprint.
//! - Different fingerprint: update, seeded from the previous installation,
//!   then record the new fingerprint and optionally remove the previous
//!   installation.
//! - Equal fingerprint: skip, announced by a single log rule.
//!
//! Fingerprint equality is the only criterion.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::ledger::{InstalledStateLedger, LedgerEntry, LedgerState};
use crate::rule::{ActionRule, Rule};
use crate::util::hash::Fingerprint;

/// What the gate decided for one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitAction {
  Install,
  Update { previous: LedgerEntry },
  Skip,
}

/// Compare a unit's fingerprint with its ledger entry.
pub fn decide(state: &LedgerState, unit: &str, fingerprint: &Fingerprint) -> UnitAction {
  match state.get(unit) {
    None => UnitAction::Install,
    Some(entry) if entry.checksum != *fingerprint => UnitAction::Update {
      previous: entry.clone(),
    },
    Some(_) => UnitAction::Skip,
  }
}

/// How a unit's install rules should be produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InstallMode<'a> {
  Fresh,
  /// Replacing an earlier installation; producers may seed from it.
  Update(&'a LedgerEntry),
}

/// A logical unit a rule-producer knows how to install.
pub trait InstallUnit {
  fn name(&self) -> &str;

  /// Fingerprint of the fully resolved configuration.
  fn fingerprint(&self) -> &Fingerprint;

  fn install_path(&self) -> &Path;

  /// Extra fields stored in the ledger entry.
  fn metadata(&self) -> BTreeMap<String, Value> {
    BTreeMap::new()
  }

  /// The rules that install this unit.
  fn install_rules(&self, mode: InstallMode<'_>) -> Vec<Rule>;
}

/// Update-time policy for a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdatePolicy {
  pub remove_after_update: bool,
}

/// Plan one unit: an announcement, then whatever the gate's decision needs.
pub fn plan_unit(
  ledger: &InstalledStateLedger,
  state: &LedgerState,
  unit: &dyn InstallUnit,
  policy: UpdatePolicy,
) -> Vec<Rule> {
  let name = unit.name();
  let action = decide(state, name, unit.fingerprint());
  debug!(unit = %name, action = ?action, "gate decision");

  let mut rules = Vec::new();
  match &action {
    UnitAction::Install => {
      rules.push(Rule::log(format!("Unit {} not installed. Starting installation.", name)));
      rules.extend(unit.install_rules(InstallMode::Fresh));
    }
    UnitAction::Update { previous } => {
      rules.push(Rule::log(format!("Unit {} installed but marked for update.", name)));
      rules.extend(unit.install_rules(InstallMode::Update(previous)));
    }
    UnitAction::Skip => {
      rules.push(Rule::log(format!(
        "Unit {} is already installed. Skipping installation.",
        name
      )));
      return rules;
    }
  }

  rules.push(record_rule(ledger, unit));

  if let UnitAction::Update { previous } = action {
    if policy.remove_after_update && previous.install_path != unit.install_path() {
      rules.push(Rule::log(format!(
        "Removing old installation from {}",
        previous.install_path.display()
      )));
      rules.push(remove_rule(&previous.install_path));
    }
  }

  rules
}

/// A rule that records `unit` in `ledger`.
pub fn record_rule(ledger: &InstalledStateLedger, unit: &dyn InstallUnit) -> Rule {
  let ledger = ledger.clone();
  let name = unit.name().to_string();
  let entry = LedgerEntry::new(unit.fingerprint().clone(), unit.install_path()).with_metadata(unit.metadata());

  ActionRule::new("record_installed_unit", move || {
    ledger.record(&name, entry.clone())?;
    Ok(())
  })
  .args([unit.name().to_string(), unit.fingerprint().to_string()])
  .into()
}

/// A rule that removes an installation directory if present.
pub fn remove_rule(path: &Path) -> Rule {
  let path = path.to_path_buf();
  let shown = path.display().to_string();
  ActionRule::new("remove_installation", move || {
    remove_installation(&path)?;
    Ok(())
  })
  .args([shown])
  .into()
}

/// Remove `path` recursively; a missing path is not an error.
pub fn remove_installation(path: &Path) -> io::Result<()> {
  match fs::remove_dir_all(path) {
    Ok(()) => {
      debug!(path = %path.display(), "installation removed");
      Ok(())
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}
