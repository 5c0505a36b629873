//! The `scripts` target: install units by running shell commands.
//!
//! Each unit is installed into its own directory
//! `<install_tree>/<name>/<version>/<fingerprint[..8]>`. Commands run in that
//! directory with `PREFIX` pointing at it, `TMPDIR` at the build temporary
//! directory and a `PATH` restricted to the unit's `bin` and the system
//! directories of the caller's `PATH`.
//!
//! ```yaml
//! # config.yaml
//! config:
//!   install_tree: /opt/software
//!   remove_after_update: true
//!
//! # build_config.yaml
//! units:
//!   - name: hello
//!     version: "1.0"
//!     commands:
//!       - mkdir -p $PREFIX/bin
//!       - cp /usr/bin/true $PREFIX/bin/hello
//!     update_commands:
//!       - cp -r $PREVIOUS_PREFIX/share $PREFIX/
//! ```
//!
//! On update, `update_commands` run first with `PREVIOUS_PREFIX` set to the
//! previous installation, so a unit can carry state forward.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{Target, TargetError};
use crate::config::{ConfigStore, Schema, SchemaType};
use crate::gate::{self, InstallMode, InstallUnit, UpdatePolicy};
use crate::ledger::InstalledStateLedger;
use crate::rule::{ActionRule, ProcessSpec, Rule};
use crate::util::hash::Fingerprint;
use crate::util::paths::expand_tilde;

pub const NAME: &str = "scripts";

/// Exported resolved configuration, written into every installation.
pub const UNIT_FILE: &str = "unit.yml";

/// Fields that never change a unit's fingerprint.
const UPDATE_ONLY_FIELDS: &[&str] = &["remove_after_update"];

/// `config.yaml` contents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptsConfig {
  pub install_tree: String,

  /// Temporary directory for builds; `<install_tree>/tmp` when unset.
  #[serde(default)]
  pub tmpdir: Option<String>,

  #[serde(default)]
  pub remove_after_update: bool,
}

impl ScriptsConfig {
  pub fn install_tree(&self) -> PathBuf {
    expand_tilde(&self.install_tree)
  }

  pub fn tmpdir(&self) -> PathBuf {
    match &self.tmpdir {
      Some(tmpdir) => expand_tilde(tmpdir),
      None => self.install_tree().join("tmp"),
    }
  }
}

/// One unit of `build_config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitConfig {
  pub name: String,

  pub version: String,

  #[serde(default)]
  pub commands: Vec<String>,

  /// Run before `commands` when replacing an earlier installation.
  #[serde(default)]
  pub update_commands: Vec<String>,

  #[serde(default)]
  pub env: BTreeMap<String, String>,

  /// Overrides the global setting for this unit.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub remove_after_update: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct BuildConfig {
  #[serde(default)]
  units: Vec<UnitConfig>,
}

fn config_schema() -> Schema {
  let config = Schema::of(SchemaType::Object)
    .property("install_tree", Schema::of(SchemaType::String))
    .property("tmpdir", Schema::of(SchemaType::String))
    .property("remove_after_update", Schema::of(SchemaType::Boolean))
    .require(&["install_tree"])
    .closed();

  Schema::of(SchemaType::Object)
    .property("config", config)
    .require(&["config"])
    .closed()
}

fn build_config_schema() -> Schema {
  let strings = || Schema::array_of(Schema::of(SchemaType::String));
  let unit = Schema::of(SchemaType::Object)
    .property("name", Schema::of(SchemaType::String))
    .property("version", Schema::of(SchemaType::String))
    .property("commands", strings())
    .property("update_commands", strings())
    .property(
      "env",
      Schema::of(SchemaType::Object).additional(Schema::of(SchemaType::String)),
    )
    .property("remove_after_update", Schema::of(SchemaType::Boolean))
    .require(&["name", "version", "commands"])
    .closed();

  Schema::of(SchemaType::Object)
    .property("units", Schema::array_of(unit))
    .require(&["units"])
    .closed()
}

fn typed<T: serde::de::DeserializeOwned>(document: &str, value: &Value) -> Result<T, TargetError> {
  serde_json::from_value(value.clone()).map_err(|source| TargetError::Invalid {
    document: document.to_string(),
    source,
  })
}

/// A unit with defaults applied, its fingerprint and its install location.
#[derive(Debug, Clone)]
pub struct ScriptUnit {
  config: UnitConfig,
  fingerprint: Fingerprint,
  install_path: PathBuf,
  tmpdir: PathBuf,
  system_path: Vec<String>,
}

impl ScriptUnit {
  /// Resolve `unit` against the global configuration.
  pub fn resolve(mut unit: UnitConfig, global: &ScriptsConfig) -> Result<Self, TargetError> {
    unit.remove_after_update = Some(unit.remove_after_update.unwrap_or(global.remove_after_update));

    let value = serde_json::to_value(&unit).map_err(|source| TargetError::Invalid {
      document: unit.name.clone(),
      source,
    })?;
    let fingerprint = Fingerprint::of_value_excluding(&value, UPDATE_ONLY_FIELDS);
    let install_path = global
      .install_tree()
      .join(&unit.name)
      .join(&unit.version)
      .join(fingerprint.short());

    Ok(Self {
      config: unit,
      fingerprint,
      install_path,
      tmpdir: global.tmpdir(),
      system_path: system_path(env::var("PATH").unwrap_or_default().as_str()),
    })
  }

  pub fn config(&self) -> &UnitConfig {
    &self.config
  }

  pub fn policy(&self) -> UpdatePolicy {
    UpdatePolicy {
      remove_after_update: self.config.remove_after_update.unwrap_or(false),
    }
  }

  /// Environment every command of this unit runs with.
  fn base_env(&self) -> BTreeMap<String, String> {
    let bin = self.install_path.join("bin").display().to_string();
    let path = std::iter::once(bin)
      .chain(self.system_path.iter().cloned())
      .collect::<Vec<_>>()
      .join(":");

    let mut env = BTreeMap::from([
      ("PREFIX".to_string(), self.install_path.display().to_string()),
      ("TMPDIR".to_string(), self.tmpdir.display().to_string()),
      ("PATH".to_string(), path),
    ]);
    env.extend(self.config.env.clone());
    env
  }

  fn command_rule(&self, command: &str, env: &BTreeMap<String, String>) -> Rule {
    Rule::process(
      ProcessSpec::shell_line(command)
        .env(env.clone())
        .cwd(&self.install_path),
    )
  }

  fn create_dirs_rule(&self) -> Rule {
    let dirs = vec![self.install_path.clone(), self.tmpdir.clone()];
    let shown: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
    ActionRule::new("create_directories", move || {
      for dir in &dirs {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
      }
      Ok(())
    })
    .args(shown)
    .into()
  }

  fn export_rule(&self) -> Rule {
    let config = self.config.clone();
    let file = self.install_path.join(UNIT_FILE);
    let shown = file.display().to_string();
    ActionRule::new("export_unit", move || {
      let content = serde_yaml::to_string(&config)?;
      fs::write(&file, content).with_context(|| format!("failed to write {}", file.display()))?;
      Ok(())
    })
    .args([shown])
    .into()
  }
}

impl InstallUnit for ScriptUnit {
  fn name(&self) -> &str {
    &self.config.name
  }

  fn fingerprint(&self) -> &Fingerprint {
    &self.fingerprint
  }

  fn install_path(&self) -> &Path {
    &self.install_path
  }

  fn metadata(&self) -> BTreeMap<String, Value> {
    BTreeMap::from([
      ("version".to_string(), Value::String(self.config.version.clone())),
      (
        "unit_file".to_string(),
        Value::String(self.install_path.join(UNIT_FILE).display().to_string()),
      ),
    ])
  }

  fn install_rules(&self, mode: InstallMode<'_>) -> Vec<Rule> {
    let env = self.base_env();
    let mut rules = vec![gate::remove_rule(&self.install_path), self.create_dirs_rule()];

    if let InstallMode::Update(previous) = mode {
      if !self.config.update_commands.is_empty() {
        rules.push(Rule::log(format!(
          "Seeding {} from previous installation {}",
          self.config.name,
          previous.install_path.display()
        )));
        let mut seed_env = env.clone();
        seed_env.insert(
          "PREVIOUS_PREFIX".to_string(),
          previous.install_path.display().to_string(),
        );
        rules.extend(self.config.update_commands.iter().map(|c| self.command_rule(c, &seed_env)));
      }
    }

    if !self.config.commands.is_empty() {
      rules.push(Rule::log(format!("Running install commands for {}.", self.config.name)));
      rules.extend(self.config.commands.iter().map(|c| self.command_rule(c, &env)));
    }

    rules.push(Rule::log(format!("Exporting {} for {}.", UNIT_FILE, self.config.name)));
    rules.push(self.export_rule());
    rules
  }
}

/// Entries of a `PATH` value under `/usr`, `/bin` or `/sbin`.
fn system_path(path: &str) -> Vec<String> {
  path
    .split(':')
    .filter(|p| ["/usr", "/bin", "/sbin"].iter().any(|prefix| p.starts_with(prefix)))
    .map(str::to_string)
    .collect()
}

pub struct Scripts;

impl Scripts {
  /// Resolve every unit of a validated configuration.
  pub fn units(&self, store: &ConfigStore) -> Result<(ScriptsConfig, Vec<ScriptUnit>), TargetError> {
    let config = store.get("config")?;
    let global: ScriptsConfig = typed("config", config.get("config").unwrap_or(&Value::Null))?;
    let build: BuildConfig = typed("build_config", &store.get("build_config")?.value)?;

    let mut seen = BTreeSet::new();
    let mut units = Vec::with_capacity(build.units.len());
    for unit in build.units {
      if !seen.insert(unit.name.clone()) {
        return Err(TargetError::DuplicateUnit(unit.name));
      }
      units.push(ScriptUnit::resolve(unit, &global)?);
    }
    Ok((global, units))
  }
}

impl Target for Scripts {
  fn name(&self) -> &'static str {
    NAME
  }

  fn documents(&self) -> Vec<(&'static str, Schema)> {
    vec![
      ("config.yaml", config_schema()),
      ("build_config.yaml", build_config_schema()),
    ]
  }

  fn rules(&self, store: &ConfigStore) -> Result<Vec<Rule>, TargetError> {
    let (global, units) = self.units(store)?;
    let ledger = InstalledStateLedger::at_install_root(&global.install_tree());
    let state = ledger.load()?;
    debug!(ledger = %ledger.path().display(), units = units.len(), "planning units");

    Ok(
      units
        .iter()
        .flat_map(|unit| gate::plan_unit(&ledger, &state, unit, unit.policy()))
        .collect(),
    )
  }
}
