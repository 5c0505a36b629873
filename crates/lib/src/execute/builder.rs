//! Assembling a build from a target and its configuration folder.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use super::{BuildError, Executor, RunSummary};
use crate::config::ConfigStore;
use crate::consts::DEPLOYMENT_CONFIG;
use crate::deploy::{self, Deployer};
use crate::rule::Rule;
use crate::target::Target;

/// A target bound to a validated configuration and its deployers.
///
/// Construction loads and validates every document and resolves every
/// deployer, so a `Builder` only exists once the configuration is known to
/// be good. Rules are produced on demand from the live ledger state.
pub struct Builder {
  target: Box<dyn Target>,
  config_files: Vec<PathBuf>,
  store: ConfigStore,
  deployers: Vec<Deployer>,
  executor: Executor,
}

impl Builder {
  /// Load the target's documents (plus `deployment_config.yaml` when present)
  /// from `folder`, validate them and select deployers.
  pub fn new(target: Box<dyn Target>, folder: &Path) -> Result<Self, BuildError> {
    if !folder.is_dir() {
      return Err(BuildError::NotADirectory(folder.to_path_buf()));
    }

    let mut config_files = Vec::new();
    let mut schemas = Vec::new();
    for (file, schema) in target.documents() {
      config_files.push(folder.join(file));
      schemas.push(schema);
    }

    let deployment_file = folder.join(DEPLOYMENT_CONFIG);
    if deployment_file.is_file() {
      config_files.push(deployment_file);
      schemas.push(deploy::deployment_schema());
    } else {
      debug!(folder = %folder.display(), "no deployment configuration");
    }

    let store = ConfigStore::load_files(&config_files, &schemas)?;
    let deployers = deploy::select_all(store.get_or(deployment_name(), &Value::Null))?;

    info!(
      target = target.name(),
      documents = store.len(),
      deployers = deployers.len(),
      "builder ready"
    );

    Ok(Self {
      target,
      config_files,
      store,
      deployers,
      executor: Executor::new(),
    })
  }

  pub fn with_executor(mut self, executor: Executor) -> Self {
    self.executor = executor;
    self
  }

  pub fn store(&self) -> &ConfigStore {
    &self.store
  }

  pub fn deployers(&self) -> &[Deployer] {
    &self.deployers
  }

  /// The target's rules.
  pub fn build_rules(&self) -> Result<Vec<Rule>, BuildError> {
    Ok(self.target.rules(&self.store)?)
  }

  /// Rules contributed by every deployer, in configuration order.
  pub fn deploy_rules(&self) -> Vec<Rule> {
    self.deployers.iter().flat_map(Deployer::rules).collect()
  }

  /// The full plan: build rules followed by deployment rules.
  pub fn rules(&self) -> Result<Vec<Rule>, BuildError> {
    let mut rules = self.build_rules()?;
    rules.extend(self.deploy_rules());
    Ok(rules)
  }

  /// Run the full plan.
  pub async fn build(&self, dry_run: bool) -> Result<RunSummary, BuildError> {
    let rules = self.rules()?;
    info!(target = self.target.name(), rules = rules.len(), dry_run, "starting build");
    Ok(self.executor.run(&rules, dry_run).await?)
  }

  /// Log what this builder would do and return every rule description.
  pub fn describe(&self) -> Result<Vec<String>, BuildError> {
    let build = self.executor.describe(&self.build_rules()?);
    let deployment = self.executor.describe(&self.deploy_rules());

    info!("Builder: {}", self.target.name());
    info!("Configuration files:");
    for file in &self.config_files {
      info!("    {}", file.display());
    }
    debug!("{}", self.store);
    info!("Build rule descriptions:");
    for description in &build {
      info!("    {}", description);
    }
    info!("Deployment descriptions:");
    for description in &deployment {
      info!("    {}", description);
    }

    Ok(build.into_iter().chain(deployment).collect())
  }
}

/// Document name of the deployment configuration, its file stem.
fn deployment_name() -> &'static str {
  DEPLOYMENT_CONFIG
    .rsplit_once('.')
    .map(|(stem, _)| stem)
    .unwrap_or(DEPLOYMENT_CONFIG)
}
