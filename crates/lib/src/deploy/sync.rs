//! Sync deployer: mirror an installation tree with rsync.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::object_schema;
use crate::config::{Schema, SchemaType};
use crate::rule::{ProcessSpec, Rule};
use crate::util::paths::relative_to;

/// Configuration of one sync deployment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
  pub source: String,

  pub dest: String,

  /// Remote host; a local copy when absent.
  #[serde(default)]
  pub target_host: Option<String>,

  /// Directory rsync runs in. `source` is made relative to it.
  #[serde(default)]
  pub working_directory: Option<PathBuf>,

  #[serde(default)]
  pub chmod_options: Option<String>,

  #[serde(default = "default_rsync_flags")]
  pub rsync_flags: String,

  #[serde(default = "default_use_ssh")]
  pub use_ssh: bool,

  #[serde(default = "default_ssh_command")]
  pub ssh_command: String,

  #[serde(default)]
  pub delete: bool,
}

fn default_rsync_flags() -> String {
  "-surlptDxv".to_string()
}

fn default_use_ssh() -> bool {
  true
}

fn default_ssh_command() -> String {
  "ssh".to_string()
}

pub(crate) fn schema() -> Schema {
  object_schema(
    &[
      ("method", SchemaType::String),
      ("target_host", SchemaType::String),
      ("source", SchemaType::String),
      ("dest", SchemaType::String),
      ("working_directory", SchemaType::String),
      ("chmod_options", SchemaType::String),
      ("rsync_flags", SchemaType::String),
      ("use_ssh", SchemaType::Boolean),
      ("ssh_command", SchemaType::String),
      ("delete", SchemaType::Boolean),
    ],
    &["method", "source", "dest"],
  )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncDeployer {
  config: SyncConfig,
}

impl SyncDeployer {
  pub fn new(config: SyncConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &SyncConfig {
    &self.config
  }

  /// The rsync invocation, run through the shell.
  pub fn command(&self) -> ProcessSpec {
    let config = &self.config;
    let mut command = vec!["rsync".to_string()];
    command.extend(config.rsync_flags.split_whitespace().map(str::to_string));
    if let Some(chmod) = config.chmod_options.as_deref().filter(|c| !c.is_empty()) {
      command.push(format!("--chmod={}", chmod));
    }
    if config.use_ssh {
      command.push("-e".to_string());
      command.push(config.ssh_command.clone());
    }
    if config.delete {
      command.push("--delete".to_string());
    }

    let source = match &config.working_directory {
      Some(cwd) => relative_to(Path::new(&config.source), cwd).display().to_string(),
      None => config.source.clone(),
    };
    command.push(format!("\"{}/\"", source.trim_end_matches('/')));

    let dest = format!("\"{}\"", config.dest);
    command.push(match &config.target_host {
      Some(host) => format!("{}:{}", host, dest),
      None => dest,
    });

    let spec = ProcessSpec::new(command).shell(true);
    match &config.working_directory {
      Some(cwd) => spec.cwd(cwd),
      None => spec,
    }
  }

  pub fn rules(&self) -> Vec<Rule> {
    vec![
      Rule::log("Deploying software with sync deployer:"),
      Rule::process(self.command()),
    ]
  }
}
