//! Types for configuration loading.

use std::io;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// A named, validated configuration tree loaded from one source.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
  /// Document name, the file stem of its source.
  pub name: String,

  /// File the document was read from, if any.
  pub source: Option<PathBuf>,

  pub value: Value,
}

impl ConfigDocument {
  /// Look up a top-level key of an object document.
  pub fn get(&self, key: &str) -> Option<&Value> {
    self.value.get(key)
  }
}

/// A configuration value that does not satisfy its schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed for '{document}' at {path}: {message}")]
pub struct ValidationError {
  pub document: String,
  pub path: String,
  pub message: String,
}

impl ValidationError {
  pub fn new(document: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      document: document.into(),
      path: path.into(),
      message: message.into(),
    }
  }
}

/// Errors that can occur while loading or reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// Failed to read a configuration file.
  #[error("failed to read configuration file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// A configuration file is not valid YAML.
  #[error("failed to parse configuration file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  /// A document violated its schema.
  #[error(transparent)]
  Validation(#[from] ValidationError),

  /// No document with this name was loaded.
  #[error("configuration '{0}' not found")]
  Missing(String),
}
