//! Configuration loading and validation.
//!
//! A [`ConfigStore`] owns every configuration document of a run. Documents
//! are paired positionally with a [`Schema`] and validated in the order they
//! were supplied; the first violation aborts the whole load, so a store
//! either exists fully validated or not at all. After construction the store
//! is read-only.

pub mod schema;
mod types;

pub use schema::{Schema, SchemaError, SchemaType, TypeSpec, Violation};
pub use types::*;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

/// An immutable, validated set of named configuration documents.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
  documents: BTreeMap<String, ConfigDocument>,
  /// Names in load order.
  order: Vec<String>,
}

impl ConfigStore {
  /// Validate in-memory documents against their positional schemas.
  ///
  /// A document without a schema at its position is paired with the empty
  /// schema and accepted as-is.
  pub fn load(documents: Vec<(String, Value)>, schemas: &[Schema]) -> Result<Self, ValidationError> {
    let documents = documents
      .into_iter()
      .map(|(name, value)| ConfigDocument {
        name,
        source: None,
        value,
      })
      .collect();
    Self::from_documents(documents, schemas)
  }

  /// Read YAML files and validate them against their positional schemas.
  ///
  /// Each document is named after its file stem, so `build_config.yaml`
  /// becomes `build_config`.
  pub fn load_files(paths: &[PathBuf], schemas: &[Schema]) -> Result<Self, ConfigError> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
      documents.push(read_document(path)?);
    }
    Ok(Self::from_documents(documents, schemas)?)
  }

  fn from_documents(documents: Vec<ConfigDocument>, schemas: &[Schema]) -> Result<Self, ValidationError> {
    let any = Schema::any();
    let mut store = ConfigStore::default();

    for (i, document) in documents.into_iter().enumerate() {
      let schema = schemas.get(i).unwrap_or(&any);
      Self::validate_value(&document.name, &document.value, schema)?;
      debug!(document = %document.name, "configuration validated");

      if !store.documents.contains_key(&document.name) {
        store.order.push(document.name.clone());
      }
      store.documents.insert(document.name.clone(), document);
    }

    info!(documents = store.order.len(), "configuration loaded");
    Ok(store)
  }

  /// Validate a value against a schema, attributing failures to `document`.
  pub fn validate_value(document: &str, value: &Value, schema: &Schema) -> Result<(), ValidationError> {
    schema
      .validate(value)
      .map_err(|v| ValidationError::new(document, v.path, v.message))
  }

  /// Get a document by name.
  pub fn get(&self, name: &str) -> Result<&ConfigDocument, ConfigError> {
    self.documents.get(name).ok_or_else(|| ConfigError::Missing(name.to_string()))
  }

  /// Get a document's value, or `default` when it was not loaded.
  pub fn get_or<'a>(&'a self, name: &str, default: &'a Value) -> &'a Value {
    self.documents.get(name).map(|d| &d.value).unwrap_or(default)
  }

  /// Document names in load order.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.order.iter().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.documents.len()
  }

  pub fn is_empty(&self) -> bool {
    self.documents.is_empty()
  }
}

impl fmt::Display for ConfigStore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "ConfigStore with {} configuration files:", self.len())?;
    for document in self.order.iter().filter_map(|name| self.documents.get(name)) {
      let source = document
        .source
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| document.name.clone());
      writeln!(f)?;
      writeln!(f, "{}:", source)?;
      let rendered = serde_yaml::to_string(&document.value).unwrap_or_default();
      for line in rendered.lines() {
        writeln!(f, "    {}", line)?;
      }
    }
    Ok(())
  }
}

/// Read one YAML file into a document named after its file stem.
fn read_document(path: &Path) -> Result<ConfigDocument, ConfigError> {
  let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  let value = if content.trim().is_empty() {
    Value::Null
  } else {
    serde_yaml::from_str::<Value>(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?
  };

  let name = path
    .file_stem()
    .map(|s| s.to_string_lossy().to_string())
    .unwrap_or_default();

  Ok(ConfigDocument {
    name,
    source: Some(path.to_path_buf()),
    value,
  })
}
