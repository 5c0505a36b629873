//! Post-build deployment strategies.
//!
//! `deployment_config.yaml` is a list of entries, each tagged with a `method`.
//! The whole list is checked against a shared schema, then every entry is
//! checked against its method's own schema and turned into a [`Deployer`].
//! All of this happens before any rule runs. Deployer rules are appended
//! after the build rules, in configuration order.

pub mod object_store;
pub mod sync;

pub use object_store::{Credentials, ObjectStoreConfig, ObjectStoreDeployer};
pub use sync::{SyncConfig, SyncDeployer};

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, ConfigStore, Schema, SchemaType, TypeSpec, ValidationError};
use crate::rule::Rule;

const DOCUMENT: &str = "deployment_config";

/// Errors that can occur while selecting deployers.
#[derive(Debug, Error)]
pub enum DeployError {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  /// The credentials file of an object-store deployer could not be loaded.
  #[error("failed to load credentials: {0}")]
  Auths(#[from] ConfigError),
}

/// A selected deployment strategy.
#[derive(Debug, Clone)]
pub enum Deployer {
  Sync(SyncDeployer),
  ObjectStore(ObjectStoreDeployer),
}

impl Deployer {
  pub fn method(&self) -> &'static str {
    match self {
      Deployer::Sync(_) => "sync",
      Deployer::ObjectStore(_) => "object-store",
    }
  }

  pub fn rules(&self) -> Vec<Rule> {
    match self {
      Deployer::Sync(d) => d.rules(),
      Deployer::ObjectStore(d) => d.rules(),
    }
  }
}

/// Shared schema of the deployment document: a list of objects, each with a
/// string `method`. A null document (an empty file) means no deployers.
pub fn deployment_schema() -> Schema {
  Schema {
    kind: Some(TypeSpec::Any(vec![SchemaType::Array, SchemaType::Null])),
    items: Some(Box::new(object_schema(&[("method", SchemaType::String)], &["method"]))),
    ..Schema::default()
  }
}

/// Build an object schema from typed properties and required keys.
pub(crate) fn object_schema(properties: &[(&str, SchemaType)], required: &[&str]) -> Schema {
  properties
    .iter()
    .fold(Schema::of(SchemaType::Object), |schema, (name, kind)| {
      schema.property(*name, Schema::of(*kind))
    })
    .require(required)
}

/// Select the deployer for one entry.
///
/// `sync` (alias `rsync`) and `object-store` (alias `swift`) are recognized.
pub fn select(spec: &Value) -> Result<Deployer, DeployError> {
  let method = spec
    .get("method")
    .and_then(Value::as_str)
    .ok_or_else(|| ValidationError::new(DOCUMENT, "/", "'method' is a required string property"))?;

  let deployer = match method {
    "sync" | "rsync" => Deployer::Sync(SyncDeployer::new(parse(spec, &sync::schema())?)),
    "object-store" | "swift" => Deployer::ObjectStore(ObjectStoreDeployer::new(parse(spec, &object_store::schema())?)?),
    other => {
      return Err(ValidationError::new(DOCUMENT, "/method", format!("unknown deployment method '{}'", other)).into());
    }
  };

  info!(method = deployer.method(), "deployer selected");
  Ok(deployer)
}

/// Select deployers for every entry of a deployment document, in order.
pub fn select_all(document: &Value) -> Result<Vec<Deployer>, DeployError> {
  ConfigStore::validate_value(DOCUMENT, document, &deployment_schema())?;
  match document {
    Value::Array(specs) => specs.iter().map(select).collect(),
    _ => Ok(Vec::new()),
  }
}

fn parse<T: DeserializeOwned>(spec: &Value, schema: &Schema) -> Result<T, ValidationError> {
  ConfigStore::validate_value(DOCUMENT, spec, schema)?;
  serde_json::from_value(spec.clone()).map_err(|e| ValidationError::new(DOCUMENT, "/", e.to_string()))
}
