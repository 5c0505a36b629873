//! Object-store deployer: upload an installation tree to an OpenStack Swift
//! container.
//!
//! Authentication uses Keystone v3 password credentials read from an auths
//! file keyed by target host:
//!
//! ```yaml
//! auths:
//!   object.example.org:
//!     username: deployer
//!     password: secret
//!     project_name: software
//!     auth_url: https://keystone.example.org:5000/v3
//! ```
//!
//! The auths file is loaded and validated when the deployer is selected. The
//! credentials for the target host are looked up when the upload rule runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{DeployError, object_schema};
use crate::config::{ConfigStore, Schema, SchemaType, ValidationError};
use crate::rule::{ActionRule, Rule};
use crate::util::paths::expand_tilde;

const DEFAULT_AUTHS_FILE: &str = "~/os_auths.yaml";
const DEFAULT_DOMAIN: &str = "Default";

/// Configuration of one object-store deployment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectStoreConfig {
  pub target_host: String,

  pub dest_container: String,

  /// Directory to upload.
  pub source: String,

  /// Replaces the `source` prefix of every object name.
  #[serde(default)]
  pub source_replacement: Option<String>,

  #[serde(default = "default_auths_file")]
  pub auths_file: String,
}

fn default_auths_file() -> String {
  DEFAULT_AUTHS_FILE.to_string()
}

/// Keystone v3 password credentials for one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
  pub username: String,
  pub password: String,
  pub project_name: String,
  pub auth_url: String,
}

pub(crate) fn schema() -> Schema {
  object_schema(
    &[
      ("method", SchemaType::String),
      ("target_host", SchemaType::String),
      ("dest_container", SchemaType::String),
      ("source", SchemaType::String),
      ("source_replacement", SchemaType::String),
      ("auths_file", SchemaType::String),
    ],
    &["method", "target_host", "dest_container", "source"],
  )
}

/// Schema of the auths file.
pub fn auths_schema() -> Schema {
  let host = object_schema(
    &[
      ("username", SchemaType::String),
      ("password", SchemaType::String),
      ("project_name", SchemaType::String),
      ("auth_url", SchemaType::String),
    ],
    &["username", "password", "project_name", "auth_url"],
  )
  .closed();

  Schema::of_any(&[SchemaType::Object, SchemaType::Null])
    .property("auths", Schema::of(SchemaType::Object).additional(host))
}

/// Load credentials by host. A missing file means no credentials.
pub fn load_auths(path: &Path) -> Result<BTreeMap<String, Credentials>, DeployError> {
  if !path.is_file() {
    debug!(path = %path.display(), "no auths file");
    return Ok(BTreeMap::new());
  }

  let store = ConfigStore::load_files(&[path.to_path_buf()], &[auths_schema()])?;
  let name = path
    .file_stem()
    .map(|s| s.to_string_lossy().to_string())
    .unwrap_or_default();
  let auths = match store.get(&name)?.get("auths") {
    Some(auths) => auths.clone(),
    None => return Ok(BTreeMap::new()),
  };

  let auths = serde_json::from_value(auths).map_err(|e| ValidationError::new(name, "/auths", e.to_string()))?;
  Ok(auths)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreDeployer {
  config: ObjectStoreConfig,
  auths: BTreeMap<String, Credentials>,
}

impl ObjectStoreDeployer {
  /// Create a deployer, loading credentials from its auths file.
  pub fn new(config: ObjectStoreConfig) -> Result<Self, DeployError> {
    let auths = load_auths(&expand_tilde(&config.auths_file))?;
    Ok(Self::with_auths(config, auths))
  }

  pub fn with_auths(config: ObjectStoreConfig, auths: BTreeMap<String, Credentials>) -> Self {
    Self { config, auths }
  }

  pub fn config(&self) -> &ObjectStoreConfig {
    &self.config
  }

  pub fn rules(&self) -> Vec<Rule> {
    let config = self.config.clone();
    let credentials = self.auths.get(&config.target_host).cloned();
    let args = [config.source.clone(), config.dest_container.clone()];

    let rule: Rule = ActionRule::new_async("upload_to_object_store", move || {
      let config = config.clone();
      let credentials = credentials.clone();
      async move {
        let credentials =
          credentials.ok_or_else(|| anyhow!("no credentials for object-store host '{}'", config.target_host))?;
        upload(&config, &credentials).await?;
        Ok::<(), anyhow::Error>(())
      }
    })
    .args(args)
    .into();

    vec![Rule::log("Deploying software with object-store deployer:"), rule]
  }
}

/// One object to create: a file, or a marker for an empty directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadObject {
  pub name: String,
  /// `None` for a directory marker.
  pub path: Option<PathBuf>,
}

/// Every object under `source`, named by path with the `source` prefix
/// replaced once by `replacement`.
pub fn collect_objects(source: &str, replacement: Option<&str>) -> anyhow::Result<Vec<UploadObject>> {
  let mut objects = Vec::new();
  for entry in WalkDir::new(source).sort_by_file_name() {
    let entry = entry.with_context(|| format!("failed to walk {}", source))?;
    let path = entry.path();

    let is_marker = if entry.file_type().is_dir() {
      fs::read_dir(path)
        .with_context(|| format!("failed to read directory {}", path.display()))?
        .next()
        .is_none()
    } else {
      false
    };
    if !is_marker && entry.file_type().is_dir() {
      continue;
    }

    let raw = path.display().to_string();
    let name = match replacement {
      Some(replacement) => raw.replacen(source, replacement, 1),
      None => raw,
    };
    objects.push(UploadObject {
      name,
      path: if is_marker { None } else { Some(path.to_path_buf()) },
    });
  }
  Ok(objects)
}

/// An authenticated object-store session.
#[derive(Debug, Clone)]
pub struct Session {
  pub token: String,
  pub endpoint: Url,
}

#[derive(Deserialize)]
struct TokenResponse {
  token: Token,
}

#[derive(Deserialize)]
struct Token {
  #[serde(default)]
  catalog: Vec<CatalogService>,
}

#[derive(Deserialize)]
struct CatalogService {
  #[serde(rename = "type")]
  kind: String,
  #[serde(default)]
  endpoints: Vec<CatalogEndpoint>,
}

#[derive(Deserialize)]
struct CatalogEndpoint {
  interface: String,
  url: String,
}

/// Authenticate with Keystone v3 and resolve the public object-store endpoint.
pub async fn authenticate(client: &Client, credentials: &Credentials) -> anyhow::Result<Session> {
  let url = format!("{}/auth/tokens", credentials.auth_url.trim_end_matches('/'));
  let body = json!({
    "auth": {
      "identity": {
        "methods": ["password"],
        "password": {
          "user": {
            "name": credentials.username,
            "domain": {"name": DEFAULT_DOMAIN},
            "password": credentials.password
          }
        }
      },
      "scope": {
        "project": {
          "name": credentials.project_name,
          "domain": {"name": DEFAULT_DOMAIN}
        }
      }
    }
  });

  debug!(url = %url, user = %credentials.username, "requesting token");
  let response = client
    .post(&url)
    .json(&body)
    .send()
    .await
    .with_context(|| format!("authentication request to {} failed", url))?;

  let status = response.status();
  if !status.is_success() {
    bail!("authentication against {} failed: HTTP {}", url, status);
  }

  let token = response
    .headers()
    .get("X-Subject-Token")
    .and_then(|v| v.to_str().ok())
    .map(str::to_string)
    .ok_or_else(|| anyhow!("authentication response from {} carried no token", url))?;

  let parsed: TokenResponse = response.json().await.context("invalid token response")?;
  let endpoint = parsed
    .token
    .catalog
    .iter()
    .filter(|service| service.kind == "object-store")
    .flat_map(|service| service.endpoints.iter())
    .find(|endpoint| endpoint.interface == "public")
    .ok_or_else(|| anyhow!("no public object-store endpoint in service catalog"))?;

  let endpoint = Url::parse(&endpoint.url).with_context(|| format!("invalid endpoint URL {}", endpoint.url))?;
  Ok(Session { token, endpoint })
}

/// URL of `object` (or of the container itself when `object` is `None`).
fn object_url(endpoint: &Url, container: &str, object: Option<&str>) -> anyhow::Result<Url> {
  let mut url = endpoint.clone();
  {
    let mut segments = url
      .path_segments_mut()
      .map_err(|_| anyhow!("endpoint {} cannot hold a path", endpoint))?;
    segments.pop_if_empty().push(container);
    if let Some(object) = object {
      segments.extend(object_name(object).split('/'));
    }
  }
  Ok(url)
}

/// Object names never start with `/` or `./`.
fn object_name(name: &str) -> &str {
  let name = name.strip_prefix("./").unwrap_or(name);
  name.trim_start_matches('/')
}

async fn put(client: &Client, session: &Session, url: Url, body: Vec<u8>, directory: bool) -> anyhow::Result<()> {
  let mut request = client.put(url.clone()).header("X-Auth-Token", &session.token).body(body);
  if directory {
    request = request.header("Content-Type", "application/directory");
  }
  let response = request
    .send()
    .await
    .with_context(|| format!("request to {} failed", url))?;
  let status = response.status();
  if !status.is_success() {
    bail!("PUT {} failed: HTTP {}", url, status);
  }
  Ok(())
}

/// Upload the configured tree. Returns the number of objects created.
pub async fn upload(config: &ObjectStoreConfig, credentials: &Credentials) -> anyhow::Result<usize> {
  let client = Client::new();
  let session = authenticate(&client, credentials).await?;
  let container = &config.dest_container;

  info!(container = %container, "creating container");
  put(&client, &session, object_url(&session.endpoint, container, None)?, Vec::new(), false).await?;

  let objects = collect_objects(&config.source, config.source_replacement.as_deref())?;
  info!(container = %container, objects = objects.len(), "uploading objects");

  for object in &objects {
    let url = object_url(&session.endpoint, container, Some(&object.name))?;
    match &object.path {
      Some(path) => {
        let body = tokio::fs::read(path)
          .await
          .with_context(|| format!("failed to read {}", path.display()))?;
        info!(object = %object.name, "uploading object");
        put(&client, &session, url, body, false).await?;
      }
      None => {
        info!(object = %object.name, "creating directory marker");
        put(&client, &session, url, Vec::new(), true).await?;
      }
    }
  }

  Ok(objects.len())
}
