//! Installed-state ledger.
//!
//! The ledger records, for every installed logical unit, the fingerprint of
//! the configuration it was installed from and where it was installed. It is
//! the only persisted input to the skip/update/install decision.
//!
//! # Storage Layout
//!
//! ```text
//! <install root>/
//! └── installed_units.yml
//! ```
//!
//! # Example Ledger File
//!
//! ```yaml
//! units:
//!   cmake:
//!     checksum: 5f2b...e1
//!     install_path: /opt/software/cmake/3.27/5f2b09c4
//!     version: "3.27"
//! ```
//!
//! The file is read fresh on every access and rewritten atomically (temp file,
//! then rename) each time a unit completes. Entries whose install path has
//! disappeared are pruned when read and dropped on the next write.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::LEDGER_FILENAME;
use crate::util::hash::Fingerprint;

/// The recorded state of one installed unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
  pub checksum: Fingerprint,

  pub install_path: PathBuf,

  /// Producer-specific fields stored alongside the fingerprint.
  #[serde(flatten)]
  pub metadata: BTreeMap<String, Value>,
}

impl LedgerEntry {
  pub fn new(checksum: Fingerprint, install_path: impl Into<PathBuf>) -> Self {
    Self {
      checksum,
      install_path: install_path.into(),
      metadata: BTreeMap::new(),
    }
  }

  pub fn with_metadata(mut self, metadata: BTreeMap<String, Value>) -> Self {
    self.metadata = metadata;
    self
  }
}

/// Every unit recorded in one ledger file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
  #[serde(default)]
  pub units: BTreeMap<String, LedgerEntry>,
}

impl LedgerState {
  pub fn get(&self, unit: &str) -> Option<&LedgerEntry> {
    self.units.get(unit)
  }

  pub fn len(&self) -> usize {
    self.units.len()
  }

  pub fn is_empty(&self) -> bool {
    self.units.is_empty()
  }
}

/// Errors that can occur when reading or writing the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
  #[error("failed to read ledger {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse ledger {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("failed to serialize ledger: {0}")]
  Serialize(#[source] serde_yaml::Error),

  #[error("failed to write ledger {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Handle to a ledger file. Holds no state of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledStateLedger {
  path: PathBuf,
}

impl InstalledStateLedger {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// The ledger colocated with an installation root.
  pub fn at_install_root(root: &Path) -> Self {
    Self::new(root.join(LEDGER_FILENAME))
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Read the ledger, pruning entries whose install path no longer exists.
  ///
  /// A missing or empty file is an empty ledger.
  pub fn load(&self) -> Result<LedgerState, LedgerError> {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %self.path.display(), "ledger not found, starting empty");
        return Ok(LedgerState::default());
      }
      Err(source) => {
        return Err(LedgerError::Read {
          path: self.path.clone(),
          source,
        });
      }
    };

    if content.trim().is_empty() {
      return Ok(LedgerState::default());
    }

    let mut state: LedgerState = serde_yaml::from_str(&content).map_err(|source| LedgerError::Parse {
      path: self.path.clone(),
      source,
    })?;

    let before = state.len();
    state.units.retain(|unit, entry| {
      let present = entry.install_path.exists();
      if !present {
        info!(unit = %unit, path = %entry.install_path.display(), "pruning ledger entry for missing installation");
      }
      present
    });
    debug!(units = state.len(), pruned = before - state.len(), "ledger loaded");

    Ok(state)
  }

  pub fn entry(&self, unit: &str) -> Result<Option<LedgerEntry>, LedgerError> {
    Ok(self.load()?.units.remove(unit))
  }

  /// Record `entry` for `unit`, replacing any previous entry.
  pub fn record(&self, unit: &str, entry: LedgerEntry) -> Result<(), LedgerError> {
    let mut state = self.load()?;
    info!(unit = %unit, checksum = %entry.checksum, "recording unit in ledger");
    state.units.insert(unit.to_string(), entry);
    self.write(&state)
  }

  fn write(&self, state: &LedgerState) -> Result<(), LedgerError> {
    let write_err = |source| LedgerError::Write {
      path: self.path.clone(),
      source,
    };

    if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(dir).map_err(write_err)?;
    }

    let content = serde_yaml::to_string(state).map_err(LedgerError::Serialize)?;

    let mut temp_name = self.path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    fs::write(&temp_path, content).map_err(write_err)?;
    fs::rename(&temp_path, &self.path).map_err(write_err)?;

    debug!(path = %self.path.display(), units = state.len(), "ledger written");
    Ok(())
  }
}
