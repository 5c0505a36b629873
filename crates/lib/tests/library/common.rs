//! Shared helpers for library integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use buildrules_lib::execute::Builder;
use buildrules_lib::target;
use tempfile::TempDir;

/// A configuration folder and an install tree, both inside one temp dir.
pub struct Fixture {
  pub temp: TempDir,
}

impl Fixture {
  pub fn new() -> Self {
    let fixture = Self {
      temp: TempDir::new().unwrap(),
    };
    fs::create_dir_all(fixture.config_dir()).unwrap();
    fixture
  }

  pub fn config_dir(&self) -> PathBuf {
    self.temp.path().join("config")
  }

  pub fn install_tree(&self) -> PathBuf {
    self.temp.path().join("software")
  }

  pub fn ledger_path(&self) -> PathBuf {
    self.install_tree().join("installed_units.yml")
  }

  /// Write `config.yaml` pointing at this fixture's install tree.
  pub fn write_config(&self, remove_after_update: bool) {
    self.write(
      "config.yaml",
      &format!(
        "config:\n  install_tree: {}\n  remove_after_update: {}\n",
        self.install_tree().display(),
        remove_after_update
      ),
    );
  }

  pub fn write(&self, name: &str, content: &str) {
    fs::write(self.config_dir().join(name), content).unwrap();
  }

  pub fn scripts_builder(&self) -> Builder {
    Builder::new(target::lookup("scripts").unwrap(), &self.config_dir()).unwrap()
  }

  /// Install directories currently present for `unit` at `version`.
  pub fn installs(&self, unit: &str, version: &str) -> Vec<PathBuf> {
    let dir = self.install_tree().join(unit).join(version);
    let mut found: Vec<PathBuf> = match fs::read_dir(&dir) {
      Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
      Err(_) => Vec::new(),
    };
    found.sort();
    found
  }
}

pub fn read(path: &Path) -> String {
  fs::read_to_string(path).unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e))
}
