//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated test environment.
///
/// A configuration folder for the `scripts` target whose install tree lives
/// in the same temporary directory.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Create from a fixture file.
  ///
  /// Copies the fixture to `build_config.yaml` and writes a `config.yaml`
  /// pointing at an isolated install tree.
  pub fn from_fixture(name: &str) -> Self {
    let env = Self {
      temp: TempDir::new().unwrap(),
    };
    std::fs::create_dir_all(env.config_dir()).unwrap();
    env.write_file("build_config.yaml", &fixture_content(name));
    env.write_file(
      "config.yaml",
      &format!("config:\n  install_tree: {}\n", env.install_tree().display()),
    );
    env
  }

  /// Write a file into the configuration folder.
  pub fn write_file(&self, name: &str, content: &str) {
    std::fs::write(self.config_dir().join(name), content).unwrap();
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

  /// Parsed ledger, `Null` when it has not been written.
  pub fn ledger(&self) -> serde_yaml::Value {
    match std::fs::read_to_string(self.ledger_path()) {
      Ok(text) => serde_yaml::from_str(&text).unwrap(),
      Err(_) => serde_yaml::Value::Null,
    }
  }

  /// Get a Command running `br scripts <command> <config folder>`.
  pub fn br_cmd(&self, command: &str) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("br");
    cmd.arg("scripts").arg(command).arg(self.config_dir());
    cmd
  }
}
