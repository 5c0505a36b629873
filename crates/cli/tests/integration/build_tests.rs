//! Build command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn build_installs_and_records() {
  let env = TestEnv::from_fixture("hello.yaml");

  env
    .br_cmd("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Unit hello not installed. Starting installation."))
    .stdout(predicate::str::contains("Build complete!"));

  let ledger = env.ledger();
  let install = ledger["units"]["hello"]["install_path"].as_str().unwrap();
  assert!(std::path::Path::new(install).join("bin/hello").exists());
  assert_eq!(ledger["units"]["hello"]["version"].as_str(), Some("1.0"));
}

#[test]
fn build_is_idempotent() {
  let env = TestEnv::from_fixture("hello.yaml");

  env.br_cmd("build").assert().success();
  let before = std::fs::read(env.ledger_path()).unwrap();

  env
    .br_cmd("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Unit hello is already installed. Skipping installation."))
    .stdout(predicate::str::contains("Rules with effects: 0"))
    .stdout(predicate::str::contains("Running ").not());

  assert_eq!(std::fs::read(env.ledger_path()).unwrap(), before);
}

#[test]
fn dry_run_leaves_no_trace() {
  let env = TestEnv::from_fixture("hello.yaml");

  env
    .br_cmd("build")
    .arg("--dry-run")
    .assert()
    .success()
    .stdout(predicate::str::contains("Running ProcessRule"))
    .stdout(predicate::str::contains("Dry run complete"));

  assert!(!env.install_tree().exists());
}

#[test]
fn failing_rule_exits_one_and_keeps_earlier_units() {
  let env = TestEnv::from_fixture("failing.yaml");

  env
    .br_cmd("build")
    .assert()
    .code(1)
    .stdout(predicate::str::contains("about to fail"))
    .stdout(predicate::str::contains("Encountered an error while executing rule"))
    .stderr(predicate::str::contains("Build failed"));

  let ledger = env.ledger();
  assert!(ledger["units"].get("first").is_some());
  assert!(ledger["units"].get("broken").is_none());
}

#[test]
fn schema_violation_exits_one_before_any_rule() {
  let env = TestEnv::from_fixture("missing_version.yaml");

  env
    .br_cmd("build")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("'version' is a required property"))
    .stdout(predicate::str::contains("Running").not());

  assert!(!env.install_tree().exists());
}

#[test]
fn unknown_deployment_method_exits_one() {
  let env = TestEnv::from_fixture("hello.yaml");
  env.write_file("deployment_config.yaml", "- method: carrier-pigeon\n");

  env
    .br_cmd("build")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("unknown deployment method 'carrier-pigeon'"));

  assert!(!env.install_tree().exists());
}
