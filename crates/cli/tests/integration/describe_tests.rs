//! Describe command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn describe_lists_files_and_rules() {
  let env = TestEnv::from_fixture("hello.yaml");

  env
    .br_cmd("describe")
    .assert()
    .success()
    .stdout(predicate::str::contains("Builder: scripts"))
    .stdout(predicate::str::contains("build_config.yaml"))
    .stdout(predicate::str::contains("Build rule descriptions:"))
    .stdout(predicate::str::contains("ProcessRule: { command: [\"mkdir -p $PREFIX/bin\"]"))
    .stdout(predicate::str::contains("Deployment descriptions:"));

  assert!(!env.install_tree().exists());
}

#[test]
fn describe_includes_deployers() {
  let env = TestEnv::from_fixture("hello.yaml");
  env.write_file(
    "deployment_config.yaml",
    "- method: sync\n  source: /opt/software\n  dest: /srv/software\n  use_ssh: false\n",
  );

  env
    .br_cmd("describe")
    .assert()
    .success()
    .stdout(predicate::str::contains("Deploying software with sync deployer:"))
    .stdout(predicate::str::contains("rsync"));
}

#[test]
fn describe_after_build_shows_skip() {
  let env = TestEnv::from_fixture("hello.yaml");
  env.br_cmd("build").assert().success();

  env
    .br_cmd("describe")
    .assert()
    .success()
    .stdout(predicate::str::contains("Unit hello is already installed. Skipping installation."));
}
