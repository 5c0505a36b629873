use std::fs;

use buildrules_lib::execute::{BuildError, Builder};
use buildrules_lib::ledger::InstalledStateLedger;
use buildrules_lib::rule::RuleKind;
use buildrules_lib::target;
use serde_json::Value;

use super::common::{Fixture, read};

const HELLO: &str = r#"units:
  - name: hello
    version: "1.0"
    commands:
      - mkdir -p $PREFIX/bin
      - printf '#!/bin/sh\necho hello\n' > $PREFIX/bin/hello
      - chmod +x $PREFIX/bin/hello
"#;

const HELLO_V2: &str = r#"units:
  - name: hello
    version: "1.0"
    commands:
      - mkdir -p $PREFIX/bin
      - printf '#!/bin/sh\necho hello again\n' > $PREFIX/bin/hello
      - chmod +x $PREFIX/bin/hello
    update_commands:
      - test -x $PREVIOUS_PREFIX/bin/hello
      - echo seeded > $PREFIX/seed.txt
"#;

fn only_logs(builder: &Builder) -> bool {
  builder.rules().unwrap().iter().all(|r| matches!(r.kind(), RuleKind::Log(_)))
}

#[tokio::test]
async fn fresh_install_records_ledger_and_exports_unit() {
  let fixture = Fixture::new();
  fixture.write_config(false);
  fixture.write("build_config.yaml", HELLO);

  fixture.scripts_builder().build(false).await.unwrap();

  let installs = fixture.installs("hello", "1.0");
  assert_eq!(installs.len(), 1);
  let install = &installs[0];
  assert!(install.join("bin/hello").exists());
  assert!(read(&install.join("unit.yml")).contains("name: hello"));

  let entry = InstalledStateLedger::new(fixture.ledger_path()).entry("hello").unwrap().unwrap();
  assert_eq!(&entry.install_path, install);
  assert_eq!(entry.metadata["version"], Value::String("1.0".to_string()));
  assert!(install.ends_with(entry.checksum.short()));
}

#[tokio::test]
async fn second_run_only_skips() {
  let fixture = Fixture::new();
  fixture.write_config(false);
  fixture.write("build_config.yaml", HELLO);

  fixture.scripts_builder().build(false).await.unwrap();
  let ledger_before = fs::read(fixture.ledger_path()).unwrap();

  let builder = fixture.scripts_builder();
  let rules = builder.rules().unwrap();
  assert_eq!(rules.len(), 1);
  assert_eq!(
    rules[0].description(),
    r#"LogRule: "Unit hello is already installed. Skipping installation.""#
  );

  let summary = builder.build(false).await.unwrap();
  assert_eq!(summary.effects(), 0);
  assert_eq!(fs::read(fixture.ledger_path()).unwrap(), ledger_before);
}

#[tokio::test]
async fn changed_configuration_updates() {
  let fixture = Fixture::new();
  fixture.write_config(true);
  fixture.write("build_config.yaml", HELLO);
  fixture.scripts_builder().build(false).await.unwrap();

  let ledger = InstalledStateLedger::new(fixture.ledger_path());
  let first = ledger.entry("hello").unwrap().unwrap();

  fixture.write("build_config.yaml", HELLO_V2);
  let builder = fixture.scripts_builder();
  let rules = builder.rules().unwrap();
  assert_eq!(
    rules[0].description(),
    r#"LogRule: "Unit hello installed but marked for update.""#
  );
  builder.build(false).await.unwrap();

  let second = ledger.entry("hello").unwrap().unwrap();
  assert_ne!(first.checksum, second.checksum);
  assert!(second.install_path.join("seed.txt").exists());
  assert!(!first.install_path.exists());
  assert_eq!(fixture.installs("hello", "1.0"), vec![second.install_path.clone()]);

  assert!(only_logs(&fixture.scripts_builder()));
}

#[tokio::test]
async fn update_only_toggle_does_not_rebuild() {
  let fixture = Fixture::new();
  fixture.write_config(false);
  fixture.write("build_config.yaml", HELLO);
  fixture.scripts_builder().build(false).await.unwrap();

  fixture.write(
    "build_config.yaml",
    &format!("{}    remove_after_update: true\n", HELLO),
  );

  assert!(only_logs(&fixture.scripts_builder()));
}

#[tokio::test]
async fn dry_run_changes_nothing() {
  let fixture = Fixture::new();
  fixture.write_config(false);
  fixture.write("build_config.yaml", HELLO);

  let summary = fixture.scripts_builder().build(true).await.unwrap();

  assert!(summary.dry_run);
  assert_eq!(summary.effects(), 0);
  assert!(!fixture.install_tree().exists());
}

#[tokio::test]
async fn failing_unit_leaves_earlier_units_recorded() {
  let fixture = Fixture::new();
  fixture.write_config(false);
  fixture.write(
    "build_config.yaml",
    r#"units:
  - name: good
    version: "1"
    commands: ["true"]
  - name: bad
    version: "1"
    commands: ["exit 7"]
  - name: never
    version: "1"
    commands: ["true"]
"#,
  );

  let err = fixture.scripts_builder().build(false).await.unwrap_err();
  match err {
    BuildError::Rule(rule) => assert_eq!(rule.exit_code(), Some(7)),
    other => panic!("unexpected error: {}", other),
  }

  let state = InstalledStateLedger::new(fixture.ledger_path()).load().unwrap();
  assert!(state.get("good").is_some());
  assert!(state.get("bad").is_none());
  assert!(state.get("never").is_none());
  assert!(fixture.installs("never", "1").is_empty());
}

#[test]
fn schema_violation_builds_no_rules() {
  let fixture = Fixture::new();
  fixture.write_config(false);
  fixture.write("build_config.yaml", "units:\n  - name: hello\n    commands: []\n");

  let result = Builder::new(target::lookup("scripts").unwrap(), &fixture.config_dir());

  let err = result.err().expect("configuration should be rejected");
  assert!(err.to_string().contains("'version' is a required property"));
  assert!(!fixture.install_tree().exists());
}

#[test]
fn missing_configuration_file() {
  let fixture = Fixture::new();
  fixture.write("build_config.yaml", HELLO);

  let result = Builder::new(target::lookup("scripts").unwrap(), &fixture.config_dir());
  assert!(result.err().unwrap().to_string().contains("config.yaml"));
}
