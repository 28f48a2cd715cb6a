//! Targets command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn targets_lists_main_targets() {
  let env = TestEnv::from_fixture("basic.yaml");

  env
    .anvil_cmd()
    .arg("targets")
    .assert()
    .success()
    .stdout(predicate::str::contains("Build the fixture"))
    .stdout(predicate::str::contains("Default target: build"))
    .stdout(predicate::str::contains("Other targets").not());
}

#[test]
fn verbose_targets_include_other_targets() {
  let env = TestEnv::from_fixture("basic.yaml");

  env
    .anvil_cmd()
    .args(["-v", "targets"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Other targets:"))
    .stdout(predicate::str::contains("  init"));
}

#[test]
fn targets_json_includes_types() {
  let env = TestEnv::from_fixture("basic.yaml");

  let output = env.anvil_cmd().args(["targets", "--json", "--types"]).output().unwrap();
  assert!(output.status.success());

  let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(listing["default"], "build");
  assert_eq!(listing["targets"][1]["depends"], serde_json::json!(["init"]));
  let types = listing["types"].as_array().unwrap();
  assert!(types.contains(&serde_json::json!({ "role": "task", "name": "echo" })));
  assert!(types.contains(&serde_json::json!({ "role": "condition", "name": "equals" })));
}

#[test]
fn library_types_are_listed() {
  let env = TestEnv::from_fixture("basic.yaml");
  env.write_file(
    "extra.json",
    r#"{ "library": "extra", "definitions": [
      { "role": "task", "name": "say", "implementation": "anvil.tasks.Echo" }
    ] }"#,
  );

  env
    .anvil_cmd()
    .args(["targets", "--types", "--lib", "extra.json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("say"));
}
