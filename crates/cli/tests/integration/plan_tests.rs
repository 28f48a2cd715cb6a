//! Plan command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn plan_lists_order_without_running() {
  let env = TestEnv::from_fixture("basic.yaml");

  env
    .anvil_cmd()
    .arg("plan")
    .assert()
    .success()
    .stdout(predicate::str::contains("1. (top-level steps)"))
    .stdout(predicate::str::contains("2. init"))
    .stdout(predicate::str::contains("3. build"));

  assert!(!env.path("out").exists(), "plan must not run steps");
}

#[test]
fn plan_json_has_order_and_waves() {
  let env = TestEnv::from_fixture("failing.yaml");

  let output = env.anvil_cmd().args(["plan", "--json", "package", "docs"]).output().unwrap();
  assert!(output.status.success());

  let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(plan["project"], "failing");
  assert_eq!(
    plan["order"],
    serde_json::json!(["clean", "build", "package", "docs"])
  );
  let waves = plan["waves"].as_array().unwrap();
  assert_eq!(waves[0], serde_json::json!(["clean", "docs"]));
}

#[test]
fn plan_reports_cycles() {
  let env = TestEnv::from_fixture("cycle.yaml");

  env
    .anvil_cmd()
    .arg("plan")
    .assert()
    .code(2)
    .stderr(predicate::str::contains("circular dependency"));
}

#[test]
fn plan_with_explicit_file() {
  let env = TestEnv::from_fixture("basic.yaml");
  let other = env.temp.path().join("other.yaml");
  std::fs::rename(&env.document, &other).unwrap();

  env.anvil_cmd().arg("plan").assert().failure();
  env
    .anvil_cmd()
    .args(["plan", "-f"])
    .arg(&other)
    .assert()
    .success()
    .stdout(predicate::str::contains("Plan for basic"));
}
