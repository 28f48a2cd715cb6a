//! Run command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

// ===== Success =====

#[test]
fn run_default_target() {
  let env = TestEnv::from_fixture("basic.yaml");

  env
    .anvil_cmd()
    .arg("run")
    .assert()
    .success()
    .stdout(predicate::str::contains("[echo] hello world"))
    .stdout(predicate::str::contains("BUILD SUCCESSFUL"));

  assert_eq!(env.read("out/stage.txt"), "stage is ready");
  assert!(!env.path("docs.txt").exists(), "docs is not part of the default run");
}

#[test]
fn run_prints_target_headers_in_order() {
  let env = TestEnv::from_fixture("basic.yaml");

  let output = env.anvil_cmd().arg("run").output().unwrap();
  let stdout = String::from_utf8_lossy(&output.stdout);
  let init = stdout.find("\ninit:").expect("init header");
  let build = stdout.find("\nbuild:").expect("build header");
  assert!(init < build);
}

#[test]
fn run_named_targets() {
  let env = TestEnv::from_fixture("basic.yaml");

  env.anvil_cmd().args(["run", "docs"]).assert().success();

  assert_eq!(env.read("docs.txt"), "docs");
  assert!(!env.path("out").exists());
}

#[test]
fn user_property_overrides_document() {
  let env = TestEnv::from_fixture("basic.yaml");

  env
    .anvil_cmd()
    .args(["run", "-D", "greeting=anvil"])
    .assert()
    .success()
    .stdout(predicate::str::contains("hello anvil"));
}

#[test]
fn property_file_is_loaded() {
  let env = TestEnv::from_fixture("basic.yaml");
  env.write_file("ci.properties", "stage=ci\n");

  env.anvil_cmd().args(["run", "--propertyfile", "ci.properties"]).assert().success();

  // the implicit target still runs but cannot override the file property
  assert_eq!(env.read("out/stage.txt"), "stage is ci");
}

#[test]
fn quiet_hides_target_headers() {
  let env = TestEnv::from_fixture("basic.yaml");

  env
    .anvil_cmd()
    .args(["-q", "run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("build:").not())
    .stdout(predicate::str::contains("hello world"));
}

#[test]
fn parallel_run_succeeds() {
  let env = TestEnv::from_fixture("basic.yaml");

  env.anvil_cmd().args(["run", "-j", "4", "build", "docs"]).assert().success();

  assert!(env.path("out/stage.txt").exists());
  assert!(env.path("docs.txt").exists());
}

// ===== Conditions =====

#[test]
fn conditional_target_runs_when_condition_holds() {
  let env = TestEnv::from_fixture("conditional.yaml");

  env
    .anvil_cmd()
    .args(["run", "-D", "branch=main"])
    .assert()
    .success()
    .stdout(predicate::str::contains("deploying"));
}

#[test]
fn conditional_target_is_skipped() {
  let env = TestEnv::from_fixture("conditional.yaml");

  env
    .anvil_cmd()
    .args(["-v", "run", "-D", "branch=feature"])
    .assert()
    .success()
    .stdout(predicate::str::contains("deploying").not())
    .stdout(predicate::str::contains("Skipped because property 'on.main' not set."));
}

#[test]
fn unless_property_skips_target() {
  let env = TestEnv::from_fixture("conditional.yaml");

  env
    .anvil_cmd()
    .args(["run", "local", "-D", "ci"])
    .assert()
    .success()
    .stdout(predicate::str::contains("running locally").not());
}

// ===== Failures =====

#[test]
fn failing_step_stops_the_build() {
  let env = TestEnv::from_fixture("failing.yaml");

  env
    .anvil_cmd()
    .arg("run")
    .assert()
    .code(1)
    .stdout(predicate::str::contains("cleaning"))
    .stdout(predicate::str::contains("packaging").not())
    .stderr(predicate::str::contains("BUILD FAILED"))
    .stderr(predicate::str::contains("compile error"));
}

#[test]
fn keep_going_runs_independent_targets() {
  let env = TestEnv::from_fixture("failing.yaml");

  env
    .anvil_cmd()
    .args(["run", "-k", "package", "docs"])
    .assert()
    .code(1)
    .stdout(predicate::str::contains("Cannot execute 'package'"))
    .stdout(predicate::str::contains("packaging").not());

  assert!(env.path("docs.txt").exists());
}

#[test]
fn unknown_target_exits_with_resolution_code() {
  let env = TestEnv::from_fixture("basic.yaml");

  env
    .anvil_cmd()
    .args(["run", "nope"])
    .assert()
    .code(2)
    .stderr(predicate::str::contains("target 'nope' does not exist"));
}

#[test]
fn cycle_exits_with_resolution_code() {
  let env = TestEnv::from_fixture("cycle.yaml");

  env
    .anvil_cmd()
    .arg("run")
    .assert()
    .code(2)
    .stderr(predicate::str::contains("circular dependency"));
}

#[test]
fn invalid_document_exits_with_load_code() {
  let env = TestEnv::from_text("targets: [\n");

  env.anvil_cmd().arg("run").assert().code(3);
}

#[test]
fn unknown_step_type_fails_target() {
  let env = TestEnv::from_text(
    r#"
default: build
targets:
  - name: build
    steps:
      - javac: { srcdir: src }
"#,
  );

  env
    .anvil_cmd()
    .arg("run")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("javac"));
}

#[cfg(unix)]
#[test]
fn exec_output_is_captured_into_a_property() {
  let env = TestEnv::from_text(
    r#"
default: build
targets:
  - name: build
    steps:
      - exec:
          executable: /bin/sh
          outputproperty: said
          arg: [{ value: -c }, { value: "echo from-shell" }]
      - echo: "shell said ${said}"
"#,
  );

  env
    .anvil_cmd()
    .arg("run")
    .assert()
    .success()
    .stdout(predicate::str::contains("shell said from-shell"));
}
