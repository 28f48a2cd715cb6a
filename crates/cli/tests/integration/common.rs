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
/// Each test gets its own temporary project directory holding a `build.yaml`.
pub struct TestEnv {
  pub temp: TempDir,
  pub document: PathBuf,
}

impl TestEnv {
  /// Create from a fixture file.
  ///
  /// Copies the fixture content to `build.yaml` in a temporary directory.
  pub fn from_fixture(name: &str) -> Self {
    Self::from_text(&fixture_content(name))
  }

  /// Create from inline document text.
  pub fn from_text(text: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let document = temp.path().join("build.yaml");
    std::fs::write(&document, text).unwrap();
    Self { temp, document }
  }

  /// Write a file relative to the project directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Canonical project directory.
  pub fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.root().join(relative_path)
  }

  pub fn read(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.path(relative_path)).unwrap()
  }

  /// A Command for the anvil binary, run from the project directory so the
  /// default `build.yaml` is picked up.
  pub fn anvil_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("anvil");
    cmd.current_dir(self.temp.path());
    cmd.env_remove("RUST_LOG");
    cmd
  }
}
