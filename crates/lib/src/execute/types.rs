//! Types for target resolution and execution.
//!
//! This module defines the error types, the build report and the
//! configuration for executing targets.

use serde::Serialize;
use thiserror::Error;

use crate::configure::ConfigError;
use crate::property::PropertyError;
use crate::step::StepError;

/// Errors found while computing the execution order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
  #[error("target '{name}' does not exist in the project{}", used_from_suffix(.used_from))]
  UnknownTarget { name: String, used_from: Option<String> },

  #[error("circular dependency: {}", .cycle.join(" <- "))]
  Cycle { cycle: Vec<String> },

  #[error("no target requested and the project has no default target")]
  NoTarget,
}

fn used_from_suffix(used_from: &Option<String>) -> String {
  match used_from {
    Some(from) => format!(" (used from target '{from}')"),
    None => String::new(),
  }
}

/// Why a single step failed.
#[derive(Debug, Error)]
pub enum StepFailure {
  #[error(transparent)]
  Configure(#[from] ConfigError),

  #[error("'{element}' is not a step")]
  NotAStep { element: String },

  #[error(transparent)]
  Execute(#[from] StepError),
}

/// Errors that end a build.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error("target '{target}': step '{step}' failed: {source}")]
  Step {
    target: String,
    step: String,
    #[source]
    source: StepFailure,
  },

  #[error("target '{target}': cannot evaluate run-condition: {source}")]
  Condition {
    target: String,
    #[source]
    source: PropertyError,
  },

  #[error("target '{target}' panicked")]
  Panicked { target: String },

  #[error("build aborted")]
  Aborted,
}

impl BuildError {
  /// Process exit status for this error.
  pub fn exit_code(&self) -> i32 {
    match self {
      BuildError::Resolve(_) => 2,
      BuildError::Aborted => 130,
      BuildError::Step { .. } | BuildError::Condition { .. } | BuildError::Panicked { .. } => 1,
    }
  }

  /// The target the error is attributed to, if any.
  pub fn target(&self) -> Option<&str> {
    match self {
      BuildError::Step { target, .. } | BuildError::Condition { target, .. } | BuildError::Panicked { target } => {
        Some(target)
      }
      BuildError::Resolve(_) | BuildError::Aborted => None,
    }
  }
}

/// How a target ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
  Succeeded,
  Failed,
  /// The run-condition was false; counts as success for dependents.
  Skipped,
  /// A dependency did not succeed (keep-going mode only).
  DependencyFailed,
}

/// Lifecycle of one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
  #[default]
  Idle,
  Resolving,
  Executing,
  Succeeded,
  Failed,
}

/// Result of one build.
#[derive(Debug, Default)]
pub struct BuildReport {
  /// Resolved execution order (the implicit target appears as `""`).
  pub order: Vec<String>,

  /// Targets whose steps all ran.
  pub succeeded: Vec<String>,

  /// Targets that did not run, with the reason.
  pub skipped: Vec<(String, TargetStatus)>,

  /// First fatal error, if any.
  pub error: Option<BuildError>,

  /// Further target failures recorded in keep-going mode.
  pub also_failed: Vec<String>,

  pub state: BuildState,
}

impl BuildReport {
  pub fn is_success(&self) -> bool {
    self.error.is_none()
  }

  /// Target the build failure is attributed to.
  pub fn failed_target(&self) -> Option<&str> {
    self.error.as_ref().and_then(BuildError::target)
  }

  pub fn exit_code(&self) -> i32 {
    self.error.as_ref().map_or(0, BuildError::exit_code)
  }

  /// Number of targets that were visited.
  pub fn total(&self) -> usize {
    self.succeeded.len() + self.skipped.len() + self.failed_target().iter().count() + self.also_failed.len()
  }
}

/// Configuration for target execution.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Maximum number of targets to execute at once.
  pub parallelism: usize,

  /// Continue with independent targets after a failure.
  pub keep_going: bool,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      keep_going: false,
    }
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
