//! Implementation of the `anvil run` command.
//!
//! Loads the build document, runs the requested targets and prints a summary.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use anvil_lib::document::{LoadOptions, load_project};
use anvil_lib::execute::listener::{MessageLevel, TracingListener};
use anvil_lib::execute::{BuildReport, ExecuteConfig, TargetStatus, execute, execute_parallel};

use crate::console::ConsoleListener;
use crate::output::{Tone, format_elapsed, print_stat, status, target_label};

/// Execute the run command.
///
/// With `config.parallelism` above one, independent targets run concurrently;
/// otherwise targets run one at a time on the calling thread. Ctrl-C raises
/// the project's abort signal, which stops the build before the next step.
pub fn cmd_run(
  file: &Path,
  options: &LoadOptions,
  targets: Vec<String>,
  config: ExecuteConfig,
  level: MessageLevel,
) -> Result<()> {
  let started = Instant::now();

  let mut project =
    load_project(file, options).with_context(|| format!("Failed to load build document: {}", file.display()))?;
  project.add_listener(Arc::new(ConsoleListener::new(level)));
  if level >= MessageLevel::Verbose {
    project.add_listener(Arc::new(TracingListener));
  }

  if level >= MessageLevel::Info {
    status(Tone::Note, &format!("Buildfile: {}", file.display()));
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let abort = project.abort_signal().clone();
  rt.spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received, aborting build");
      abort.raise();
    }
  });

  debug!(parallelism = config.parallelism, keep_going = config.keep_going, "running build");
  let mut report = if config.parallelism > 1 {
    rt.block_on(execute_parallel(Arc::new(project), targets, config))
  } else {
    execute(&project, &targets, &config)
  };

  print_summary(&report, started.elapsed());

  match report.error.take() {
    None => Ok(()),
    Some(err) => Err(err.into()),
  }
}

fn print_summary(report: &BuildReport, elapsed: std::time::Duration) {
  println!();
  let dependency_failed: Vec<&str> = report
    .skipped
    .iter()
    .filter(|(_, status)| *status == TargetStatus::DependencyFailed)
    .map(|(name, _)| target_label(name))
    .collect();

  if report.is_success() {
    status(Tone::Success, "BUILD SUCCESSFUL");
  } else {
    status(Tone::Failure, "BUILD FAILED");
    if let Some(target) = report.failed_target() {
      print_stat("Failed target", target_label(target));
    }
    if !report.also_failed.is_empty() {
      let others: Vec<&str> = report.also_failed.iter().map(|t| target_label(t)).collect();
      print_stat("Also failed", &others.join(", "));
    }
    if !dependency_failed.is_empty() {
      status(Tone::Warning, &format!("Not run after failures: {}", dependency_failed.join(", ")));
    }
  }
  print_stat("Targets run", &report.succeeded.len().to_string());
  print_stat("Total time", &format_elapsed(elapsed));
}
