//! Target execution.
//!
//! This module provides the entry points for running a build:
//! - resolving the requested targets into an execution order
//! - running each target's steps through the registry and configurer
//! - skip tracking for run-conditions and, in keep-going mode, failed dependencies
//! - optional parallel execution of independent targets in waves

pub mod dag;
pub mod listener;
pub mod resolve;
pub mod types;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::configure::Configurer;
use crate::node::DeclNode;
use crate::project::{IMPLICIT_TARGET, Project, Target};
use crate::registry::Role;
use crate::step::StepContext;

use listener::{BuildEvent, MessageLevel};

pub use dag::TargetDag;
pub use resolve::resolve_order;
pub use types::{BuildError, BuildReport, BuildState, ExecuteConfig, ResolveError, StepFailure, TargetStatus};

/// How a single target ended.
#[derive(Debug)]
enum TargetOutcome {
  Succeeded,
  Skipped,
  Failed(BuildError),
}

/// Instantiate, configure and run one step.
///
/// Recoverable step errors are logged and swallowed; everything else is
/// returned.
pub(crate) fn run_step(project: &Project, target: &str, node: &DeclNode) -> Result<(), StepFailure> {
  project.fire(&BuildEvent::StepStarted {
    target: target.to_string(),
    step: node.name.clone(),
  });

  let result = (|| {
    let mut instance = Configurer::new(project).instantiate(Role::Task, node)?;
    let step = instance.as_step().ok_or_else(|| StepFailure::NotAStep {
      element: node.name.clone(),
    })?;

    let ctx = StepContext::new(project, target, &node.name);
    match step.execute(&ctx) {
      Ok(()) => Ok(()),
      Err(e) if e.is_recoverable() => {
        warn!(target_name = %target, step = %node.name, error = %e, "recoverable step error");
        ctx.log(MessageLevel::Warning, e.to_string());
        Ok(())
      }
      Err(e) => Err(StepFailure::Execute(e)),
    }
  })();

  project.fire(&BuildEvent::StepFinished {
    target: target.to_string(),
    step: node.name.clone(),
    error: result.as_ref().err().map(ToString::to_string),
  });
  result
}

fn finish_target(project: &Project, target: &Target, outcome: TargetOutcome) -> TargetOutcome {
  let status = match &outcome {
    TargetOutcome::Succeeded => TargetStatus::Succeeded,
    TargetOutcome::Skipped => TargetStatus::Skipped,
    TargetOutcome::Failed(_) => TargetStatus::Failed,
  };
  project.fire(&BuildEvent::TargetFinished {
    target: target.name().to_string(),
    status,
  });
  outcome
}

/// Evaluate the run-condition and run every step of `target`.
fn run_target(project: &Project, target: &Target) -> TargetOutcome {
  project.fire(&BuildEvent::TargetStarted {
    target: target.name().to_string(),
  });

  let properties = project.properties();
  match target.condition().allows(properties) {
    Ok(true) => {}
    Ok(false) => {
      let reason = target.condition().describe_skip(properties);
      debug!(target_name = %target.name(), reason = %reason, "target skipped");
      project.fire(&BuildEvent::MessageLogged {
        target: Some(target.name().to_string()),
        step: None,
        level: MessageLevel::Verbose,
        message: reason,
      });
      return finish_target(project, target, TargetOutcome::Skipped);
    }
    Err(source) => {
      let err = BuildError::Condition {
        target: target.name().to_string(),
        source,
      };
      return finish_target(project, target, TargetOutcome::Failed(err));
    }
  }

  for node in target.steps() {
    if project.abort_signal().is_raised() {
      return finish_target(project, target, TargetOutcome::Failed(BuildError::Aborted));
    }
    if let Err(source) = run_step(project, target.name(), node) {
      let err = BuildError::Step {
        target: target.name().to_string(),
        step: node.name.clone(),
        source,
      };
      return finish_target(project, target, TargetOutcome::Failed(err));
    }
  }

  finish_target(project, target, TargetOutcome::Succeeded)
}

fn run_named(project: &Project, name: &str) -> TargetOutcome {
  match project.target(name) {
    Some(target) => run_target(project, target),
    // resolve_order only yields known targets
    None => TargetOutcome::Failed(BuildError::Resolve(ResolveError::UnknownTarget {
      name: name.to_string(),
      used_from: None,
    })),
  }
}

/// Book-keeping shared by the sequential and parallel executors.
struct Tracker {
  report: BuildReport,
  ok: HashSet<String>,
  started: Instant,
}

impl Tracker {
  fn start(project: &Project, requested: &[String]) -> Self {
    info!(project = %project.name(), targets = ?requested, "starting build");
    project.fire(&BuildEvent::BuildStarted {
      project: project.name().to_string(),
      targets: requested.to_vec(),
    });
    Self {
      report: BuildReport {
        state: BuildState::Resolving,
        ..Default::default()
      },
      ok: HashSet::new(),
      started: Instant::now(),
    }
  }

  /// Names the dependency that blocks `name`, if any.
  fn blocked_by(&self, deps: &[String]) -> Option<String> {
    deps.iter().find(|dep| !self.ok.contains(*dep)).cloned()
  }

  fn skip_for_dependency(&mut self, project: &Project, name: &str, dep: &str) {
    warn!(target_name = %name, failed_dep = %dep, "skipping target due to failed dependency");
    project.fire(&BuildEvent::TargetStarted { target: name.to_string() });
    project.fire(&BuildEvent::MessageLogged {
      target: Some(name.to_string()),
      step: None,
      level: MessageLevel::Warning,
      message: format!("Cannot execute '{name}': '{dep}' failed or was not executed."),
    });
    project.fire(&BuildEvent::TargetFinished {
      target: name.to_string(),
      status: TargetStatus::DependencyFailed,
    });
    self.report.skipped.push((name.to_string(), TargetStatus::DependencyFailed));
  }

  fn record(&mut self, name: &str, outcome: TargetOutcome) {
    match outcome {
      TargetOutcome::Succeeded => {
        self.ok.insert(name.to_string());
        self.report.succeeded.push(name.to_string());
      }
      TargetOutcome::Skipped => {
        self.ok.insert(name.to_string());
        self.report.skipped.push((name.to_string(), TargetStatus::Skipped));
      }
      TargetOutcome::Failed(err) => {
        error!(target_name = %name, error = %err, "target failed");
        if self.report.error.is_none() {
          self.report.error = Some(err);
        } else {
          self.report.also_failed.push(name.to_string());
        }
      }
    }
  }

  fn failed(&self) -> bool {
    self.report.error.is_some()
  }

  fn finish(mut self, project: &Project) -> BuildReport {
    self.report.state = if self.report.is_success() {
      BuildState::Succeeded
    } else {
      BuildState::Failed
    };
    let duration = self.started.elapsed();
    info!(
      succeeded = self.report.succeeded.len(),
      skipped = self.report.skipped.len(),
      failed = self.report.error.is_some(),
      ?duration,
      "build complete"
    );
    project.fire(&BuildEvent::BuildFinished {
      success: self.report.is_success(),
      error: self.report.error.as_ref().map(ToString::to_string),
      duration,
    });
    self.report
  }
}

/// Direct dependencies of `name` within `order`, including the implicit target.
fn dependencies_in_order(project: &Project, order: &[String], name: &str) -> Vec<String> {
  let mut deps: Vec<String> = project
    .target(name)
    .map(|t| t.depends().to_vec())
    .unwrap_or_default();
  if name != IMPLICIT_TARGET && order.first().is_some_and(|first| first == IMPLICIT_TARGET) {
    deps.push(IMPLICIT_TARGET.to_string());
  }
  deps
}

/// Run `requested` (or the default target) one target at a time.
///
/// Always returns a report; the build-finished event is fired exactly once.
pub fn execute(project: &Project, requested: &[String], config: &ExecuteConfig) -> BuildReport {
  let mut tracker = Tracker::start(project, requested);

  let order = match resolve_order(project, requested) {
    Ok(order) => order,
    Err(e) => {
      tracker.record("", TargetOutcome::Failed(e.into()));
      return tracker.finish(project);
    }
  };
  tracker.report.order = order.clone();
  tracker.report.state = BuildState::Executing;

  for name in &order {
    if project.abort_signal().is_raised() {
      tracker.record(name, TargetOutcome::Failed(BuildError::Aborted));
      break;
    }

    if config.keep_going
      && let Some(dep) = tracker.blocked_by(&dependencies_in_order(project, &order, name))
    {
      tracker.skip_for_dependency(project, name, &dep);
      continue;
    }

    let outcome = run_named(project, name);
    tracker.record(name, outcome);
    if tracker.failed() && !config.keep_going {
      break;
    }
  }

  tracker.finish(project)
}

/// Run `requested` with independent targets executing concurrently.
///
/// Targets are grouped into waves with [`TargetDag::waves`]; each wave runs on
/// the blocking pool, at most `config.parallelism` targets at a time. When a
/// target fails outside keep-going mode, the rest of its wave finishes and no
/// further wave starts.
pub async fn execute_parallel(project: Arc<Project>, requested: Vec<String>, config: ExecuteConfig) -> BuildReport {
  let mut tracker = Tracker::start(&project, &requested);

  let order = match resolve_order(&project, &requested) {
    Ok(order) => order,
    Err(e) => {
      tracker.record("", TargetOutcome::Failed(e.into()));
      return tracker.finish(&project);
    }
  };
  tracker.report.order = order.clone();

  let dag = TargetDag::from_order(&project, &order);
  let waves = match dag.waves() {
    Ok(waves) => waves,
    Err(e) => {
      tracker.record("", TargetOutcome::Failed(e.into()));
      return tracker.finish(&project);
    }
  };
  info!(wave_count = waves.len(), "computed execution waves");
  tracker.report.state = BuildState::Executing;

  let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));

  for (wave_idx, wave) in waves.iter().enumerate() {
    if project.abort_signal().is_raised() {
      tracker.record("", TargetOutcome::Failed(BuildError::Aborted));
      break;
    }
    debug!(wave = wave_idx, targets = wave.len(), "executing wave");

    let mut ready = Vec::new();
    for name in wave {
      match tracker.blocked_by(&dag.dependencies(name)) {
        Some(dep) => tracker.skip_for_dependency(&project, name, &dep),
        None => ready.push(name.clone()),
      }
    }

    let mut results = execute_wave(&ready, &project, semaphore.clone()).await;
    // report in resolved order regardless of completion order
    results.sort_by_key(|(name, _)| order.iter().position(|n| n == name));
    for (name, outcome) in results {
      tracker.record(&name, outcome);
    }

    if tracker.failed() && !config.keep_going {
      break;
    }
  }

  tracker.finish(&project)
}

async fn execute_wave(
  targets: &[String],
  project: &Arc<Project>,
  semaphore: Arc<Semaphore>,
) -> Vec<(String, TargetOutcome)> {
  use tokio::task::JoinSet;

  let mut join_set = JoinSet::new();

  for name in targets {
    let name = name.clone();
    let project = Arc::clone(project);
    let semaphore = semaphore.clone();

    join_set.spawn(async move {
      // Acquire semaphore permit inside the task
      let _permit = semaphore.acquire_owned().await.ok();

      let task_name = name.clone();
      let outcome = tokio::task::spawn_blocking(move || run_named(&project, &task_name))
        .await
        .unwrap_or_else(|_| TargetOutcome::Failed(BuildError::Panicked { target: name.clone() }));
      (name, outcome)
    });
  }

  let mut results = Vec::new();
  while let Some(join_result) = join_set.join_next().await {
    match join_result {
      Ok(result) => results.push(result),
      Err(e) => error!(error = %e, "target task panicked"),
    }
  }
  results
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::component::Configurable;
  use crate::configure::Schema;
  use crate::execute::listener::BuildListener;
  use crate::registry::Registry;
  use crate::step::{Step, StepError};
  use std::sync::{LazyLock, Mutex};

  // ===== Fixtures =====

  /// Records the `label` of each run into the `ran` property list.
  #[derive(Default)]
  struct Record {
    label: String,
    fail: Option<String>,
  }

  impl Configurable for Record {
    fn schema(&self) -> &'static Schema {
      static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
        Schema::builder::<Record>("record")
          .text("label", |r, v| r.label = v)
          .enumerated("fail", &["fatal", "recoverable"], |r, v| r.fail = Some(v))
          .build()
      });
      &SCHEMA
    }

    fn as_step(&mut self) -> Option<&mut dyn Step> {
      Some(self)
    }
  }

  impl Step for Record {
    fn execute(&mut self, ctx: &StepContext<'_>) -> Result<(), StepError> {
      ctx.info(format!("ran {}", self.label));
      match self.fail.as_deref() {
        Some("fatal") => Err(StepError::fatal(format!("{} broke", self.label))),
        Some(_) => Err(StepError::recoverable(format!("{} wobbled", self.label))),
        None => Ok(()),
      }
    }
  }

  #[derive(Default)]
  struct Collect(Mutex<Vec<BuildEvent>>);

  impl BuildListener for Collect {
    fn on_event(&self, event: &BuildEvent) {
      self.0.lock().unwrap().push(event.clone());
    }
  }

  impl Collect {
    fn events(&self) -> Vec<BuildEvent> {
      self.0.lock().unwrap().clone()
    }

    /// Messages logged by steps, in order.
    fn ran(&self) -> Vec<String> {
      self
        .events()
        .into_iter()
        .filter_map(|e| match e {
          BuildEvent::MessageLogged { message, step: Some(_), .. } if message.starts_with("ran ") => {
            Some(message.trim_start_matches("ran ").to_string())
          }
          _ => None,
        })
        .collect()
    }
  }

  fn record(label: &str) -> DeclNode {
    DeclNode::new("record").with_attr("label", label)
  }

  fn failing(label: &str, how: &str) -> DeclNode {
    record(label).with_attr("fail", how)
  }

  fn project_with(targets: Vec<Target>) -> (Project, Arc<Collect>) {
    let mut registry = Registry::new();
    registry.register(Role::Task, "record", || Box::new(Record::default()) as Box<dyn Configurable>);
    let mut project = Project::new("test", "/work", registry);
    for target in targets {
      project.add_target(target).unwrap();
    }
    let collect = Arc::new(Collect::default());
    project.add_listener(collect.clone());
    (project, collect)
  }

  fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
  }

  fn sequential() -> ExecuteConfig {
    ExecuteConfig {
      parallelism: 1,
      keep_going: false,
    }
  }

  fn clean_build_package(build_step: DeclNode) -> Vec<Target> {
    vec![
      Target::new("clean").step(record("clean")),
      Target::new("build").depends_on(["clean"]).step(build_step).step(record("build-2")),
      Target::new("package").depends_on(["build"]).step(record("package")),
    ]
  }

  // ===== Sequential execution =====

  #[test]
  fn runs_targets_in_dependency_order() {
    let (project, events) = project_with(clean_build_package(record("build")));
    let report = execute(&project, &names(&["package"]), &sequential());

    assert!(report.is_success());
    assert_eq!(report.state, BuildState::Succeeded);
    assert_eq!(report.order, names(&["clean", "build", "package"]));
    assert_eq!(report.succeeded, names(&["clean", "build", "package"]));
    assert_eq!(events.ran(), names(&["clean", "build", "build-2", "package"]));
  }

  #[test]
  fn fatal_step_stops_target_and_build() {
    let (project, events) = project_with(clean_build_package(failing("build", "fatal")));
    let report = execute(&project, &names(&["package"]), &sequential());

    assert!(!report.is_success());
    assert_eq!(report.state, BuildState::Failed);
    assert_eq!(report.failed_target(), Some("build"));
    assert_eq!(report.succeeded, names(&["clean"]));
    assert_eq!(events.ran(), names(&["clean", "build"]));
    assert!(matches!(
      report.error,
      Some(BuildError::Step { ref step, source: StepFailure::Execute(_), .. }) if step == "record"
    ));
  }

  #[test]
  fn recoverable_step_error_lets_target_continue() {
    let (project, events) = project_with(clean_build_package(failing("build", "recoverable")));
    let report = execute(&project, &names(&["package"]), &sequential());

    assert!(report.is_success());
    assert_eq!(events.ran(), names(&["clean", "build", "build-2", "package"]));
    assert!(events.events().iter().any(|e| matches!(
      e,
      BuildEvent::MessageLogged { level: MessageLevel::Warning, message, .. } if message == "build wobbled"
    )));
  }

  #[test]
  fn unless_condition_skips_but_counts_as_visited() {
    let (project, events) = project_with(vec![
      Target::new("prepare").unless("flagSet").step(record("prepare")),
      Target::new("main").depends_on(["prepare"]).step(record("main")),
    ]);
    project.properties().set("flagSet", "true");

    let report = execute(&project, &names(&["main"]), &sequential());
    assert!(report.is_success());
    assert_eq!(report.skipped, vec![("prepare".to_string(), TargetStatus::Skipped)]);
    assert_eq!(report.succeeded, names(&["main"]));
    assert_eq!(events.ran(), names(&["main"]));
    assert!(events.events().contains(&BuildEvent::TargetFinished {
      target: "prepare".into(),
      status: TargetStatus::Skipped
    }));
  }

  #[test]
  fn resolution_error_still_finishes_build() {
    let (project, events) = project_with(vec![Target::new("a").depends_on(["b"]), Target::new("b").depends_on(["a"])]);
    let report = execute(&project, &names(&["a"]), &sequential());

    assert!(matches!(report.error, Some(BuildError::Resolve(ResolveError::Cycle { .. }))));
    assert_eq!(report.exit_code(), 2);
    let finished = events
      .events()
      .iter()
      .filter(|e| matches!(e, BuildEvent::BuildFinished { .. }))
      .count();
    assert_eq!(finished, 1);
  }

  #[test]
  fn events_are_ordered_per_build() {
    let (project, events) = project_with(vec![Target::new("only").step(record("x"))]);
    execute(&project, &names(&["only"]), &sequential());

    let kinds: Vec<&str> = events
      .events()
      .iter()
      .map(|e| match e {
        BuildEvent::BuildStarted { .. } => "build-started",
        BuildEvent::BuildFinished { .. } => "build-finished",
        BuildEvent::TargetStarted { .. } => "target-started",
        BuildEvent::TargetFinished { .. } => "target-finished",
        BuildEvent::StepStarted { .. } => "step-started",
        BuildEvent::StepFinished { .. } => "step-finished",
        BuildEvent::MessageLogged { .. } => "message",
      })
      .collect();
    assert_eq!(
      kinds,
      vec![
        "build-started",
        "target-started",
        "step-started",
        "message",
        "step-finished",
        "target-finished",
        "build-finished"
      ]
    );
  }

  #[test]
  fn implicit_target_runs_first_once() {
    let (mut project, events) = project_with(vec![Target::new("a").step(record("a")), Target::new("b").step(record("b"))]);
    project.add_implicit_step(record("init"));

    let report = execute(&project, &names(&["a", "b"]), &sequential());
    assert!(report.is_success());
    assert_eq!(events.ran(), names(&["init", "a", "b"]));
  }

  #[test]
  fn unknown_step_type_fails_with_configuration_error() {
    let (project, _) = project_with(vec![Target::new("t").step(DeclNode::new("javac"))]);
    let report = execute(&project, &names(&["t"]), &sequential());
    assert!(matches!(
      report.error,
      Some(BuildError::Step { source: StepFailure::Configure(_), .. })
    ));
    assert_eq!(report.exit_code(), 1);
  }

  #[test]
  fn abort_signal_stops_before_next_target() {
    let (project, events) = project_with(vec![Target::new("a").step(record("a"))]);
    project.abort_signal().raise();
    let report = execute(&project, &names(&["a"]), &sequential());
    assert!(matches!(report.error, Some(BuildError::Aborted)));
    assert_eq!(report.exit_code(), 130);
    assert!(events.ran().is_empty());
  }

  // ===== Keep-going =====

  #[test]
  fn keep_going_skips_dependents_but_runs_independent_targets() {
    let (project, events) = project_with(vec![
      Target::new("broken").step(failing("broken", "fatal")),
      Target::new("after").depends_on(["broken"]).step(record("after")),
      Target::new("independent").step(record("independent")),
    ]);
    let config = ExecuteConfig {
      parallelism: 1,
      keep_going: true,
    };
    let report = execute(&project, &names(&["after", "independent"]), &config);

    assert_eq!(report.failed_target(), Some("broken"));
    assert_eq!(report.skipped, vec![("after".to_string(), TargetStatus::DependencyFailed)]);
    assert_eq!(report.succeeded, names(&["independent"]));
    assert_eq!(events.ran(), names(&["broken", "independent"]));
  }

  // ===== Parallel execution =====

  #[tokio::test]
  async fn parallel_runs_every_target_once() {
    let (project, events) = project_with(vec![
      Target::new("init").step(record("init")),
      Target::new("compile").depends_on(["init"]).step(record("compile")),
      Target::new("docs").depends_on(["init"]).step(record("docs")),
      Target::new("dist").depends_on(["compile", "docs"]).step(record("dist")),
    ]);
    let config = ExecuteConfig {
      parallelism: 4,
      keep_going: false,
    };
    let report = execute_parallel(Arc::new(project), names(&["dist"]), config).await;

    assert!(report.is_success());
    assert_eq!(report.succeeded, names(&["init", "compile", "docs", "dist"]));
    let ran = events.ran();
    assert_eq!(ran.len(), 4);
    assert_eq!(ran.first().map(String::as_str), Some("init"));
    assert_eq!(ran.last().map(String::as_str), Some("dist"));
  }

  #[tokio::test]
  async fn parallel_failure_finishes_wave_and_stops() {
    let (project, events) = project_with(vec![
      Target::new("left").step(failing("left", "fatal")),
      Target::new("right").step(record("right")),
      Target::new("top").depends_on(["left", "right"]).step(record("top")),
    ]);
    let config = ExecuteConfig {
      parallelism: 2,
      keep_going: false,
    };
    let report = execute_parallel(Arc::new(project), names(&["top"]), config).await;

    assert_eq!(report.failed_target(), Some("left"));
    assert_eq!(report.succeeded, names(&["right"]));
    assert!(!events.ran().contains(&"top".to_string()));
  }

  #[tokio::test]
  async fn parallel_keep_going_marks_dependents() {
    let (project, _) = project_with(vec![
      Target::new("left").step(failing("left", "fatal")),
      Target::new("right").step(record("right")),
      Target::new("top").depends_on(["left"]).step(record("top")),
    ]);
    let config = ExecuteConfig {
      parallelism: 2,
      keep_going: true,
    };
    let report = execute_parallel(Arc::new(project), names(&["top", "right"]), config).await;

    assert_eq!(report.failed_target(), Some("left"));
    assert_eq!(report.skipped, vec![("top".to_string(), TargetStatus::DependencyFailed)]);
    assert_eq!(report.succeeded, names(&["right"]));
  }

  #[tokio::test]
  async fn parallel_reports_resolution_errors() {
    let (project, _) = project_with(vec![Target::new("a")]);
    let report = execute_parallel(Arc::new(project), names(&["missing"]), ExecuteConfig::default()).await;
    assert!(matches!(
      report.error,
      Some(BuildError::Resolve(ResolveError::UnknownTarget { .. }))
    ));
  }
}
