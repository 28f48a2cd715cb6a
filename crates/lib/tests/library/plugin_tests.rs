//! Custom step and condition types deployed through a library bundle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use anvil_lib::component::{Condition, Configurable};
use anvil_lib::configure::Schema;
use anvil_lib::document::LoadOptions;
use anvil_lib::execute::{BuildError, ExecuteConfig, execute};
use anvil_lib::registry::{LibraryBundle, Loader, LoaderProvider, UnknownImplementation};
use anvil_lib::step::{BoxError, Step, StepContext, StepError};
use tempfile::TempDir;

use super::common::load;

/// Appends `count` lines of `word` to a file.
#[derive(Debug, Default)]
struct Stamp {
  file: Option<std::path::PathBuf>,
  word: String,
  count: i64,
}

impl Configurable for Stamp {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<Stamp>("stamp")
        .path("file", |s, v| s.file = Some(v))
        .text("word", |s, v| s.word = v)
        .integer("count", |s, v| s.count = v)
        .build()
    });
    &SCHEMA
  }

  fn as_step(&mut self) -> Option<&mut dyn Step> {
    Some(self)
  }
}

impl Step for Stamp {
  fn execute(&mut self, ctx: &StepContext<'_>) -> Result<(), StepError> {
    let file = self.file.as_deref().ok_or_else(|| StepError::fatal("file is required"))?;
    let mut text = std::fs::read_to_string(ctx.resolve_path(file)).unwrap_or_default();
    for _ in 0..self.count {
      text.push_str(&self.word);
      text.push('\n');
    }
    std::fs::write(ctx.resolve_path(file), text).map_err(|e| StepError::io("stamp failed", e))?;
    ctx.info(format!("stamped {} x{}", self.word, self.count));
    Ok(())
  }
}

/// True when the named file has at least `lines` lines.
#[derive(Debug, Default)]
struct HasLines {
  file: Option<std::path::PathBuf>,
  lines: i64,
}

impl Configurable for HasLines {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<HasLines>("haslines")
        .path("file", |h, v| h.file = Some(v))
        .integer("lines", |h, v| h.lines = v)
        .build()
    });
    &SCHEMA
  }

  fn as_condition(&self) -> Option<&dyn Condition> {
    Some(self)
  }
}

impl Condition for HasLines {
  fn evaluate(&self, ctx: &StepContext<'_>) -> Result<bool, StepError> {
    let Some(file) = self.file.as_deref() else {
      return Ok(false);
    };
    let count = std::fs::read_to_string(ctx.resolve_path(file))
      .map(|t| t.lines().count())
      .unwrap_or(0);
    Ok(i64::try_from(count).unwrap_or(i64::MAX) >= self.lines)
  }
}

struct PluginLoader;

impl Loader for PluginLoader {
  fn provides(&self, implementation: &str) -> bool {
    matches!(implementation, "plugin.Stamp" | "plugin.HasLines")
  }

  fn instantiate(&self, implementation: &str) -> Result<Box<dyn Configurable>, BoxError> {
    match implementation {
      "plugin.Stamp" => Ok(Box::new(Stamp::default())),
      "plugin.HasLines" => Ok(Box::new(HasLines::default())),
      other => Err(UnknownImplementation(other.to_string()).into()),
    }
  }
}

const DESCRIPTOR: &str = r#"{
  "library": "plugin",
  "definitions": [
    { "role": "task", "name": "stamp", "implementation": "plugin.Stamp", "reload": true },
    { "role": "condition", "name": "haslines", "implementation": "plugin.HasLines" }
  ],
  "aliases": { "mark": "stamp" }
}"#;

fn plugin(loads: Arc<AtomicUsize>) -> LoadOptions {
  let provider: LoaderProvider = Arc::new(move || {
    loads.fetch_add(1, Ordering::SeqCst);
    Box::new(PluginLoader)
  });
  LoadOptions {
    bundles: vec![LibraryBundle::from_text("plugin", DESCRIPTOR, provider)],
    ..Default::default()
  }
}

const DOCUMENT: &str = r#"
project: plugins
default: verify
properties:
  log: stamps.txt
targets:
  - name: stamp
    steps:
      - stamp: { file: "${log}", word: tick, count: 2 }
      - mark: { file: "${log}", word: tock, count: "1" }
  - name: verify
    depends: stamp
    steps:
      - condition:
          property: enough
          haslines: { file: "${log}", lines: 3 }
      - fail:
          message: not enough stamps
          unless: enough
"#;

#[test]
fn custom_steps_run_from_a_bundle() {
  let temp = TempDir::new().unwrap();
  let loads = Arc::new(AtomicUsize::new(0));
  let (project, recorder) = load(DOCUMENT, temp.path(), &plugin(loads.clone()));

  let report = execute(&project, &[], &ExecuteConfig::default());

  assert!(report.is_success(), "{:?}", report.error);
  assert_eq!(
    std::fs::read_to_string(temp.path().join("stamps.txt")).unwrap(),
    "tick\ntick\ntock\n"
  );
  assert_eq!(project.properties().get("enough").as_deref(), Some("true"));
  assert_eq!(
    recorder.started_steps(),
    vec!["stamp", "mark", "condition", "fail"]
  );
  // the reloading factory asks for a fresh loader per instance
  assert!(loads.load(Ordering::SeqCst) >= 2);
}

#[test]
fn custom_condition_can_fail_the_build() {
  let temp = TempDir::new().unwrap();
  let text = DOCUMENT.replace("lines: 3", "lines: 10");
  let (project, _) = load(&text, temp.path(), &plugin(Arc::new(AtomicUsize::new(0))));

  let report = execute(&project, &[], &ExecuteConfig::default());

  assert_eq!(report.failed_target(), Some("verify"));
  assert!(matches!(report.error, Some(BuildError::Step { ref step, .. }) if step == "fail"));
  assert_eq!(report.exit_code(), 1);
}

#[test]
fn bad_attribute_value_names_the_attribute() {
  let temp = TempDir::new().unwrap();
  let text = DOCUMENT.replace("count: 2", "count: many");
  let (project, _) = load(&text, temp.path(), &plugin(Arc::new(AtomicUsize::new(0))));

  let report = execute(&project, &["stamp".to_string()], &ExecuteConfig::default());

  let err = report.error.expect("configuration error");
  assert!(err.to_string().contains("count"), "{err}");
  assert!(report.succeeded.is_empty());
}

#[test]
fn without_the_bundle_the_step_is_unknown() {
  let temp = TempDir::new().unwrap();
  let (project, _) = load(DOCUMENT, temp.path(), &LoadOptions::default());

  let report = execute(&project, &["stamp".to_string()], &ExecuteConfig::default());

  let err = report.error.expect("unknown type");
  assert!(err.to_string().contains("stamp"), "{err}");
}
