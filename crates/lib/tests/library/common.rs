//! Shared helpers for library integration tests.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anvil_lib::document::{LoadOptions, load_project_str};
use anvil_lib::execute::listener::{BuildEvent, BuildListener};
use anvil_lib::project::Project;

/// Records every event it receives.
#[derive(Debug, Default)]
pub struct Recorder {
  events: Mutex<Vec<BuildEvent>>,
}

impl Recorder {
  pub fn events(&self) -> Vec<BuildEvent> {
    self.events.lock().unwrap().clone()
  }

  /// Step names in the order they started.
  pub fn started_steps(&self) -> Vec<String> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        BuildEvent::StepStarted { step, .. } => Some(step),
        _ => None,
      })
      .collect()
  }
}

impl BuildListener for Recorder {
  fn on_event(&self, event: &BuildEvent) {
    self.events.lock().unwrap().push(event.clone());
  }
}

/// Load `text` as a document rooted at `dir` with a recording listener attached.
pub fn load(text: &str, dir: &Path, options: &LoadOptions) -> (Project, Arc<Recorder>) {
  let mut project = load_project_str(text, dir, options).unwrap();
  let recorder = Arc::new(Recorder::default());
  project.add_listener(recorder.clone());
  (project, recorder)
}
