//! The step capability and the context steps execute in.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::component::Configurable;
use crate::execute::listener::{BuildEvent, MessageLevel};
use crate::execute::{StepFailure, run_step};
use crate::node::DeclNode;
use crate::project::Project;
use crate::property::{PropertyError, PropertyStore};

/// A boxed error carried as the cause of another error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors a step can report.
///
/// Only [`StepError::Recoverable`] lets the surrounding target continue;
/// everything else fails the target.
#[derive(Debug, Error)]
pub enum StepError {
  #[error("{message}")]
  Fatal {
    message: String,
    #[source]
    source: Option<BoxError>,
  },

  #[error("{message}")]
  Recoverable { message: String },

  #[error(transparent)]
  Property(#[from] PropertyError),

  #[error("{context}: {source}")]
  Io {
    context: String,
    #[source]
    source: std::io::Error,
  },

  #[error("nested step '{element}' failed: {source}")]
  Nested {
    element: String,
    #[source]
    source: Box<StepFailure>,
  },
}

impl StepError {
  pub fn fatal(message: impl Into<String>) -> Self {
    StepError::Fatal {
      message: message.into(),
      source: None,
    }
  }

  pub fn fatal_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
    StepError::Fatal {
      message: message.into(),
      source: Some(source.into()),
    }
  }

  pub fn recoverable(message: impl Into<String>) -> Self {
    StepError::Recoverable {
      message: message.into(),
    }
  }

  pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
    StepError::Io {
      context: context.into(),
      source,
    }
  }

  pub fn is_recoverable(&self) -> bool {
    matches!(self, StepError::Recoverable { .. })
  }
}

/// A unit of executable behaviour inside a target.
pub trait Step: Send {
  fn execute(&mut self, ctx: &StepContext<'_>) -> Result<(), StepError>;
}

/// What a running step can see of the build.
pub struct StepContext<'a> {
  project: &'a Project,
  target: &'a str,
  step: &'a str,
}

impl<'a> StepContext<'a> {
  pub(crate) fn new(project: &'a Project, target: &'a str, step: &'a str) -> Self {
    Self { project, target, step }
  }

  pub fn project(&self) -> &'a Project {
    self.project
  }

  pub fn properties(&self) -> &'a PropertyStore {
    self.project.properties()
  }

  pub fn base_dir(&self) -> &'a Path {
    self.project.base_dir()
  }

  /// Name of the target this step belongs to (empty for the implicit target).
  pub fn target(&self) -> &str {
    self.target
  }

  /// Element name the step was declared with.
  pub fn step(&self) -> &str {
    self.step
  }

  pub fn resolve(&self, text: &str) -> Result<String, StepError> {
    Ok(self.project.properties().resolve(text)?)
  }

  /// `path` made absolute against the project base directory.
  pub fn resolve_path(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.project.base_dir().join(path)
    }
  }

  pub fn log(&self, level: MessageLevel, message: impl Into<String>) {
    self.project.fire(&BuildEvent::MessageLogged {
      target: Some(self.target.to_string()),
      step: Some(self.step.to_string()),
      level,
      message: message.into(),
    });
  }

  pub fn info(&self, message: impl Into<String>) {
    self.log(MessageLevel::Info, message);
  }

  pub fn warn(&self, message: impl Into<String>) {
    self.log(MessageLevel::Warning, message);
  }

  pub fn verbose(&self, message: impl Into<String>) {
    self.log(MessageLevel::Verbose, message);
  }

  /// Evaluate a configured condition instance.
  pub fn evaluate(&self, condition: &dyn Configurable) -> Result<bool, StepError> {
    let condition = condition
      .as_condition()
      .ok_or_else(|| StepError::fatal(format!("'{}' is not a condition", condition.schema().type_name())))?;
    condition.evaluate(self)
  }

  /// Instantiate, configure and run `node` as a step of the current target.
  pub fn run_nested(&self, node: &DeclNode) -> Result<(), StepError> {
    run_step(self.project, self.target, node).map_err(|failure| StepError::Nested {
      element: node.name.clone(),
      source: Box::new(failure),
    })
  }

  pub fn is_aborted(&self) -> bool {
    self.project.abort_signal().is_raised()
  }
}
