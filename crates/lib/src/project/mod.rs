//! The project: root scope of one build invocation.
//!
//! A project owns the property store, the named targets (in declaration
//! order), the implicit target holding top-level steps, the type registry and
//! the reference table of configured instances registered by `id`.

mod target;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::trace;

use crate::component::SharedObject;
use crate::configure::Converters;
use crate::execute::listener::{BuildEvent, BuildListener};
use crate::node::DeclNode;
use crate::property::PropertyStore;
use crate::registry::Registry;

pub use target::{RunCondition, Target};

/// Name of the implicit target.
pub const IMPLICIT_TARGET: &str = "";

/// Errors raised while assembling a project.
#[derive(Debug, Error)]
pub enum ProjectError {
  #[error("duplicate target '{0}'")]
  DuplicateTarget(String),

  #[error("target names must not be empty")]
  EmptyTargetName,
}

/// Shared flag for cooperative cancellation of a running build.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
  pub fn raise(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_raised(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

pub struct Project {
  name: String,
  base_dir: PathBuf,
  file: Option<PathBuf>,
  default_target: Option<String>,
  description: Option<String>,
  properties: PropertyStore,
  targets: Vec<Target>,
  index: HashMap<String, usize>,
  implicit: Target,
  registry: Registry,
  converters: Converters,
  references: Mutex<HashMap<String, SharedObject>>,
  listeners: Vec<Arc<dyn BuildListener>>,
  abort: AbortSignal,
}

impl std::fmt::Debug for Project {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Project")
      .field("name", &self.name)
      .field("base_dir", &self.base_dir)
      .field("targets", &self.targets.iter().map(Target::name).collect::<Vec<_>>())
      .field("registry", &self.registry)
      .finish()
  }
}

impl Project {
  pub fn new(name: impl Into<String>, base_dir: impl Into<PathBuf>, registry: Registry) -> Self {
    Self {
      name: name.into(),
      base_dir: base_dir.into(),
      file: None,
      default_target: None,
      description: None,
      properties: PropertyStore::new(),
      targets: Vec::new(),
      index: HashMap::new(),
      implicit: Target::new(IMPLICIT_TARGET),
      registry,
      converters: Converters::default(),
      references: Mutex::new(HashMap::new()),
      listeners: Vec::new(),
      abort: AbortSignal::default(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn base_dir(&self) -> &Path {
    &self.base_dir
  }

  /// Document the project was loaded from, if any.
  pub fn file(&self) -> Option<&Path> {
    self.file.as_deref()
  }

  pub fn set_file(&mut self, file: impl Into<PathBuf>) {
    self.file = Some(file.into());
  }

  pub fn default_target(&self) -> Option<&str> {
    self.default_target.as_deref()
  }

  pub fn set_default_target(&mut self, name: impl Into<String>) {
    self.default_target = Some(name.into());
  }

  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  pub fn set_description(&mut self, description: impl Into<String>) {
    self.description = Some(description.into());
  }

  pub fn properties(&self) -> &PropertyStore {
    &self.properties
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  pub fn registry_mut(&mut self) -> &mut Registry {
    &mut self.registry
  }

  pub fn converters(&self) -> &Converters {
    &self.converters
  }

  pub fn converters_mut(&mut self) -> &mut Converters {
    &mut self.converters
  }

  /// Bind the properties every project provides.
  ///
  /// Existing bindings win, so user properties can override these.
  pub fn set_builtin_properties(&self) {
    let base = self.base_dir.display().to_string();
    self.properties.set("basedir", base);
    self.properties.set("anvil.project.name", self.name.clone());
    self.properties.set("anvil.version", env!("CARGO_PKG_VERSION"));
    if let Some(file) = &self.file {
      self.properties.set("anvil.file", file.display().to_string());
    }
    self.properties.set("os.name", std::env::consts::OS);
    self.properties.set("os.arch", std::env::consts::ARCH);
    self.properties.set("os.family", std::env::consts::FAMILY);
  }

  /// Add a named target.
  pub fn add_target(&mut self, target: Target) -> Result<(), ProjectError> {
    if target.name().is_empty() {
      return Err(ProjectError::EmptyTargetName);
    }
    if self.index.contains_key(target.name()) {
      return Err(ProjectError::DuplicateTarget(target.name().to_string()));
    }
    self.index.insert(target.name().to_string(), self.targets.len());
    self.targets.push(target);
    Ok(())
  }

  /// Append a step to the implicit target.
  pub fn add_implicit_step(&mut self, node: DeclNode) {
    self.implicit.push_step(node);
  }

  /// Look up a target; the empty name is the implicit target.
  pub fn target(&self, name: &str) -> Option<&Target> {
    if name == IMPLICIT_TARGET {
      return Some(&self.implicit);
    }
    self.index.get(name).map(|&i| &self.targets[i])
  }

  /// Named targets in declaration order.
  pub fn targets(&self) -> &[Target] {
    &self.targets
  }

  pub fn implicit_target(&self) -> &Target {
    &self.implicit
  }

  /// Register a configured instance under `id`. Returns `true` if an earlier
  /// instance was replaced.
  pub fn add_reference(&self, id: String, object: SharedObject) -> bool {
    let mut references = self.references.lock().unwrap_or_else(PoisonError::into_inner);
    trace!(id = %id, "adding reference");
    references.insert(id, object).is_some()
  }

  /// The instance registered under `id`, shared with every later `refid` use.
  pub fn reference(&self, id: &str) -> Option<SharedObject> {
    self
      .references
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(id)
      .map(Arc::clone)
  }

  pub fn add_listener(&mut self, listener: Arc<dyn BuildListener>) {
    self.listeners.push(listener);
  }

  /// Deliver `event` to every listener, in registration order.
  pub fn fire(&self, event: &BuildEvent) {
    for listener in &self.listeners {
      listener.on_event(event);
    }
  }

  pub fn abort_signal(&self) -> &AbortSignal {
    &self.abort
  }
}
