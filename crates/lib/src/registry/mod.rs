//! The type registry.
//!
//! Maps a (role, name) pair to a factory that produces a fresh configurable
//! instance. Registries form a chain: a child consults its own entries first
//! and then its parent's, and registering in a child never touches the parent.

mod library;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::component::Configurable;
use crate::step::BoxError;

pub use library::{DeploymentError, LibraryBundle, Loader, LoaderProvider, UnknownImplementation};

/// The capability a registered name is looked up under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  /// Executable steps.
  Task,
  /// Plain configurable data types.
  Type,
  /// Boolean conditions.
  Condition,
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(match self {
      Role::Task => "task",
      Role::Type => "type",
      Role::Condition => "condition",
    })
  }
}

/// Errors raised while creating registered types.
#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("unknown {role} type '{name}'")]
  UnknownType { role: Role, name: String },

  #[error("'{name}' is registered as a {role} but does not provide that capability")]
  MissingCapability { role: Role, name: String },

  #[error("library '{library}' cannot load implementation '{implementation}': {source}")]
  LoadFailed {
    library: String,
    implementation: String,
    #[source]
    source: BoxError,
  },
}

/// Produces new instances of one registered type.
pub trait Factory: Send + Sync {
  fn create(&self) -> Result<Box<dyn Configurable>, RegistryError>;
}

impl<F> Factory for F
where
  F: Fn() -> Box<dyn Configurable> + Send + Sync,
{
  fn create(&self) -> Result<Box<dyn Configurable>, RegistryError> {
    Ok(self())
  }
}

/// A (role, name) → factory table with an optional parent.
#[derive(Default)]
pub struct Registry {
  parent: Option<Arc<Registry>>,
  entries: HashMap<(Role, String), Arc<dyn Factory>>,
}

impl fmt::Debug for Registry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registry")
      .field("entries", &self.entries.len())
      .field("has_parent", &self.parent.is_some())
      .finish()
  }
}

impl Registry {
  /// An empty root registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// A root registry holding the built-in steps and conditions.
  pub fn with_builtins() -> Result<Self, DeploymentError> {
    let mut registry = Self::new();
    registry.deploy_library(&crate::tasks::builtin_library(), true)?;
    Ok(registry)
  }

  /// A registry that forwards unresolved lookups to `parent`.
  pub fn child(parent: Arc<Registry>) -> Self {
    Self {
      parent: Some(parent),
      entries: HashMap::new(),
    }
  }

  /// Register `factory` under `(role, name)`, replacing any entry of this
  /// registry with the same key.
  pub fn register(&mut self, role: Role, name: impl Into<String>, factory: impl Factory + 'static) {
    self.register_shared(role, name.into(), Arc::new(factory));
  }

  fn register_shared(&mut self, role: Role, name: String, factory: Arc<dyn Factory>) {
    debug!(%role, name = %name, "registering type");
    if self.entries.insert((role, name.clone()), factory).is_some() {
      warn!(%role, name = %name, "type definition replaced");
    }
  }

  fn defines_locally(&self, role: Role, name: &str) -> bool {
    self.entries.contains_key(&(role, name.to_string()))
  }

  fn factory(&self, role: Role, name: &str) -> Option<&Arc<dyn Factory>> {
    self
      .entries
      .get(&(role, name.to_string()))
      .or_else(|| self.parent.as_deref().and_then(|p| p.factory(role, name)))
  }

  pub fn can_create(&self, role: Role, name: &str) -> bool {
    self.factory(role, name).is_some()
  }

  /// Create a new instance of `(role, name)`.
  ///
  /// # Errors
  ///
  /// Returns [`RegistryError::UnknownType`] if neither this registry nor any
  /// ancestor defines the pair, and [`RegistryError::MissingCapability`] if the
  /// instance does not provide what `role` requires.
  pub fn create(&self, role: Role, name: &str) -> Result<Box<dyn Configurable>, RegistryError> {
    let factory = self.factory(role, name).ok_or_else(|| RegistryError::UnknownType {
      role,
      name: name.to_string(),
    })?;

    let mut instance = factory.create()?;
    let capable = match role {
      Role::Task => instance.as_step().is_some(),
      Role::Condition => instance.as_condition().is_some(),
      Role::Type => true,
    };
    if !capable {
      return Err(RegistryError::MissingCapability {
        role,
        name: name.to_string(),
      });
    }
    Ok(instance)
  }

  /// Every (role, name) visible from this registry, sorted.
  pub fn definitions(&self) -> Vec<(Role, String)> {
    let mut all = BTreeSet::new();
    let mut current = Some(self);
    while let Some(registry) = current {
      all.extend(registry.entries.keys().cloned());
      current = registry.parent.as_deref();
    }
    all.into_iter().collect()
  }
}
