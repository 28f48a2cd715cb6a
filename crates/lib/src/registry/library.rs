//! Library bundles: descriptors that map names to implementations.
//!
//! A bundle pairs a JSON descriptor with a loader provider. The descriptor
//! lists `(role, name, implementation)` definitions; the loader turns an
//! implementation identifier into an instance.
//!
//! ```json
//! {
//!   "library": "extras",
//!   "definitions": [
//!     { "role": "task", "name": "say", "implementation": "anvil.tasks.Echo" },
//!     { "role": "condition", "name": "defined", "implementation": "anvil.conditions.IsSet", "reload": true }
//!   ],
//!   "aliases": { "shout": "say" }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::{Factory, Registry, RegistryError, Role};
use crate::component::Configurable;
use crate::step::BoxError;

/// An isolated loading context resolving implementation identifiers.
pub trait Loader: Send + Sync {
  fn provides(&self, implementation: &str) -> bool;

  /// Create an instance of `implementation`.
  ///
  /// The error becomes the source of [`RegistryError::LoadFailed`].
  fn instantiate(&self, implementation: &str) -> Result<Box<dyn Configurable>, BoxError>;
}

/// A loader was asked for an implementation it does not provide.
#[derive(Debug, Error)]
#[error("no implementation named '{0}'")]
pub struct UnknownImplementation(pub String);

/// Creates a fresh loader each time it is called.
pub type LoaderProvider = Arc<dyn Fn() -> Box<dyn Loader> + Send + Sync>;

/// Errors raised while deploying a library into a registry.
#[derive(Debug, Error)]
pub enum DeploymentError {
  #[error("failed to read library descriptor {}: {source}", path.display())]
  ReadDescriptor {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid library descriptor {descriptor}: {source}")]
  ParseDescriptor {
    descriptor: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("library '{library}' defines '{name}' with unresolvable implementation '{implementation}'")]
  UnresolvedImplementation {
    library: String,
    name: String,
    implementation: String,
  },

  #[error("library '{library}' aliases '{alias}' to undefined name '{target}'")]
  UnknownAlias {
    library: String,
    alias: String,
    target: String,
  },
}

#[derive(Debug, Clone)]
enum DescriptorSource {
  File(PathBuf),
  Embedded { name: String, text: String },
}

/// A descriptor together with the loader that resolves its implementations.
#[derive(Clone)]
pub struct LibraryBundle {
  descriptor: DescriptorSource,
  loader: LoaderProvider,
}

impl fmt::Debug for LibraryBundle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LibraryBundle").field("descriptor", &self.descriptor).finish()
  }
}

impl LibraryBundle {
  /// A bundle whose descriptor is read from `path` at deployment.
  pub fn from_file(path: impl Into<PathBuf>, loader: LoaderProvider) -> Self {
    Self {
      descriptor: DescriptorSource::File(path.into()),
      loader,
    }
  }

  /// A bundle with an in-memory descriptor.
  pub fn from_text(name: impl Into<String>, text: impl Into<String>, loader: LoaderProvider) -> Self {
    Self {
      descriptor: DescriptorSource::Embedded {
        name: name.into(),
        text: text.into(),
      },
      loader,
    }
  }

  fn read(&self) -> Result<(String, String), DeploymentError> {
    match &self.descriptor {
      DescriptorSource::File(path) => {
        let text = std::fs::read_to_string(path).map_err(|source| DeploymentError::ReadDescriptor {
          path: path.clone(),
          source,
        })?;
        Ok((path.display().to_string(), text))
      }
      DescriptorSource::Embedded { name, text } => Ok((name.clone(), text.clone())),
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Descriptor {
  library: String,
  #[serde(default)]
  definitions: Vec<Definition>,
  #[serde(default)]
  aliases: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Definition {
  role: Role,
  name: String,
  implementation: String,
  #[serde(default)]
  reload: bool,
}

/// Creates instances through one loader shared for the library's lifetime.
struct LibraryFactory {
  library: String,
  implementation: String,
  loader: Arc<dyn Loader>,
}

impl Factory for LibraryFactory {
  fn create(&self) -> Result<Box<dyn Configurable>, RegistryError> {
    self
      .loader
      .instantiate(&self.implementation)
      .map_err(|source| RegistryError::LoadFailed {
        library: self.library.clone(),
        implementation: self.implementation.clone(),
        source,
      })
  }
}

/// Creates every instance through a freshly provided loader.
struct ReloadingFactory {
  library: String,
  implementation: String,
  provider: LoaderProvider,
}

impl Factory for ReloadingFactory {
  fn create(&self) -> Result<Box<dyn Configurable>, RegistryError> {
    let loader = (self.provider)();
    debug!(implementation = %self.implementation, "instantiating through fresh loader");
    loader
      .instantiate(&self.implementation)
      .map_err(|source| RegistryError::LoadFailed {
        library: self.library.clone(),
        implementation: self.implementation.clone(),
        source,
      })
  }
}

impl Registry {
  /// Register every definition of `bundle`.
  ///
  /// With `override_existing` unset, a name this registry already defines
  /// under the same role is kept and the library's definition is ignored.
  /// Returns the number of definitions registered.
  ///
  /// # Errors
  ///
  /// Fails without registering anything if the descriptor cannot be read or
  /// parsed, or if the loader cannot resolve one of its implementations.
  pub fn deploy_library(&mut self, bundle: &LibraryBundle, override_existing: bool) -> Result<usize, DeploymentError> {
    let (descriptor_name, text) = bundle.read()?;
    let descriptor: Descriptor = serde_json::from_str(&text).map_err(|source| DeploymentError::ParseDescriptor {
      descriptor: descriptor_name.clone(),
      source,
    })?;

    let shared: Arc<dyn Loader> = Arc::from((bundle.loader)());
    let mut factories: Vec<(Role, String, Arc<dyn Factory>)> = Vec::new();

    for def in &descriptor.definitions {
      if !shared.provides(&def.implementation) {
        return Err(DeploymentError::UnresolvedImplementation {
          library: descriptor.library.clone(),
          name: def.name.clone(),
          implementation: def.implementation.clone(),
        });
      }

      let factory: Arc<dyn Factory> = if def.reload {
        Arc::new(ReloadingFactory {
          library: descriptor.library.clone(),
          implementation: def.implementation.clone(),
          provider: Arc::clone(&bundle.loader),
        })
      } else {
        Arc::new(LibraryFactory {
          library: descriptor.library.clone(),
          implementation: def.implementation.clone(),
          loader: Arc::clone(&shared),
        })
      };
      factories.push((def.role, def.name.clone(), factory));
    }

    for (alias, target) in &descriptor.aliases {
      let aliased: Vec<_> = factories
        .iter()
        .filter(|(_, name, _)| name == target)
        .map(|(role, _, factory)| (*role, alias.clone(), Arc::clone(factory)))
        .collect();
      if aliased.is_empty() {
        return Err(DeploymentError::UnknownAlias {
          library: descriptor.library.clone(),
          alias: alias.clone(),
          target: target.clone(),
        });
      }
      factories.extend(aliased);
    }

    let mut registered = 0;
    for (role, name, factory) in factories {
      if !override_existing && self.defines_locally(role, &name) {
        info!(library = %descriptor.library, %role, name = %name, "keeping existing definition");
        continue;
      }
      self.register_shared(role, name, factory);
      registered += 1;
    }

    debug!(library = %descriptor.library, source = %descriptor_name, registered, "deployed library");
    Ok(registered)
  }

  /// Deploy the descriptor at `path` using `loader`.
  pub fn deploy_library_file(
    &mut self,
    path: &Path,
    loader: LoaderProvider,
    override_existing: bool,
  ) -> Result<usize, DeploymentError> {
    self.deploy_library(&LibraryBundle::from_file(path, loader), override_existing)
  }
}
