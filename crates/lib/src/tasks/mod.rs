//! Built-in steps and conditions.
//!
//! The built-ins are deployed like any other library: an embedded descriptor
//! maps names to implementation identifiers and [`BuiltinLoader`] resolves
//! those identifiers. Library descriptors may therefore alias or rename
//! built-in implementations.

mod condition;
mod conditions;
mod echo;
mod exec;
mod fail;
mod mkdir;
mod property;
mod sequential;

use std::sync::Arc;

use crate::component::Configurable;
use crate::registry::{LibraryBundle, Loader, LoaderProvider, UnknownImplementation};
use crate::step::BoxError;

pub use condition::ConditionTask;
pub use conditions::{And, Available, Equals, IsSet, IsTrue, Not, Or};
pub use echo::Echo;
pub use exec::{Exec, ExecArg, ExecEnv};
pub use fail::Fail;
pub use mkdir::Mkdir;
pub use property::Property;
pub use sequential::Sequential;

const DESCRIPTOR: &str = include_str!("builtin.json");

type Constructor = fn() -> Box<dyn Configurable>;

fn make<C: Configurable + Default>() -> Box<dyn Configurable> {
  Box::new(C::default())
}

const IMPLEMENTATIONS: &[(&str, Constructor)] = &[
  ("anvil.tasks.Echo", make::<Echo>),
  ("anvil.tasks.Property", make::<Property>),
  ("anvil.tasks.Fail", make::<Fail>),
  ("anvil.tasks.ConditionTask", make::<ConditionTask>),
  ("anvil.tasks.Mkdir", make::<Mkdir>),
  ("anvil.tasks.Exec", make::<Exec>),
  ("anvil.tasks.Sequential", make::<Sequential>),
  ("anvil.conditions.IsSet", make::<IsSet>),
  ("anvil.conditions.IsTrue", make::<IsTrue>),
  ("anvil.conditions.Equals", make::<Equals>),
  ("anvil.conditions.Available", make::<Available>),
  ("anvil.conditions.Not", make::<Not>),
  ("anvil.conditions.And", make::<And>),
  ("anvil.conditions.Or", make::<Or>),
];

/// Resolves the `anvil.tasks.*` and `anvil.conditions.*` identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinLoader;

impl Loader for BuiltinLoader {
  fn provides(&self, implementation: &str) -> bool {
    IMPLEMENTATIONS.iter().any(|(id, _)| *id == implementation)
  }

  fn instantiate(&self, implementation: &str) -> Result<Box<dyn Configurable>, BoxError> {
    IMPLEMENTATIONS
      .iter()
      .find(|(id, _)| *id == implementation)
      .map(|(_, construct)| construct())
      .ok_or_else(|| UnknownImplementation(implementation.to_string()).into())
  }
}

/// Loader provider for [`BuiltinLoader`].
pub fn builtin_loader() -> LoaderProvider {
  Arc::new(|| Box::new(BuiltinLoader) as Box<dyn Loader>)
}

/// The library holding every built-in definition.
pub fn builtin_library() -> LibraryBundle {
  LibraryBundle::from_text("anvil builtins", DESCRIPTOR, builtin_loader())
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::{Registry, Role};

  #[test]
  fn every_descriptor_entry_resolves() {
    let mut registry = Registry::new();
    let deployed = registry.deploy_library(&builtin_library(), true).unwrap();
    assert_eq!(deployed, IMPLEMENTATIONS.len());
  }

  #[test]
  fn registered_names_match_schema_names() {
    let registry = Registry::with_builtins().unwrap();
    for (role, name) in registry.definitions() {
      let instance = registry.create(role, &name).unwrap();
      assert_eq!(instance.schema().type_name(), name, "{role} {name}");
      match role {
        Role::Task => assert!(registry.create(role, &name).unwrap().as_step().is_some()),
        Role::Condition => assert!(instance.as_condition().is_some()),
        Role::Type => {}
      }
    }
  }

  #[test]
  fn loader_rejects_unknown_identifiers() {
    assert!(!BuiltinLoader.provides("anvil.tasks.Javac"));
    assert!(BuiltinLoader.instantiate("anvil.tasks.Javac").is_err());
  }
}
