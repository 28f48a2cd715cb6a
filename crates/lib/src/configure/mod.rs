//! Binding declarative nodes onto configurable objects.
//!
//! For each node the [`Configurer`]:
//! 1. resolves and coerces every attribute and passes it to the matching setter,
//! 2. hands nested text to the text handler,
//! 3. routes every child element to an adder, a creator, a registry-backed
//!    adder, a string handler or the raw content handler, in that order,
//! 4. registers a copy of the configured instance in the project reference
//!    table when the node carries an `id`.
//!
//! A node whose only attribute is `refid` is configured by copying the
//! registered instance into the new object.

mod convert;
mod schema;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{trace, warn};

use crate::component::Configurable;
use crate::node::{DeclNode, Location};
use crate::project::Project;
use crate::property::PropertyError;
use crate::registry::{RegistryError, Role};

pub use convert::{Converters, Value, ValueKind, parse_bool};
pub use schema::{Schema, SchemaBuilder, normalize};

use schema::{ElementHandler, ElementSpec, Mismatch};

/// Attribute names the configurer handles itself.
const ID: &str = "id";
const REFID: &str = "refid";

/// Identifies the node a configuration error happened at.
#[derive(Debug, Clone)]
pub struct NodeContext {
  pub element: String,
  pub location: Option<Location>,
}

impl NodeContext {
  fn of(node: &DeclNode) -> Self {
    Self {
      element: node.name.clone(),
      location: node.location.clone(),
    }
  }
}

impl fmt::Display for NodeContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.location {
      Some(location) => write!(f, "<{}> at {}", self.element, location),
      None => write!(f, "<{}>", self.element),
    }
  }
}

/// Errors raised while configuring an object from a node.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("{context}: '{type_name}' does not support the attribute '{attribute}'")]
  UnknownAttribute {
    context: NodeContext,
    type_name: &'static str,
    attribute: String,
  },

  #[error("{context}: cannot convert '{value}' for attribute '{attribute}' to {expected}: {reason}")]
  Conversion {
    context: NodeContext,
    attribute: String,
    value: String,
    expected: ValueKind,
    reason: String,
  },

  #[error("{context}: '{type_name}' does not support the nested element '{element}'")]
  UnknownElement {
    context: NodeContext,
    type_name: &'static str,
    element: String,
  },

  #[error("{context}: nested element '{element}' matches more than one handler of '{type_name}'")]
  AmbiguousElement {
    context: NodeContext,
    type_name: &'static str,
    element: String,
  },

  #[error("{context}: '{type_name}' does not support nested text")]
  UnexpectedText { context: NodeContext, type_name: &'static str },

  #[error("{context}: {source}")]
  Property {
    context: NodeContext,
    #[source]
    source: PropertyError,
  },

  #[error("{context}: {source}")]
  Registry {
    context: NodeContext,
    #[source]
    source: RegistryError,
  },

  #[error("{context}: {message}")]
  Rejected { context: NodeContext, message: String },

  #[error("{context}: no reference with id '{id}'")]
  UnknownReference { context: NodeContext, id: String },

  #[error("{context}: reference '{id}' is a <{found}>, not a <{expected}>")]
  ReferenceMismatch {
    context: NodeContext,
    id: String,
    expected: String,
    found: String,
  },

  #[error("{context}: 'refid' cannot be combined with other attributes or content")]
  RefidWithContent { context: NodeContext },

  #[error("{context}: '{type_name}' cannot be registered or referenced by id")]
  NotShareable { context: NodeContext, type_name: &'static str },

  #[error("{context}: schema of '{type_name}' does not match the configured object")]
  SchemaMismatch { context: NodeContext, type_name: &'static str },
}

/// Configures objects against one project.
pub struct Configurer<'p> {
  project: &'p Project,
}

impl<'p> Configurer<'p> {
  pub fn new(project: &'p Project) -> Self {
    Self { project }
  }

  /// Create `(role, node.name)` from the project registry and configure it.
  pub fn instantiate(&self, role: Role, node: &DeclNode) -> Result<Box<dyn Configurable>, ConfigError> {
    let mut instance = self
      .project
      .registry()
      .create(role, &node.name)
      .map_err(|source| ConfigError::Registry {
        context: NodeContext::of(node),
        source,
      })?;
    self.configure(instance.as_mut(), node)?;
    Ok(instance)
  }

  /// Apply `node` to `obj`.
  pub fn configure(&self, obj: &mut dyn Configurable, node: &DeclNode) -> Result<(), ConfigError> {
    if node.attr(REFID).is_some() {
      return self.dereference(obj, node);
    }

    self.apply(obj, node)?;

    if let Some(id) = node.attr(ID) {
      let id = self.resolve(node, id)?;
      let schema = obj.schema();
      let sharing = schema.sharing.as_ref().ok_or_else(|| ConfigError::NotShareable {
        context: NodeContext::of(node),
        type_name: schema.type_name(),
      })?;
      let copy = (sharing.duplicate)((*obj).as_any()).ok_or_else(|| mismatch(node, schema))?;
      if self.project.add_reference(id.clone(), Arc::new(Mutex::new(copy))) {
        warn!(id = %id, element = %node.name, "reference id redefined");
      }
    }
    Ok(())
  }

  fn apply(&self, obj: &mut dyn Configurable, node: &DeclNode) -> Result<(), ConfigError> {
    let schema = obj.schema();
    trace!(element = %node.name, type_name = schema.type_name(), "configuring");

    for (name, raw) in &node.attributes {
      if name == ID || name == REFID {
        continue;
      }
      self.set_attribute(obj, schema, node, name, raw)?;
    }

    if let Some(text) = node.meaningful_text() {
      let handler = schema.text.as_ref().ok_or_else(|| ConfigError::UnexpectedText {
        context: NodeContext::of(node),
        type_name: schema.type_name(),
      })?;
      let text = self.resolve(node, text)?;
      handler(obj.as_any_mut(), text).map_err(|Mismatch| mismatch(node, schema))?;
    }

    for child in &node.children {
      self.add_child(obj, schema, node, child)?;
    }
    Ok(())
  }

  fn set_attribute(
    &self,
    obj: &mut dyn Configurable,
    schema: &'static Schema,
    node: &DeclNode,
    name: &str,
    raw: &str,
  ) -> Result<(), ConfigError> {
    let attr = schema.attribute(name).ok_or_else(|| ConfigError::UnknownAttribute {
      context: NodeContext::of(node),
      type_name: schema.type_name(),
      attribute: name.to_string(),
    })?;

    let resolved = self.resolve(node, raw)?;
    let value = self
      .project
      .converters()
      .convert(attr.kind, &resolved, self.project.base_dir())
      .map_err(|reason| ConfigError::Conversion {
        context: NodeContext::of(node),
        attribute: name.to_string(),
        value: resolved.clone(),
        expected: attr.kind,
        reason,
      })?;

    (attr.set)(obj.as_any_mut(), value).map_err(|Mismatch| mismatch(node, schema))
  }

  fn add_child(
    &self,
    obj: &mut dyn Configurable,
    schema: &'static Schema,
    parent: &DeclNode,
    child: &DeclNode,
  ) -> Result<(), ConfigError> {
    let string_handler = match select_named(schema, parent, child)? {
      Some(element) => match &element.handler {
        ElementHandler::Adder { make, add } => {
          let mut instance = make();
          self.configure(instance.as_mut(), child)?;
          let outcome = add(obj.as_any_mut(), instance).map_err(|Mismatch| mismatch(parent, schema))?;
          return outcome.map_err(|message| ConfigError::Rejected {
            context: NodeContext::of(child),
            message,
          });
        }
        ElementHandler::Creator(creator) => {
          let created = creator
            .create(obj.as_any_mut())
            .ok_or_else(|| mismatch(parent, schema))?;
          return self.configure(created, child);
        }
        ElementHandler::Text(set) => Some(set),
      },
      None => None,
    };

    // A registered type accepted by role beats a string overload of the same name.
    let registry = self.project.registry();
    let mut candidates = schema
      .role_adders
      .iter()
      .filter(|adder| registry.can_create(adder.role, &child.name));
    if let Some(adder) = candidates.next() {
      if candidates.next().is_some() {
        return Err(ConfigError::AmbiguousElement {
          context: NodeContext::of(parent),
          type_name: schema.type_name(),
          element: child.name.clone(),
        });
      }
      let instance = self.instantiate(adder.role, child)?;
      let outcome = (adder.add)(obj.as_any_mut(), instance).map_err(|Mismatch| mismatch(parent, schema))?;
      return outcome.map_err(|message| ConfigError::Rejected {
        context: NodeContext::of(child),
        message,
      });
    }

    if let Some(set) = string_handler {
      let text = match child.text.as_deref() {
        Some(text) => self.resolve(child, text)?,
        None => String::new(),
      };
      return set(obj.as_any_mut(), text).map_err(|Mismatch| mismatch(parent, schema));
    }

    if let Some(dynamic) = &schema.dynamic {
      let outcome = dynamic(obj.as_any_mut(), child).map_err(|Mismatch| mismatch(parent, schema))?;
      return outcome.map_err(|message| ConfigError::Rejected {
        context: NodeContext::of(child),
        message,
      });
    }

    Err(ConfigError::UnknownElement {
      context: NodeContext::of(parent),
      type_name: schema.type_name(),
      element: child.name.clone(),
    })
  }

  fn dereference(&self, obj: &mut dyn Configurable, node: &DeclNode) -> Result<(), ConfigError> {
    if node.attributes.len() != 1 || !node.children.is_empty() || node.meaningful_text().is_some() {
      return Err(ConfigError::RefidWithContent {
        context: NodeContext::of(node),
      });
    }
    let raw = node.attr(REFID).unwrap_or_default();
    let id = self.resolve(node, raw)?;

    let shared = self
      .project
      .reference(&id)
      .ok_or_else(|| ConfigError::UnknownReference {
        context: NodeContext::of(node),
        id: id.clone(),
      })?;
    let referenced = shared.lock().unwrap_or_else(PoisonError::into_inner);
    let source: &dyn Configurable = &**referenced;

    let schema = obj.schema();
    if source.as_any().type_id() != (*obj).as_any().type_id() {
      return Err(ConfigError::ReferenceMismatch {
        context: NodeContext::of(node),
        id,
        expected: schema.type_name().to_string(),
        found: source.schema().type_name().to_string(),
      });
    }
    let sharing = schema.sharing.as_ref().ok_or_else(|| ConfigError::NotShareable {
      context: NodeContext::of(node),
      type_name: schema.type_name(),
    })?;
    trace!(id = %id, type_name = schema.type_name(), "copying referenced instance");
    (sharing.assign)(obj.as_any_mut(), source.as_any()).map_err(|Mismatch| mismatch(node, schema))
  }

  fn resolve(&self, node: &DeclNode, text: &str) -> Result<String, ConfigError> {
    self
      .project
      .properties()
      .resolve(text)
      .map_err(|source| ConfigError::Property {
        context: NodeContext::of(node),
        source,
      })
  }
}

/// Pick the named handler for `child`: adders beat creators, and a string
/// handler is only used when nothing richer exists.
fn select_named<'s>(
  schema: &'s Schema,
  parent: &DeclNode,
  child: &DeclNode,
) -> Result<Option<&'s ElementSpec>, ConfigError> {
  let specs = schema.elements_named(&child.name);
  let Some(best) = specs.iter().map(|s| s.handler.precedence()).min() else {
    return Ok(None);
  };

  let mut chosen = specs.into_iter().filter(|s| s.handler.precedence() == best);
  let first = chosen.next();
  if chosen.next().is_some() {
    return Err(ConfigError::AmbiguousElement {
      context: NodeContext::of(parent),
      type_name: schema.type_name(),
      element: child.name.clone(),
    });
  }
  Ok(first)
}

fn mismatch(node: &DeclNode, schema: &Schema) -> ConfigError {
  ConfigError::SchemaMismatch {
    context: NodeContext::of(node),
    type_name: schema.type_name(),
  }
}
