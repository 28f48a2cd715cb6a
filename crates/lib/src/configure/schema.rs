//! Per-type configuration tables.
//!
//! A [`Schema`] lists the attributes a type accepts and how its nested
//! elements are handed to it. Schemas are built once per type with
//! [`Schema::builder`] and usually kept in a `LazyLock` static.

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::path::PathBuf;

use super::convert::{Value, ValueKind};
use crate::component::Configurable;
use crate::node::DeclNode;
use crate::registry::Role;

/// The erased object did not have the type its schema was built for.
#[derive(Debug)]
pub(crate) struct Mismatch;

type Setter = Box<dyn Fn(&mut dyn Any, Value) -> Result<(), Mismatch> + Send + Sync>;
type TextFn = Box<dyn Fn(&mut dyn Any, String) -> Result<(), Mismatch> + Send + Sync>;
type AddFn = Box<dyn Fn(&mut dyn Any, Box<dyn Configurable>) -> Result<Result<(), String>, Mismatch> + Send + Sync>;
type DynamicFn = Box<dyn Fn(&mut dyn Any, &DeclNode) -> Result<Result<(), String>, Mismatch> + Send + Sync>;

pub(crate) struct AttributeSpec {
  pub(crate) name: &'static str,
  pub(crate) key: String,
  pub(crate) kind: ValueKind,
  pub(crate) set: Setter,
}

/// Creates a child inside its parent and hands it out for configuration.
pub(crate) trait CreateChild: Send + Sync {
  fn create<'a>(&self, parent: &'a mut dyn Any) -> Option<&'a mut dyn Configurable>;
}

struct Creator<T, C> {
  create: fn(&mut T) -> &mut C,
}

impl<T: Any, C: Configurable> CreateChild for Creator<T, C> {
  fn create<'a>(&self, parent: &'a mut dyn Any) -> Option<&'a mut dyn Configurable> {
    let parent = parent.downcast_mut::<T>()?;
    Some((self.create)(parent))
  }
}

pub(crate) enum ElementHandler {
  /// Receives a pre-built child of a fixed type once it is configured.
  Adder {
    make: fn() -> Box<dyn Configurable>,
    add: AddFn,
  },
  /// Creates the child in place; the configurer fills it in.
  Creator(Box<dyn CreateChild>),
  /// Receives the child's resolved text.
  Text(TextFn),
}

impl ElementHandler {
  pub(crate) fn precedence(&self) -> u8 {
    match self {
      ElementHandler::Adder { .. } => 0,
      ElementHandler::Creator(_) => 1,
      ElementHandler::Text(_) => 2,
    }
  }
}

pub(crate) struct ElementSpec {
  pub(crate) name: &'static str,
  pub(crate) key: String,
  pub(crate) handler: ElementHandler,
}

pub(crate) struct RoleAdder {
  pub(crate) role: Role,
  pub(crate) add: AddFn,
}

/// Copies configured instances of a shareable type.
pub(crate) struct Sharing {
  pub(crate) duplicate: fn(&dyn Any) -> Option<Box<dyn Configurable>>,
  pub(crate) assign: fn(&mut dyn Any, &dyn Any) -> Result<(), Mismatch>,
}

fn duplicate<T: Configurable + Clone>(obj: &dyn Any) -> Option<Box<dyn Configurable>> {
  obj
    .downcast_ref::<T>()
    .map(|value| Box::new(value.clone()) as Box<dyn Configurable>)
}

fn assign<T: Configurable + Clone>(target: &mut dyn Any, source: &dyn Any) -> Result<(), Mismatch> {
  let source = source.downcast_ref::<T>().ok_or(Mismatch)?;
  *downcast::<T>(target)? = source.clone();
  Ok(())
}

/// Describes how a type is configured from a declarative node.
pub struct Schema {
  type_name: &'static str,
  pub(crate) attributes: Vec<AttributeSpec>,
  pub(crate) elements: Vec<ElementSpec>,
  pub(crate) role_adders: Vec<RoleAdder>,
  pub(crate) text: Option<TextFn>,
  pub(crate) dynamic: Option<DynamicFn>,
  pub(crate) sharing: Option<Sharing>,
}

impl std::fmt::Debug for Schema {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Schema")
      .field("type_name", &self.type_name)
      .field("attributes", &self.attributes.iter().map(|a| a.name).collect::<Vec<_>>())
      .field("elements", &self.elements.iter().map(|e| e.name).collect::<Vec<_>>())
      .finish()
  }
}

/// Lowercase and drop `-`/`_`, so `fail-on-error`, `failOnError` and
/// `failonerror` name the same thing.
pub fn normalize(name: &str) -> String {
  name
    .chars()
    .filter(|c| *c != '-' && *c != '_')
    .flat_map(char::to_lowercase)
    .collect()
}

impl Schema {
  pub fn builder<T: Configurable>(type_name: &'static str) -> SchemaBuilder<T> {
    SchemaBuilder {
      schema: Schema {
        type_name,
        attributes: Vec::new(),
        elements: Vec::new(),
        role_adders: Vec::new(),
        text: None,
        dynamic: None,
        sharing: None,
      },
      _marker: PhantomData,
    }
  }

  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  /// Whether instances can be registered by `id` and reused by `refid`.
  pub fn is_shareable(&self) -> bool {
    self.sharing.is_some()
  }

  /// Declared attribute names, in declaration order.
  pub fn attribute_names(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.attributes.iter().map(|a| a.name)
  }

  /// The setter for `name`; a typed setter wins over a string one.
  pub(crate) fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
    let key = normalize(name);
    self
      .attributes
      .iter()
      .filter(|a| a.key == key)
      .min_by_key(|a| matches!(a.kind, ValueKind::Text))
  }

  pub(crate) fn elements_named(&self, name: &str) -> Vec<&ElementSpec> {
    let key = normalize(name);
    self.elements.iter().filter(|e| e.key == key).collect()
  }
}

fn downcast<T: Any>(obj: &mut dyn Any) -> Result<&mut T, Mismatch> {
  obj.downcast_mut::<T>().ok_or(Mismatch)
}

fn make_default<C: Configurable + Default>() -> Box<dyn Configurable> {
  Box::new(C::default())
}

/// Builder returned by [`Schema::builder`].
pub struct SchemaBuilder<T> {
  schema: Schema,
  _marker: PhantomData<fn(&mut T)>,
}

impl<T: Configurable> SchemaBuilder<T> {
  fn attribute(mut self, name: &'static str, kind: ValueKind, set: Setter) -> Self {
    self.schema.attributes.push(AttributeSpec {
      name,
      key: normalize(name),
      kind,
      set,
    });
    self
  }

  fn element(mut self, name: &'static str, handler: ElementHandler) -> Self {
    self.schema.elements.push(ElementSpec {
      name,
      key: normalize(name),
      handler,
    });
    self
  }

  /// String attribute.
  pub fn text(self, name: &'static str, set: fn(&mut T, String)) -> Self {
    self.attribute(
      name,
      ValueKind::Text,
      Box::new(move |obj: &mut dyn Any, value: Value| match value {
        Value::Text(s) => {
          set(downcast::<T>(obj)?, s);
          Ok(())
        }
        _ => Err(Mismatch),
      }),
    )
  }

  /// Boolean attribute (`true/yes/on`, `false/no/off`).
  pub fn boolean(self, name: &'static str, set: fn(&mut T, bool)) -> Self {
    self.attribute(
      name,
      ValueKind::Boolean,
      Box::new(move |obj: &mut dyn Any, value: Value| match value {
        Value::Boolean(b) => {
          set(downcast::<T>(obj)?, b);
          Ok(())
        }
        _ => Err(Mismatch),
      }),
    )
  }

  pub fn integer(self, name: &'static str, set: fn(&mut T, i64)) -> Self {
    self.attribute(
      name,
      ValueKind::Integer,
      Box::new(move |obj: &mut dyn Any, value: Value| match value {
        Value::Integer(i) => {
          set(downcast::<T>(obj)?, i);
          Ok(())
        }
        _ => Err(Mismatch),
      }),
    )
  }

  /// Path attribute, resolved against the project base directory.
  pub fn path(self, name: &'static str, set: fn(&mut T, PathBuf)) -> Self {
    self.attribute(
      name,
      ValueKind::Path,
      Box::new(move |obj: &mut dyn Any, value: Value| match value {
        Value::Path(p) => {
          set(downcast::<T>(obj)?, p);
          Ok(())
        }
        _ => Err(Mismatch),
      }),
    )
  }

  /// Attribute restricted to `values`; the setter gets the canonical spelling.
  pub fn enumerated(self, name: &'static str, values: &'static [&'static str], set: fn(&mut T, String)) -> Self {
    self.attribute(
      name,
      ValueKind::Enumerated(values),
      Box::new(move |obj: &mut dyn Any, value: Value| match value {
        Value::Text(s) => {
          set(downcast::<T>(obj)?, s);
          Ok(())
        }
        _ => Err(Mismatch),
      }),
    )
  }

  /// Attribute converted by the converter registered for `V`.
  pub fn custom<V: Any + Send>(self, name: &'static str, set: fn(&mut T, V)) -> Self {
    let kind = ValueKind::Custom {
      type_id: TypeId::of::<V>(),
      type_name: std::any::type_name::<V>(),
    };
    self.attribute(
      name,
      kind,
      Box::new(move |obj: &mut dyn Any, value: Value| match value {
        Value::Custom(any) => {
          let v = any.downcast::<V>().map_err(|_| Mismatch)?;
          set(downcast::<T>(obj)?, *v);
          Ok(())
        }
        _ => Err(Mismatch),
      }),
    )
  }

  /// Nested element whose resolved text is passed as a string.
  ///
  /// Ignored whenever a richer handler exists for the same element name.
  pub fn text_element(self, name: &'static str, add: fn(&mut T, String)) -> Self {
    self.element(
      name,
      ElementHandler::Text(Box::new(move |obj: &mut dyn Any, text: String| {
        add(downcast::<T>(obj)?, text);
        Ok(())
      })),
    )
  }

  /// Nested element of fixed type `C`, configured before it is added.
  pub fn element_of<C: Configurable + Default>(self, name: &'static str, add: fn(&mut T, C)) -> Self {
    self.element(
      name,
      ElementHandler::Adder {
        make: make_default::<C>,
        add: Box::new(move |obj: &mut dyn Any, child: Box<dyn Configurable>| {
          let parent = downcast::<T>(obj)?;
          let child = child.into_any().downcast::<C>().map_err(|_| Mismatch)?;
          add(parent, *child);
          Ok(Ok(()))
        }),
      },
    )
  }

  /// Nested element created by the parent and configured in place.
  pub fn creator<C: Configurable>(self, name: &'static str, create: fn(&mut T) -> &mut C) -> Self {
    self.element(name, ElementHandler::Creator(Box::new(Creator::<T, C> { create })))
  }

  /// Accept any nested element the registry can create under `role`.
  ///
  /// The adder may reject an instance by returning a message.
  pub fn accepts(mut self, role: Role, add: fn(&mut T, Box<dyn Configurable>) -> Result<(), String>) -> Self {
    self.schema.role_adders.push(RoleAdder {
      role,
      add: Box::new(move |obj: &mut dyn Any, child: Box<dyn Configurable>| Ok(add(downcast::<T>(obj)?, child))),
    });
    self
  }

  /// Nested text content of the element itself.
  pub fn text_content(mut self, set: fn(&mut T, String)) -> Self {
    self.schema.text = Some(Box::new(move |obj: &mut dyn Any, text: String| {
      set(downcast::<T>(obj)?, text);
      Ok(())
    }));
    self
  }

  /// Receive otherwise unhandled children as raw, unresolved nodes.
  pub fn dynamic(mut self, add: fn(&mut T, &DeclNode) -> Result<(), String>) -> Self {
    self.schema.dynamic = Some(Box::new(move |obj: &mut dyn Any, node: &DeclNode| Ok(add(downcast::<T>(obj)?, node))));
    self
  }

  pub fn build(self) -> Schema {
    self.schema
  }
}

impl<T: Configurable + Clone> SchemaBuilder<T> {
  /// Allow `id` registration; a `refid` use receives a copy of the
  /// registered instance.
  pub fn shareable(mut self) -> Self {
    self.schema.sharing = Some(Sharing {
      duplicate: duplicate::<T>,
      assign: assign::<T>,
    });
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalize_ignores_case_and_separators() {
    assert_eq!(normalize("failOnError"), "failonerror");
    assert_eq!(normalize("fail-on-error"), "failonerror");
    assert_eq!(normalize("FAIL_ON_ERROR"), "failonerror");
  }

  #[derive(Default)]
  struct Sample {
    name: String,
  }

  impl Configurable for Sample {
    fn schema(&self) -> &'static Schema {
      static SCHEMA: std::sync::LazyLock<Schema> = std::sync::LazyLock::new(|| {
        Schema::builder::<Sample>("sample")
          .text("name", |s, v| s.name = v)
          .text_element("name", |s, v| s.name = v)
          .build()
      });
      &SCHEMA
    }
  }

  #[test]
  fn lookups_use_normalized_names() {
    let schema = Sample::default().schema();
    assert!(schema.attribute("NAME").is_some());
    assert!(schema.attribute("other").is_none());
    assert_eq!(schema.elements_named("Name").len(), 1);
    assert_eq!(schema.attribute_names().collect::<Vec<_>>(), vec!["name"]);
  }

  #[derive(Default)]
  struct Limits {
    limit: Option<i64>,
    raw: Option<String>,
  }

  impl Configurable for Limits {
    fn schema(&self) -> &'static Schema {
      static SCHEMA: std::sync::LazyLock<Schema> = std::sync::LazyLock::new(|| {
        Schema::builder::<Limits>("limits")
          .text("limit", |l, v| l.raw = Some(v))
          .integer("limit", |l, v| l.limit = Some(v))
          .build()
      });
      &SCHEMA
    }
  }

  #[test]
  fn typed_setter_wins_over_earlier_string_setter() {
    let schema = Limits::default().schema();
    let spec = schema.attribute("limit").unwrap();
    assert!(matches!(spec.kind, ValueKind::Integer));

    let mut limits = Limits::default();
    (spec.set)(&mut limits, Value::Integer(7)).unwrap();
    assert_eq!(limits.limit, Some(7));
    assert_eq!(limits.raw, None);
  }

  #[test]
  fn setter_rejects_wrong_object_type() {
    let schema = Sample::default().schema();
    let mut wrong = 5_u8;
    let set = &schema.attribute("name").unwrap().set;
    assert!(set(&mut wrong, Value::Text("x".into())).is_err());

    let mut sample = Sample::default();
    set(&mut sample, Value::Text("ok".into())).unwrap();
    assert_eq!(sample.name, "ok");
  }
}
