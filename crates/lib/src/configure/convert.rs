//! Attribute value coercion.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A coerced attribute value, ready to hand to a setter.
pub enum Value {
  Text(String),
  Boolean(bool),
  Integer(i64),
  Path(PathBuf),
  Custom(Box<dyn Any + Send>),
}

impl fmt::Debug for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Text(s) => f.debug_tuple("Text").field(s).finish(),
      Value::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
      Value::Integer(i) => f.debug_tuple("Integer").field(i).finish(),
      Value::Path(p) => f.debug_tuple("Path").field(p).finish(),
      Value::Custom(_) => f.write_str("Custom(..)"),
    }
  }
}

/// The destination type of an attribute setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
  Text,
  Boolean,
  Integer,
  Path,
  Enumerated(&'static [&'static str]),
  Custom { type_id: TypeId, type_name: &'static str },
}

impl fmt::Display for ValueKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ValueKind::Text => f.write_str("string"),
      ValueKind::Boolean => f.write_str("boolean"),
      ValueKind::Integer => f.write_str("integer"),
      ValueKind::Path => f.write_str("path"),
      ValueKind::Enumerated(values) => write!(f, "one of [{}]", values.join(", ")),
      ValueKind::Custom { type_name, .. } => f.write_str(type_name),
    }
  }
}

type ConvertFn = Box<dyn Fn(&str) -> Result<Box<dyn Any + Send>, String> + Send + Sync>;

/// Converters for custom attribute types, keyed by destination type.
pub struct Converters {
  custom: HashMap<TypeId, ConvertFn>,
}

impl fmt::Debug for Converters {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Converters").field("custom", &self.custom.len()).finish()
  }
}

impl Default for Converters {
  fn default() -> Self {
    let mut converters = Self { custom: HashMap::new() };
    converters.register::<Duration>(|raw| humantime::parse_duration(raw.trim()).map_err(|e| e.to_string()));
    converters
  }
}

impl Converters {
  /// Register the converter for `V`, replacing any previous one.
  pub fn register<V: Any + Send>(&mut self, convert: fn(&str) -> Result<V, String>) {
    self.custom.insert(
      TypeId::of::<V>(),
      Box::new(move |raw| convert(raw).map(|v| Box::new(v) as Box<dyn Any + Send>)),
    );
  }

  pub fn supports(&self, type_id: TypeId) -> bool {
    self.custom.contains_key(&type_id)
  }

  /// Coerce `raw` to `kind`; relative paths are resolved against `base_dir`.
  ///
  /// On failure returns the reason the value was rejected.
  pub fn convert(&self, kind: ValueKind, raw: &str, base_dir: &Path) -> Result<Value, String> {
    match kind {
      ValueKind::Text => Ok(Value::Text(raw.to_string())),
      ValueKind::Boolean => parse_bool(raw).map(Value::Boolean),
      ValueKind::Integer => raw
        .trim()
        .parse::<i64>()
        .map(Value::Integer)
        .map_err(|e| e.to_string()),
      ValueKind::Path => {
        let path = Path::new(raw);
        if path.is_absolute() {
          Ok(Value::Path(path.to_path_buf()))
        } else {
          Ok(Value::Path(base_dir.join(path)))
        }
      }
      ValueKind::Enumerated(values) => values
        .iter()
        .find(|v| v.eq_ignore_ascii_case(raw.trim()))
        .map(|v| Value::Text(v.to_string()))
        .ok_or_else(|| format!("expected one of [{}]", values.join(", "))),
      ValueKind::Custom { type_id, type_name } => {
        let convert = self
          .custom
          .get(&type_id)
          .ok_or_else(|| format!("no converter registered for {type_name}"))?;
        convert(raw).map(Value::Custom)
      }
    }
  }
}

/// Strict boolean parsing: `true/yes/on` and `false/no/off`.
pub fn parse_bool(raw: &str) -> Result<bool, String> {
  match raw.trim().to_ascii_lowercase().as_str() {
    "true" | "yes" | "on" => Ok(true),
    "false" | "no" | "off" => Ok(false),
    _ => Err("expected true/yes/on or false/no/off".to_string()),
  }
}
