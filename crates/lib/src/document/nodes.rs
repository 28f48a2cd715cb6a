//! YAML values to declarative nodes.
//!
//! A step is a single-key mapping `element: body`:
//! - a scalar body is the element's text,
//! - in a mapping body, scalar entries are attributes, mapping entries are one
//!   child, sequence entries are one child per item and `$text` is the text,
//! - a sequence body lists child elements, each a single-key mapping.

use std::path::Path;

use serde_yaml::Value;

use super::DocumentError;
use crate::node::{DeclNode, Location};

const TEXT_KEY: &str = "$text";

/// Where nodes are being built from.
#[derive(Clone, Copy)]
pub(super) struct Origin<'a> {
  pub(super) source: Option<&'a Path>,
}

impl Origin<'_> {
  fn location(&self, path: &str) -> Location {
    Location {
      source: self.source.map(Path::to_path_buf),
      path: path.to_string(),
    }
  }

  pub(super) fn invalid(&self, path: &str, message: impl Into<String>) -> DocumentError {
    DocumentError::Invalid {
      location: self.location(path),
      message: message.into(),
    }
  }
}

/// Render a scalar as attribute text; `None` for anything else.
pub(super) fn scalar_text(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Bool(b) => Some(b.to_string()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// Convert one `element: body` mapping found at `path`.
pub(super) fn step_node(origin: Origin<'_>, value: &Value, path: &str) -> Result<DeclNode, DocumentError> {
  let Value::Mapping(map) = value else {
    return Err(origin.invalid(path, "a step must be a mapping of one element name to its body"));
  };
  let mut entries = map.iter();
  let (Some((key, body)), None) = (entries.next(), entries.next()) else {
    return Err(origin.invalid(path, "a step must have exactly one element name"));
  };
  let Value::String(name) = key else {
    return Err(origin.invalid(path, "element names must be strings"));
  };
  element(origin, name, body, path)
}

fn element(origin: Origin<'_>, name: &str, body: &Value, path: &str) -> Result<DeclNode, DocumentError> {
  let mut node = DeclNode::new(name).with_location(origin.location(path));

  match body {
    Value::Null => {}
    Value::Mapping(map) => {
      for (key, value) in map {
        let Value::String(key) = key else {
          return Err(origin.invalid(path, "attribute and element names must be strings"));
        };
        let child_path = format!("{path}.{key}");

        if key == TEXT_KEY {
          let text =
            scalar_text(value).ok_or_else(|| origin.invalid(&child_path, "'$text' must be a scalar"))?;
          node.text = Some(text);
          continue;
        }

        match value {
          Value::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
              node
                .children
                .push(element(origin, key, item, &format!("{child_path}[{i}]"))?);
            }
          }
          Value::Mapping(_) | Value::Null => node.children.push(element(origin, key, value, &child_path)?),
          Value::Tagged(_) => return Err(origin.invalid(&child_path, "tagged values are not supported")),
          scalar => {
            // scalar_text covers every remaining variant
            let text = scalar_text(scalar).unwrap_or_default();
            node.attributes.push((key.clone(), text));
          }
        }
      }
    }
    Value::Sequence(items) => {
      for (i, item) in items.iter().enumerate() {
        node.children.push(step_node(origin, item, &format!("{path}[{i}]"))?);
      }
    }
    Value::Tagged(_) => return Err(origin.invalid(path, "tagged values are not supported")),
    scalar => node.text = scalar_text(scalar),
  }

  Ok(node)
}
