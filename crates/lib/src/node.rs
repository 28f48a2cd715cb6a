//! Declarative nodes: the parsed form of a step and its nested elements.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Where a node was declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
  /// Document the node came from, if any.
  pub source: Option<PathBuf>,
  /// Path of the node inside the document, e.g. `targets[build].steps[0]`.
  pub path: String,
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.source {
      Some(source) => write!(f, "{}:{}", source.display(), self.path),
      None => f.write_str(&self.path),
    }
  }
}

/// A declarative element: a name, ordered raw attributes, nested text and
/// ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclNode {
  pub name: String,
  pub attributes: Vec<(String, String)>,
  pub text: Option<String>,
  pub children: Vec<DeclNode>,
  pub location: Option<Location>,
}

impl DeclNode {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      attributes: Vec::new(),
      text: None,
      children: Vec::new(),
      location: None,
    }
  }

  pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.attributes.push((name.into(), value.into()));
    self
  }

  pub fn with_child(mut self, child: DeclNode) -> Self {
    self.children.push(child);
    self
  }

  pub fn with_text(mut self, text: impl Into<String>) -> Self {
    self.text = Some(text.into());
    self
  }

  pub fn with_location(mut self, location: Location) -> Self {
    self.location = Some(location);
    self
  }

  /// Raw value of the first attribute called `name`.
  pub fn attr(&self, name: &str) -> Option<&str> {
    self
      .attributes
      .iter()
      .find(|(key, _)| key == name)
      .map(|(_, value)| value.as_str())
  }

  /// Nested text, ignoring whitespace-only content.
  pub fn meaningful_text(&self) -> Option<&str> {
    self.text.as_deref().filter(|t| !t.trim().is_empty())
  }
}
