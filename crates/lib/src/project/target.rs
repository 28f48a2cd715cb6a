//! Targets and their run-conditions.

use serde::Serialize;

use crate::configure::parse_bool;
use crate::node::DeclNode;
use crate::property::{PropertyError, PropertyStore};

/// Gate deciding whether a target's steps run.
///
/// `if_set` requires a property to be bound, `unless_set` requires it to be
/// unbound. Both texts are property-resolved first, and a literal boolean
/// (`true/yes/on`, `false/no/off`) decides directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunCondition {
  pub if_set: Option<String>,
  pub unless_set: Option<String>,
}

impl RunCondition {
  /// Whether the target should run.
  pub fn allows(&self, properties: &PropertyStore) -> Result<bool, PropertyError> {
    if let Some(test) = &self.if_set
      && property_test(test, properties)? == Some(false)
    {
      return Ok(false);
    }
    if let Some(test) = &self.unless_set
      && property_test(test, properties)? == Some(true)
    {
      return Ok(false);
    }
    Ok(true)
  }

  /// Human-readable reason for a skip, for logging.
  pub fn describe_skip(&self, properties: &PropertyStore) -> String {
    if let Some(test) = &self.if_set
      && matches!(property_test(test, properties), Ok(Some(false)))
    {
      return format!("Skipped because property '{test}' not set.");
    }
    match &self.unless_set {
      Some(test) => format!("Skipped because property '{test}' set."),
      None => "Skipped.".to_string(),
    }
  }
}

/// `None` for an empty test, which never blocks a target.
fn property_test(test: &str, properties: &PropertyStore) -> Result<Option<bool>, PropertyError> {
  let resolved = properties.resolve(test)?;
  if resolved.is_empty() {
    return Ok(None);
  }
  match parse_bool(&resolved) {
    Ok(literal) => Ok(Some(literal)),
    Err(_) => Ok(Some(properties.contains(&resolved))),
  }
}

/// A named unit of work: dependencies, a run-condition and ordered steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
  name: String,
  depends: Vec<String>,
  condition: RunCondition,
  description: Option<String>,
  steps: Vec<DeclNode>,
}

impl Target {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      depends: Vec::new(),
      condition: RunCondition::default(),
      description: None,
      steps: Vec::new(),
    }
  }

  pub fn depends_on<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.depends.extend(names.into_iter().map(Into::into));
    self
  }

  pub fn only_if(mut self, property: impl Into<String>) -> Self {
    self.condition.if_set = Some(property.into());
    self
  }

  pub fn unless(mut self, property: impl Into<String>) -> Self {
    self.condition.unless_set = Some(property.into());
    self
  }

  pub fn describe(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn step(mut self, node: DeclNode) -> Self {
    self.steps.push(node);
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn depends(&self) -> &[String] {
    &self.depends
  }

  pub fn condition(&self) -> &RunCondition {
    &self.condition
  }

  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  pub fn steps(&self) -> &[DeclNode] {
    &self.steps
  }

  pub(crate) fn push_step(&mut self, node: DeclNode) {
    self.steps.push(node);
  }
}
