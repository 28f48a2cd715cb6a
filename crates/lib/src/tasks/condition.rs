//! The `condition` step and the single-condition holder shared with `fail`.

use std::sync::LazyLock;

use crate::component::Configurable;
use crate::configure::Schema;
use crate::registry::Role;
use crate::step::{Step, StepContext, StepError};

/// Holds exactly one registry-created condition.
#[derive(Default)]
pub(crate) struct NestedCondition {
  inner: Option<Box<dyn Configurable>>,
}

impl NestedCondition {
  fn set(&mut self, condition: Box<dyn Configurable>) -> Result<(), String> {
    if self.inner.is_some() {
      return Err("only one nested condition is allowed".to_string());
    }
    self.inner = Some(condition);
    Ok(())
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.inner.is_none()
  }

  /// `None` when no condition was configured.
  pub(crate) fn evaluate(&self, ctx: &StepContext<'_>) -> Result<Option<bool>, StepError> {
    match &self.inner {
      Some(condition) => ctx.evaluate(condition.as_ref()).map(Some),
      None => Ok(None),
    }
  }
}

impl Configurable for NestedCondition {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<NestedCondition>("condition")
        .accepts(Role::Condition, NestedCondition::set)
        .build()
    });
    &SCHEMA
  }
}

/// `<condition property="..." value="..." else="...">` sets `property` from
/// the outcome of its nested condition.
#[derive(Default)]
pub struct ConditionTask {
  property: Option<String>,
  value: Option<String>,
  otherwise: Option<String>,
  condition: NestedCondition,
}

impl Configurable for ConditionTask {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<ConditionTask>("condition")
        .text("property", |t, v| t.property = Some(v))
        .text("value", |t, v| t.value = Some(v))
        .text("else", |t, v| t.otherwise = Some(v))
        .accepts(Role::Condition, |t, c| t.condition.set(c))
        .build()
    });
    &SCHEMA
  }

  fn as_step(&mut self) -> Option<&mut dyn Step> {
    Some(self)
  }
}

impl Step for ConditionTask {
  fn execute(&mut self, ctx: &StepContext<'_>) -> Result<(), StepError> {
    let property = self
      .property
      .as_deref()
      .ok_or_else(|| StepError::fatal("The property attribute is required."))?;
    let outcome = self
      .condition
      .evaluate(ctx)?
      .ok_or_else(|| StepError::fatal("You must nest a condition into <condition>"))?;

    let value = if outcome {
      Some(self.value.as_deref().unwrap_or("true"))
    } else {
      self.otherwise.as_deref()
    };

    if let Some(value) = value {
      if ctx.properties().set(property, value) {
        ctx.verbose(format!("Condition true; setting {property} to {value}"));
      } else {
        ctx.verbose(format!("Override ignored for property \"{property}\""));
      }
    } else {
      ctx.verbose(format!("Condition false; not setting {property}"));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::super::testing::{project, run};
  use crate::node::DeclNode;
  use tempfile::TempDir;

  fn condition(property: &str, test_property: &str) -> DeclNode {
    DeclNode::new("condition")
      .with_attr("property", property)
      .with_child(DeclNode::new("isset").with_attr("property", test_property))
  }

  #[test]
  fn sets_value_when_condition_holds() {
    let temp = TempDir::new().unwrap();
    let (project, _) = project(temp.path());
    project.properties().set("present", "x");

    run(&project, &condition("result", "present").with_attr("value", "yes")).unwrap();
    assert_eq!(project.properties().get("result").as_deref(), Some("yes"));

    run(&project, &condition("defaulted", "present")).unwrap();
    assert_eq!(project.properties().get("defaulted").as_deref(), Some("true"));
  }

  #[test]
  fn uses_else_or_leaves_unset() {
    let temp = TempDir::new().unwrap();
    let (project, _) = project(temp.path());

    run(&project, &condition("unset", "absent")).unwrap();
    assert!(!project.properties().contains("unset"));

    run(&project, &condition("fallback", "absent").with_attr("else", "no")).unwrap();
    assert_eq!(project.properties().get("fallback").as_deref(), Some("no"));
  }

  #[test]
  fn requires_nested_condition() {
    let temp = TempDir::new().unwrap();
    let (project, _) = project(temp.path());
    let err = run(&project, &DeclNode::new("condition").with_attr("property", "p")).unwrap_err();
    assert!(err.to_string().contains("nest a condition"));
  }
}
