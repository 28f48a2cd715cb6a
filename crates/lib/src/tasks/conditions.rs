//! Built-in conditions.

use std::path::PathBuf;
use std::sync::LazyLock;

use crate::component::{Condition, Configurable};
use crate::configure::{Schema, parse_bool};
use crate::registry::Role;
use crate::step::{StepContext, StepError};

/// `<isset property="..."/>`: true when the property is bound.
#[derive(Debug, Default, Clone)]
pub struct IsSet {
  property: Option<String>,
}

impl Configurable for IsSet {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<IsSet>("isset")
        .text("property", |c, v| c.property = Some(v))
        .shareable()
        .build()
    });
    &SCHEMA
  }

  fn as_condition(&self) -> Option<&dyn Condition> {
    Some(self)
  }
}

impl Condition for IsSet {
  fn evaluate(&self, ctx: &StepContext<'_>) -> Result<bool, StepError> {
    let property = self
      .property
      .as_deref()
      .ok_or_else(|| StepError::fatal("isset: the 'property' attribute is required"))?;
    Ok(ctx.properties().contains(property))
  }
}

/// `<istrue value="..."/>`: true for `true`, `yes` or `on`.
#[derive(Debug, Default, Clone)]
pub struct IsTrue {
  value: Option<String>,
}

impl Configurable for IsTrue {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<IsTrue>("istrue")
        .text("value", |c, v| c.value = Some(v))
        .shareable()
        .build()
    });
    &SCHEMA
  }

  fn as_condition(&self) -> Option<&dyn Condition> {
    Some(self)
  }
}

impl Condition for IsTrue {
  fn evaluate(&self, _ctx: &StepContext<'_>) -> Result<bool, StepError> {
    let value = self
      .value
      .as_deref()
      .ok_or_else(|| StepError::fatal("istrue: the 'value' attribute is required"))?;
    Ok(parse_bool(value).unwrap_or(false))
  }
}

/// `<equals arg1="..." arg2="..."/>`.
#[derive(Debug, Clone)]
pub struct Equals {
  arg1: Option<String>,
  arg2: Option<String>,
  case_sensitive: bool,
  trim: bool,
}

impl Default for Equals {
  fn default() -> Self {
    Self {
      arg1: None,
      arg2: None,
      case_sensitive: true,
      trim: false,
    }
  }
}

impl Configurable for Equals {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<Equals>("equals")
        .text("arg1", |c, v| c.arg1 = Some(v))
        .text("arg2", |c, v| c.arg2 = Some(v))
        .boolean("casesensitive", |c, v| c.case_sensitive = v)
        .boolean("trim", |c, v| c.trim = v)
        .shareable()
        .build()
    });
    &SCHEMA
  }

  fn as_condition(&self) -> Option<&dyn Condition> {
    Some(self)
  }
}

impl Condition for Equals {
  fn evaluate(&self, _ctx: &StepContext<'_>) -> Result<bool, StepError> {
    let (Some(a), Some(b)) = (&self.arg1, &self.arg2) else {
      return Err(StepError::fatal("equals: both 'arg1' and 'arg2' are required"));
    };
    let (a, b) = if self.trim { (a.trim(), b.trim()) } else { (a.as_str(), b.as_str()) };
    Ok(if self.case_sensitive {
      a == b
    } else {
      a.to_lowercase() == b.to_lowercase()
    })
  }
}

/// `<available file="..."/>`: true when the path exists.
#[derive(Debug, Default, Clone)]
pub struct Available {
  file: Option<PathBuf>,
  kind: Option<String>,
}

impl Configurable for Available {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<Available>("available")
        .path("file", |c, v| c.file = Some(v))
        .enumerated("type", &["file", "dir"], |c, v| c.kind = Some(v))
        .shareable()
        .build()
    });
    &SCHEMA
  }

  fn as_condition(&self) -> Option<&dyn Condition> {
    Some(self)
  }
}

impl Condition for Available {
  fn evaluate(&self, ctx: &StepContext<'_>) -> Result<bool, StepError> {
    let file = self
      .file
      .as_deref()
      .ok_or_else(|| StepError::fatal("available: the 'file' attribute is required"))?;
    let path = ctx.resolve_path(file);
    Ok(match self.kind.as_deref() {
      Some("file") => path.is_file(),
      Some("dir") => path.is_dir(),
      _ => path.exists(),
    })
  }
}

/// `<not>` around exactly one condition.
#[derive(Default)]
pub struct Not {
  inner: Option<Box<dyn Configurable>>,
}

impl Configurable for Not {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<Not>("not")
        .accepts(Role::Condition, |c, inner| {
          if c.inner.is_some() {
            return Err("'not' accepts exactly one condition".to_string());
          }
          c.inner = Some(inner);
          Ok(())
        })
        .build()
    });
    &SCHEMA
  }

  fn as_condition(&self) -> Option<&dyn Condition> {
    Some(self)
  }
}

impl Condition for Not {
  fn evaluate(&self, ctx: &StepContext<'_>) -> Result<bool, StepError> {
    let inner = self
      .inner
      .as_deref()
      .ok_or_else(|| StepError::fatal("'not' requires a nested condition"))?;
    Ok(!ctx.evaluate(inner)?)
  }
}

/// `<and>`: true when every nested condition is, evaluated in order until one is false.
#[derive(Default)]
pub struct And {
  conditions: Vec<Box<dyn Configurable>>,
}

impl Configurable for And {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<And>("and")
        .accepts(Role::Condition, |c, inner| {
          c.conditions.push(inner);
          Ok(())
        })
        .build()
    });
    &SCHEMA
  }

  fn as_condition(&self) -> Option<&dyn Condition> {
    Some(self)
  }
}

impl Condition for And {
  fn evaluate(&self, ctx: &StepContext<'_>) -> Result<bool, StepError> {
    for condition in &self.conditions {
      if !ctx.evaluate(condition.as_ref())? {
        return Ok(false);
      }
    }
    Ok(true)
  }
}

/// `<or>`: true as soon as one nested condition is.
#[derive(Default)]
pub struct Or {
  conditions: Vec<Box<dyn Configurable>>,
}

impl Configurable for Or {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<Or>("or")
        .accepts(Role::Condition, |c, inner| {
          c.conditions.push(inner);
          Ok(())
        })
        .build()
    });
    &SCHEMA
  }

  fn as_condition(&self) -> Option<&dyn Condition> {
    Some(self)
  }
}

impl Condition for Or {
  fn evaluate(&self, ctx: &StepContext<'_>) -> Result<bool, StepError> {
    for condition in &self.conditions {
      if ctx.evaluate(condition.as_ref())? {
        return Ok(true);
      }
    }
    Ok(false)
  }
}
