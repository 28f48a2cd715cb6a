use std::sync::LazyLock;

use super::condition::NestedCondition;
use crate::component::Configurable;
use crate::configure::Schema;
use crate::project::RunCondition;
use crate::step::{Step, StepContext, StepError};

const DEFAULT_MESSAGE: &str = "No message";

/// `<fail>` stops the build, optionally only when a property or nested
/// condition says so.
#[derive(Default)]
pub struct Fail {
  message: Option<String>,
  gate: RunCondition,
  condition: NestedCondition,
}

impl Fail {
  fn append_message(&mut self, text: String) {
    match &mut self.message {
      Some(message) => message.push_str(&text),
      None => self.message = Some(text),
    }
  }

  fn should_fail(&self, ctx: &StepContext<'_>) -> Result<bool, StepError> {
    if !self.gate.allows(ctx.properties())? {
      return Ok(false);
    }
    Ok(self.condition.evaluate(ctx)?.unwrap_or(true))
  }
}

impl Configurable for Fail {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<Fail>("fail")
        .text("message", |f, v| f.message = Some(v))
        .text("if", |f, v| f.gate.if_set = Some(v))
        .text("unless", |f, v| f.gate.unless_set = Some(v))
        .text_element("message", Fail::append_message)
        .text_content(Fail::append_message)
        .creator("condition", |f| &mut f.condition)
        .build()
    });
    &SCHEMA
  }

  fn as_step(&mut self) -> Option<&mut dyn Step> {
    Some(self)
  }
}

impl Step for Fail {
  fn execute(&mut self, ctx: &StepContext<'_>) -> Result<(), StepError> {
    if !self.should_fail(ctx)? {
      return Ok(());
    }
    let message = match self.message.as_deref().map(str::trim) {
      Some(text) if !text.is_empty() => text.to_string(),
      _ if !self.condition.is_empty() => "condition satisfied".to_string(),
      _ => DEFAULT_MESSAGE.to_string(),
    };
    Err(StepError::fatal(message))
  }
}
