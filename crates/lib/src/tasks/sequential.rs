use std::sync::LazyLock;

use crate::component::Configurable;
use crate::configure::Schema;
use crate::node::DeclNode;
use crate::step::{Step, StepContext, StepError};

/// `<sequential>` keeps its children unconfigured and runs them as steps, in
/// order, when it executes. Properties set by earlier children are visible to
/// later ones.
#[derive(Debug, Default)]
pub struct Sequential {
  children: Vec<DeclNode>,
}

impl Configurable for Sequential {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<Sequential>("sequential")
        .dynamic(|s, node| {
          s.children.push(node.clone());
          Ok(())
        })
        .build()
    });
    &SCHEMA
  }

  fn as_step(&mut self) -> Option<&mut dyn Step> {
    Some(self)
  }
}

impl Step for Sequential {
  fn execute(&mut self, ctx: &StepContext<'_>) -> Result<(), StepError> {
    for child in &self.children {
      if ctx.is_aborted() {
        return Err(StepError::fatal("build aborted"));
      }
      ctx.run_nested(child)?;
    }
    Ok(())
  }
}
