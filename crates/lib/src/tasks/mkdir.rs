use std::path::PathBuf;
use std::sync::LazyLock;

use crate::component::Configurable;
use crate::configure::Schema;
use crate::step::{Step, StepContext, StepError};

/// `<mkdir dir="..."/>` creates a directory and its parents.
#[derive(Debug, Default)]
pub struct Mkdir {
  dir: Option<PathBuf>,
}

impl Configurable for Mkdir {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> =
      LazyLock::new(|| Schema::builder::<Mkdir>("mkdir").path("dir", |m, v| m.dir = Some(v)).build());
    &SCHEMA
  }

  fn as_step(&mut self) -> Option<&mut dyn Step> {
    Some(self)
  }
}

impl Step for Mkdir {
  fn execute(&mut self, ctx: &StepContext<'_>) -> Result<(), StepError> {
    let dir = self
      .dir
      .as_deref()
      .ok_or_else(|| StepError::fatal("dir attribute is required"))?;
    let dir = ctx.resolve_path(dir);

    if dir.is_file() {
      return Err(StepError::fatal(format!(
        "Unable to create directory as a file already exists with that name: {}",
        dir.display()
      )));
    }
    if dir.is_dir() {
      return Ok(());
    }
    std::fs::create_dir_all(&dir).map_err(|e| StepError::io(format!("Directory {} creation failed", dir.display()), e))?;
    ctx.info(format!("Created dir: {}", dir.display()));
    Ok(())
  }
}
