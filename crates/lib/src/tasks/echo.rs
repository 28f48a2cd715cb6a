use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::component::Configurable;
use crate::configure::Schema;
use crate::execute::listener::MessageLevel;
use crate::step::{Step, StepContext, StepError};

/// `<echo>` logs a message or writes it to a file.
#[derive(Debug)]
pub struct Echo {
  message: String,
  level: MessageLevel,
  file: Option<PathBuf>,
  append: bool,
}

impl Default for Echo {
  fn default() -> Self {
    Self {
      message: String::new(),
      level: MessageLevel::Warning,
      file: None,
      append: false,
    }
  }
}

impl Configurable for Echo {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<Echo>("echo")
        .text("message", |e, v| e.message = v)
        .enumerated("level", MessageLevel::NAMES, |e, v| {
          e.level = MessageLevel::from_name(&v).unwrap_or(MessageLevel::Warning)
        })
        .path("file", |e, v| e.file = Some(v))
        .boolean("append", |e, v| e.append = v)
        .text_content(|e, v| e.message.push_str(&v))
        .build()
    });
    &SCHEMA
  }

  fn as_step(&mut self) -> Option<&mut dyn Step> {
    Some(self)
  }
}

impl Step for Echo {
  fn execute(&mut self, ctx: &StepContext<'_>) -> Result<(), StepError> {
    match &self.file {
      None => {
        ctx.log(self.level, self.message.clone());
        Ok(())
      }
      Some(file) => {
        let path = ctx.resolve_path(file);
        debug!(path = %path.display(), append = self.append, "echo to file");
        if self.append {
          append_to(&path, &self.message)
        } else {
          replace(&path, &self.message)
        }
      }
    }
  }
}

fn append_to(path: &Path, message: &str) -> Result<(), StepError> {
  let mut file = OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .map_err(|e| StepError::io(format!("cannot open {}", path.display()), e))?;
  file
    .write_all(message.as_bytes())
    .map_err(|e| StepError::io(format!("cannot write {}", path.display()), e))
}

/// Write through a temporary file next to `path` so readers never see a
/// partial message.
fn replace(path: &Path, message: &str) -> Result<(), StepError> {
  let dir = path.parent().unwrap_or_else(|| Path::new("."));
  let mut temp =
    NamedTempFile::new_in(dir).map_err(|e| StepError::io(format!("cannot write {}", path.display()), e))?;
  temp
    .write_all(message.as_bytes())
    .map_err(|e| StepError::io(format!("cannot write {}", path.display()), e))?;
  temp
    .persist(path)
    .map_err(|e| StepError::io(format!("cannot replace {}", path.display()), e.error))?;
  Ok(())
}
