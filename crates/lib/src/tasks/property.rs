use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use tracing::debug;

use crate::component::Configurable;
use crate::configure::Schema;
use crate::placeholder::{self, Segment};
use crate::property::{PropertyError, read_properties};
use crate::step::{Step, StepContext, StepError};

/// `<property>` binds one property, imports a properties file or imports the
/// process environment. Bindings are write-once, so a step never changes a
/// property that is already set.
#[derive(Debug, Default)]
pub struct Property {
  name: Option<String>,
  value: Option<String>,
  location: Option<PathBuf>,
  file: Option<PathBuf>,
  prefix: Option<String>,
  environment: Option<String>,
}

impl Configurable for Property {
  fn schema(&self) -> &'static Schema {
    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
      Schema::builder::<Property>("property")
        .text("name", |p, v| p.name = Some(v))
        .text("value", |p, v| p.value = Some(v))
        .path("location", |p, v| p.location = Some(v))
        .path("file", |p, v| p.file = Some(v))
        .text("prefix", |p, v| p.prefix = Some(v))
        .text("environment", |p, v| p.environment = Some(v))
        .text_content(|p, v| p.value.get_or_insert_with(String::new).push_str(&v))
        .build()
    });
    &SCHEMA
  }

  fn as_step(&mut self) -> Option<&mut dyn Step> {
    Some(self)
  }
}

impl Property {
  fn set_named(&self, ctx: &StepContext<'_>, name: &str) -> Result<(), StepError> {
    let value = match (&self.value, &self.location) {
      (Some(value), _) => value.clone(),
      (None, Some(location)) => ctx.resolve_path(location).display().to_string(),
      (None, None) => {
        return Err(StepError::fatal(
          "You must specify value or location when setting a named property",
        ));
      }
    };
    if !ctx.properties().set(name, value) {
      ctx.verbose(format!("Override ignored for property \"{name}\""));
    }
    Ok(())
  }

  fn import_file(&self, ctx: &StepContext<'_>, file: &Path) -> Result<(), StepError> {
    let path = ctx.resolve_path(file);
    let raw = match read_properties(&path) {
      Ok(raw) => raw,
      Err(PropertyError::ReadFile { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
        return Err(StepError::recoverable(format!(
          "Unable to find property file: {}",
          path.display()
        )));
      }
      Err(e) => return Err(e.into()),
    };
    ctx.verbose(format!("Loading {}", path.display()));
    let raw = match self.prefix.as_deref().map(|p| p.trim_end_matches('.')) {
      Some(prefix) if !prefix.is_empty() => with_prefix(raw, prefix)?,
      _ => raw,
    };
    ctx
      .properties()
      .load_and_resolve(&raw, &path.display().to_string())?;
    Ok(())
  }

  fn import_environment(&self, ctx: &StepContext<'_>, prefix: &str) {
    let prefix = prefix.trim_end_matches('.');
    let mut count = 0;
    // Names that are not UTF-8 are skipped; values are converted lossily.
    for (name, value) in std::env::vars_os() {
      let name = match name.into_string() {
        Ok(name) => name,
        Err(name) => {
          debug!(name = ?name, "skipping environment variable with non UTF-8 name");
          continue;
        }
      };
      if ctx.properties().set(format!("{prefix}.{name}"), value.to_string_lossy()) {
        count += 1;
      }
    }
    debug!(prefix = %prefix, count, "imported environment");
  }
}

/// Prefix every name of `raw`, along with references between its entries.
fn with_prefix(raw: Vec<(String, String)>, prefix: &str) -> Result<Vec<(String, String)>, PropertyError> {
  let names: HashSet<String> = raw.iter().map(|(name, _)| name.clone()).collect();
  raw
    .into_iter()
    .map(|(name, value)| {
      let mut out = String::with_capacity(value.len());
      for segment in placeholder::parse(&value)? {
        match segment {
          Segment::Literal(text) => out.push_str(&placeholder::escape(&text)),
          Segment::Property(reference) if names.contains(&reference) => {
            out.push_str(&format!("${{{prefix}.{reference}}}"))
          }
          Segment::Property(reference) => out.push_str(&format!("${{{reference}}}")),
        }
      }
      Ok((format!("{prefix}.{name}"), out))
    })
    .collect()
}

impl Step for Property {
  fn execute(&mut self, ctx: &StepContext<'_>) -> Result<(), StepError> {
    if let Some(name) = &self.name {
      return self.set_named(ctx, name);
    }
    if let Some(file) = &self.file {
      return self.import_file(ctx, file);
    }
    if let Some(prefix) = &self.environment {
      self.import_environment(ctx, prefix);
      return Ok(());
    }
    Err(StepError::fatal(
      "You must specify name, file or environment on <property>",
    ))
  }
}
