//! Build documents: YAML files describing a project.
//!
//! ```yaml
//! project: demo
//! default: package
//! properties:
//!   version: "1.0"
//! targets:
//!   - name: package
//!     depends: [build]
//!     steps:
//!       - echo: "packaging ${version}"
//! ```
//!
//! Loading seeds properties in a fixed order, so the first binding of each
//! name wins: user properties, property files, built-in properties, then the
//! document's own `properties`.

mod nodes;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::node::Location;
use crate::project::{Project, ProjectError, Target};
use crate::property::{PropertyError, read_properties};
use crate::registry::{DeploymentError, LibraryBundle, Registry};
use crate::tasks::builtin_loader;

use nodes::{Origin, scalar_text, step_node};

/// Default document name looked up by the CLI.
pub const DEFAULT_DOCUMENT: &str = "build.yaml";

/// Errors raised while loading a document into a project.
#[derive(Debug, Error)]
pub enum DocumentError {
  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {name}: {source}")]
  Parse {
    name: String,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("{location}: {message}")]
  Invalid { location: Location, message: String },

  #[error(transparent)]
  Property(#[from] PropertyError),

  #[error(transparent)]
  Deployment(#[from] DeploymentError),

  #[error(transparent)]
  Project(#[from] ProjectError),
}

impl DocumentError {
  /// Process exit status for document errors.
  pub fn exit_code(&self) -> i32 {
    3
  }
}

/// Inputs seeded into a project before its document is read.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
  /// `-D` style definitions; they take precedence over everything else.
  pub user_properties: Vec<(String, String)>,

  /// Properties files imported after the user properties.
  pub property_files: Vec<PathBuf>,

  /// Library descriptors resolved by the built-in loader.
  pub libraries: Vec<PathBuf>,

  /// Further library bundles with their own loaders.
  pub bundles: Vec<LibraryBundle>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
  project: Option<String>,
  default: Option<String>,
  basedir: Option<String>,
  description: Option<String>,
  #[serde(default)]
  properties: Mapping,
  #[serde(default)]
  libraries: Vec<String>,
  #[serde(default)]
  steps: Vec<Value>,
  #[serde(default)]
  targets: Vec<TargetDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TargetDecl {
  name: String,
  description: Option<String>,
  #[serde(default)]
  depends: Depends,
  #[serde(rename = "if")]
  if_set: Option<String>,
  unless: Option<String>,
  #[serde(default)]
  steps: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Depends {
  List(Vec<String>),
  Text(String),
}

impl Default for Depends {
  fn default() -> Self {
    Depends::List(Vec::new())
  }
}

impl Depends {
  fn names(&self) -> Vec<String> {
    match self {
      Depends::List(names) => names.iter().map(|n| n.trim().to_string()).collect(),
      Depends::Text(text) if text.trim().is_empty() => Vec::new(),
      Depends::Text(text) => text.split(',').map(|n| n.trim().to_string()).collect(),
    }
  }
}

/// Load the document at `path`.
pub fn load_project(path: &Path, options: &LoadOptions) -> Result<Project, DocumentError> {
  let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  let file = dunce::canonicalize(path).map_err(|source| DocumentError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
  info!(path = %file.display(), "loading build document");
  build(&text, &dir, Some(&file), options)
}

/// Load a document held in memory; relative paths use `base_dir`.
pub fn load_project_str(text: &str, base_dir: &Path, options: &LoadOptions) -> Result<Project, DocumentError> {
  build(text, base_dir, None, options)
}

fn build(text: &str, doc_dir: &Path, file: Option<&Path>, options: &LoadOptions) -> Result<Project, DocumentError> {
  let name = file.map_or_else(|| "<inline>".to_string(), |f| f.display().to_string());
  let doc: Document = serde_yaml::from_str(text).map_err(|source| DocumentError::Parse { name, source })?;
  let origin = Origin { source: file };

  let project_name = doc
    .project
    .clone()
    .or_else(|| file.and_then(Path::file_stem).map(|s| s.to_string_lossy().into_owned()))
    .unwrap_or_else(|| "anvil".to_string());

  let user_properties = collapse_user_properties(&options.user_properties);
  let base_dir = base_dir(&doc, doc_dir, &user_properties);
  let builtins = Arc::new(Registry::with_builtins()?);
  let mut project = Project::new(project_name, base_dir, Registry::child(builtins));
  if let Some(file) = file {
    project.set_file(file);
  }
  if let Some(default) = &doc.default {
    project.set_default_target(default.clone());
  }
  if let Some(description) = &doc.description {
    project.set_description(description.clone());
  }

  for (key, value) in user_properties {
    project.properties().set_user(key, value);
  }
  for path in &options.property_files {
    let raw = read_properties(path)?;
    project.properties().load_and_resolve(&raw, &path.display().to_string())?;
  }
  project.set_builtin_properties();

  deploy_libraries(&mut project, &doc, origin, options)?;

  let raw = document_properties(&doc.properties, origin)?;
  project.properties().load_and_resolve(&raw, "properties")?;

  for (i, step) in doc.steps.iter().enumerate() {
    project.add_implicit_step(step_node(origin, step, &format!("steps[{i}]"))?);
  }

  for (i, decl) in doc.targets.iter().enumerate() {
    let target = target(decl, origin, i)?;
    project.add_target(target)?;
  }

  debug!(
    project = %project.name(),
    targets = project.targets().len(),
    implicit_steps = project.implicit_target().steps().len(),
    "loaded project"
  );
  Ok(project)
}

/// Command-line definitions with only the last value of a repeated name,
/// in order of first appearance.
fn collapse_user_properties(defines: &[(String, String)]) -> Vec<(&str, &str)> {
  let mut collapsed: Vec<(&str, &str)> = Vec::with_capacity(defines.len());
  for (name, value) in defines {
    match collapsed.iter_mut().find(|(seen, _)| *seen == name.as_str()) {
      Some(entry) => entry.1 = value.as_str(),
      None => collapsed.push((name.as_str(), value.as_str())),
    }
  }
  collapsed
}

/// `basedir` from a user property, else the document's `basedir` relative to
/// its directory, else the document's directory.
fn base_dir(doc: &Document, doc_dir: &Path, user_properties: &[(&str, &str)]) -> PathBuf {
  let user = user_properties
    .iter()
    .find(|(name, _)| *name == "basedir")
    .map(|(_, value)| *value);
  let path = match user.or(doc.basedir.as_deref()) {
    Some(dir) => doc_dir.join(dir),
    None => doc_dir.to_path_buf(),
  };
  dunce::canonicalize(&path).unwrap_or(path)
}

fn deploy_libraries(
  project: &mut Project,
  doc: &Document,
  origin: Origin<'_>,
  options: &LoadOptions,
) -> Result<(), DocumentError> {
  let mut descriptors: Vec<PathBuf> = options.libraries.clone();
  for (i, raw) in doc.libraries.iter().enumerate() {
    let resolved = project
      .properties()
      .resolve(raw)
      .map_err(|e| origin.invalid(&format!("libraries[{i}]"), e.to_string()))?;
    descriptors.push(project.base_dir().join(resolved));
  }

  for path in descriptors {
    let count = project
      .registry_mut()
      .deploy_library_file(&path, builtin_loader(), true)?;
    info!(library = %path.display(), count, "deployed library");
  }
  for bundle in &options.bundles {
    project.registry_mut().deploy_library(bundle, true)?;
  }
  Ok(())
}

fn document_properties(map: &Mapping, origin: Origin<'_>) -> Result<Vec<(String, String)>, DocumentError> {
  map
    .iter()
    .map(|(key, value)| {
      let key = scalar_text(key).ok_or_else(|| origin.invalid("properties", "property names must be scalars"))?;
      let value = match value {
        Value::Null => String::new(),
        other => scalar_text(other)
          .ok_or_else(|| origin.invalid(&format!("properties.{key}"), "property values must be scalars"))?,
      };
      Ok((key, value))
    })
    .collect()
}

fn target(decl: &TargetDecl, origin: Origin<'_>, index: usize) -> Result<Target, DocumentError> {
  let path = format!("targets[{}]", if decl.name.is_empty() { index.to_string() } else { decl.name.clone() });

  let depends = decl.depends.names();
  if depends.iter().any(String::is_empty) {
    return Err(origin.invalid(&path, "empty name in 'depends'"));
  }

  let mut target = Target::new(decl.name.clone()).depends_on(depends);
  if let Some(test) = &decl.if_set {
    target = target.only_if(test.clone());
  }
  if let Some(test) = &decl.unless {
    target = target.unless(test.clone());
  }
  if let Some(description) = &decl.description {
    target = target.describe(description.clone());
  }
  for (i, step) in decl.steps.iter().enumerate() {
    target = target.step(step_node(origin, step, &format!("{path}.steps[{i}]"))?);
  }
  Ok(target)
}
