//! Implementation of the `anvil targets` command.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use anvil_lib::document::{LoadOptions, load_project};
use anvil_lib::project::Target;
use anvil_lib::registry::Role;

use crate::output::{print_json, print_stat, symbols};

#[derive(Serialize)]
struct TargetsOutput<'a> {
  project: &'a str,
  description: Option<&'a str>,
  default: Option<&'a str>,
  targets: Vec<TargetEntry<'a>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  types: Option<Vec<TypeEntry>>,
}

#[derive(Serialize)]
struct TargetEntry<'a> {
  name: &'a str,
  description: Option<&'a str>,
  depends: &'a [String],
}

#[derive(Serialize)]
struct TypeEntry {
  role: Role,
  name: String,
}

/// List targets; targets with a description are the main targets.
///
/// Other targets are shown only with `verbose`.
pub fn cmd_targets(file: &Path, options: &LoadOptions, json: bool, types: bool, verbose: bool) -> Result<()> {
  let project =
    load_project(file, options).with_context(|| format!("Failed to load build document: {}", file.display()))?;

  let definitions = types.then(|| {
    project
      .registry()
      .definitions()
      .into_iter()
      .map(|(role, name)| TypeEntry { role, name })
      .collect::<Vec<_>>()
  });

  if json {
    return print_json(&TargetsOutput {
      project: project.name(),
      description: project.description(),
      default: project.default_target(),
      targets: project
        .targets()
        .iter()
        .map(|t| TargetEntry {
          name: t.name(),
          description: t.description(),
          depends: t.depends(),
        })
        .collect(),
      types: definitions,
    });
  }

  if let Some(description) = project.description() {
    println!("{description}");
    println!();
  }

  let (main, other): (Vec<&Target>, Vec<&Target>) = project.targets().iter().partition(|t| t.description().is_some());
  let width = project.targets().iter().map(|t| t.name().len()).max().unwrap_or(0);

  println!("Main targets:");
  if main.is_empty() {
    println!("  (none)");
  }
  for target in &main {
    println!(
      "  {:<width$}  {}",
      target.name(),
      target.description().unwrap_or_default()
    );
  }

  if verbose && !other.is_empty() {
    println!();
    println!("Other targets:");
    for target in &other {
      println!("  {}", target.name());
    }
  }

  if let Some(default) = project.default_target() {
    println!();
    print_stat("Default target", default);
  }

  if let Some(definitions) = definitions {
    println!();
    println!("Registered types:");
    for entry in definitions {
      println!("  {} {:<9} {}", symbols::NOTE, entry.role, entry.name);
    }
  }
  Ok(())
}
