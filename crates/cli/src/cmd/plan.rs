//! Implementation of the `anvil plan` command.
//!
//! Resolves the requested targets and prints the execution order and the
//! waves a parallel run would use, without running any step.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use anvil_lib::document::{LoadOptions, load_project};
use anvil_lib::execute::{TargetDag, resolve_order};

use crate::output::{print_json, print_stat, symbols, target_label};

#[derive(Serialize)]
struct PlanOutput<'a> {
  project: &'a str,
  requested: &'a [String],
  order: &'a [String],
  waves: &'a [Vec<String>],
}

pub fn cmd_plan(file: &Path, options: &LoadOptions, targets: &[String], json: bool) -> Result<()> {
  let project =
    load_project(file, options).with_context(|| format!("Failed to load build document: {}", file.display()))?;

  let order = resolve_order(&project, targets)?;
  let waves = TargetDag::from_order(&project, &order).waves()?;

  if json {
    return print_json(&PlanOutput {
      project: project.name(),
      requested: targets,
      order: &order,
      waves: &waves,
    });
  }

  println!("Plan for {}:", project.name());
  for (i, name) in order.iter().enumerate() {
    println!("  {:>2}. {}", i + 1, target_label(name));
  }
  println!();
  print_stat("Targets", &order.len().to_string());
  print_stat("Waves", &waves.len().to_string());
  for (i, wave) in waves.iter().enumerate() {
    let names: Vec<&str> = wave.iter().map(|n| target_label(n)).collect();
    println!("    {} wave {}: {}", symbols::ARROW, i + 1, names.join(", "));
  }
  Ok(())
}
