//! Execution order for requested targets.
//!
//! Depth-first over dependency edges: dependencies come before the target
//! that names them, every target is visited at most once and the first path
//! that reaches a target decides its position.

use std::collections::HashMap;

use tracing::debug;

use super::types::ResolveError;
use crate::project::{IMPLICIT_TARGET, Project};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
  Visiting,
  Visited,
}

struct Walk<'p> {
  project: &'p Project,
  marks: HashMap<&'p str, Mark>,
  stack: Vec<&'p str>,
}

impl<'p> Walk<'p> {
  fn visit(&mut self, name: &'p str, used_from: Option<&'p str>, out: &mut Vec<String>) -> Result<(), ResolveError> {
    let target = match self.project.target(name) {
      Some(target) if name != IMPLICIT_TARGET => target,
      _ => {
        return Err(ResolveError::UnknownTarget {
          name: name.to_string(),
          used_from: used_from.map(str::to_string),
        });
      }
    };

    self.marks.insert(name, Mark::Visiting);
    self.stack.push(name);

    for dep in target.depends() {
      match self.marks.get(dep.as_str()) {
        None => self.visit(dep, Some(name), out)?,
        Some(Mark::Visiting) => return Err(self.cycle_through(dep)),
        Some(Mark::Visited) => {}
      }
    }

    self.stack.pop();
    self.marks.insert(name, Mark::Visited);
    out.push(name.to_string());
    Ok(())
  }

  /// `dep <- ... <- dep`, reading the stack from the innermost target.
  fn cycle_through(&self, dep: &str) -> ResolveError {
    let mut cycle = vec![dep.to_string()];
    for name in self.stack.iter().rev() {
      cycle.push(name.to_string());
      if *name == dep {
        break;
      }
    }
    ResolveError::Cycle { cycle }
  }
}

/// Compute the execution order for `requested`.
///
/// An empty request uses the project's default target. The implicit target
/// comes first when it holds steps. Every other target of the project is
/// checked too, so cycles and dangling dependencies are reported even when
/// the request does not reach them.
pub fn resolve_order(project: &Project, requested: &[String]) -> Result<Vec<String>, ResolveError> {
  let roots: Vec<&str> = if requested.is_empty() {
    vec![project.default_target().ok_or(ResolveError::NoTarget)?]
  } else {
    requested.iter().map(String::as_str).collect()
  };

  let mut walk = Walk {
    project,
    marks: HashMap::new(),
    stack: Vec::new(),
  };

  let mut order = Vec::new();
  if !project.implicit_target().steps().is_empty() {
    order.push(IMPLICIT_TARGET.to_string());
  }

  for root in roots {
    if !walk.marks.contains_key(root) {
      walk.visit(root, None, &mut order)?;
    }
  }

  let mut unreached = Vec::new();
  for target in project.targets() {
    if !walk.marks.contains_key(target.name()) {
      walk.visit(target.name(), None, &mut unreached)?;
    }
  }

  debug!(order = ?order, unreached = unreached.len(), "resolved build order");
  Ok(order)
}
