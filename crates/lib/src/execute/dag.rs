//! Execution DAG for parallel target scheduling.
//!
//! Built from a resolved order, the DAG groups targets into waves: every
//! target of a wave has all its dependencies in earlier waves, so the
//! targets of one wave can run concurrently.

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use super::types::ResolveError;
use crate::project::{IMPLICIT_TARGET, Project};

/// Dependency graph over the targets of one build.
pub struct TargetDag {
  graph: DiGraph<String, ()>,
  nodes: HashMap<String, NodeIndex>,
  /// Position of each target in the resolved order.
  position: HashMap<String, usize>,
}

impl TargetDag {
  /// Build the DAG for `order`, which must come from
  /// [`resolve_order`](super::resolve_order).
  ///
  /// Edges run from dependency to dependent. The implicit target, when
  /// present, is a dependency of every other target.
  pub fn from_order(project: &Project, order: &[String]) -> Self {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();
    let mut position = HashMap::new();

    for (i, name) in order.iter().enumerate() {
      let idx = graph.add_node(name.clone());
      nodes.insert(name.clone(), idx);
      position.insert(name.clone(), i);
    }

    let implicit = nodes.get(IMPLICIT_TARGET).copied();

    for name in order {
      let dependent = nodes[name];
      if let Some(target) = project.target(name) {
        for dep in target.depends() {
          if let Some(&dep_idx) = nodes.get(dep) {
            graph.add_edge(dep_idx, dependent, ());
          }
        }
      }
      if let Some(implicit_idx) = implicit
        && implicit_idx != dependent
      {
        graph.add_edge(implicit_idx, dependent, ());
      }
    }

    Self { graph, nodes, position }
  }

  /// Direct dependencies of `name` inside this build.
  pub fn dependencies(&self, name: &str) -> Vec<String> {
    let Some(&idx) = self.nodes.get(name) else {
      return Vec::new();
    };
    self
      .graph
      .neighbors_directed(idx, Direction::Incoming)
      .map(|dep| self.graph[dep].clone())
      .collect()
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// Group targets into waves of mutually independent targets.
  ///
  /// Within a wave, targets keep their resolved order.
  pub fn waves(&self) -> Result<Vec<Vec<String>>, ResolveError> {
    // Kahn's algorithm, one level at a time
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();
    let mut remaining: HashSet<NodeIndex> = self.graph.node_indices().collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let mut ready: Vec<NodeIndex> = remaining.iter().filter(|&&idx| in_degree[&idx] == 0).copied().collect();

      if ready.is_empty() {
        let mut cycle: Vec<String> = remaining.iter().map(|idx| self.graph[*idx].clone()).collect();
        cycle.sort_by_key(|name| self.position[name]);
        return Err(ResolveError::Cycle { cycle });
      }

      ready.sort_by_key(|idx| self.position[&self.graph[*idx]]);
      for &idx in &ready {
        remaining.remove(&idx);
        for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
          if let Some(deg) = in_degree.get_mut(&dependent) {
            *deg = deg.saturating_sub(1);
          }
        }
      }

      waves.push(ready.into_iter().map(|idx| self.graph[idx].clone()).collect());
    }

    Ok(waves)
  }
}
