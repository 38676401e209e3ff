//! Community detection.
//!
//! [`Louvain`] greedily moves nodes between communities while modularity
//! improves, then collapses each community into a single node and repeats.
//! [`NoPartition`] is the stand-in used when community detection is turned
//! off; it labels every node `-1`.

use std::collections::BTreeMap;

use super::MetricsError;
use crate::graph::StoreGraph;

/// Smallest modularity gain that still counts as progress.
const MIN_GAIN: f64 = 1.0e-7;

/// Upper bound on local-move sweeps per level.
const MAX_SWEEPS: usize = 1_000;

/// Assigns a community label to every node of a graph.
pub trait Partitioner: Send + Sync {
  /// Name used in logs.
  fn name(&self) -> &'static str;

  /// Labels indexed by node index; `-1` means "no community".
  fn partition(&self, graph: &StoreGraph) -> Result<Vec<i64>, MetricsError>;
}

/// Labels every node `-1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPartition;

impl Partitioner for NoPartition {
  fn name(&self) -> &'static str { "none" }

  fn partition(&self, graph: &StoreGraph) -> Result<Vec<i64>, MetricsError> {
    Ok(vec![-1; graph.node_count()])
  }
}

/// Louvain modularity optimisation over edge weights.
#[derive(Debug, Clone, Copy)]
pub struct Louvain {
  pub resolution: f64,
}

impl Default for Louvain {
  fn default() -> Self { Self { resolution: 1.0 } }
}

impl Partitioner for Louvain {
  fn name(&self) -> &'static str { "louvain" }

  fn partition(&self, graph: &StoreGraph) -> Result<Vec<i64>, MetricsError> {
    if !(self.resolution.is_finite() && self.resolution > 0.0) {
      return Err(MetricsError::Partition(format!(
        "resolution must be positive, got {}",
        self.resolution
      )));
    }

    let mut level = Level::from_graph(graph);
    if level.total_weight <= 0.0 {
      return Err(MetricsError::Partition("graph has no weighted edges".into()));
    }

    // Community of every original node, refined level by level.
    let mut membership: Vec<usize> = (0..level.n).collect();
    let mut modularity = level.modularity(&membership, self.resolution);

    loop {
      let assignment = level.local_moves(self.resolution);
      let (assignment, communities) = renumber(&assignment);
      if communities == level.n {
        break;
      }

      let gain = level.modularity(&assignment, self.resolution) - modularity;
      if gain < MIN_GAIN {
        break;
      }
      modularity += gain;

      for m in membership.iter_mut() {
        *m = assignment[*m];
      }
      level = level.aggregate(&assignment, communities);
    }

    let (labels, _) = renumber(&membership);
    Ok(labels.into_iter().map(|c| c as i64).collect())
  }
}

/// One level of the Louvain hierarchy: a weighted graph where node `i` may
/// carry a self-loop (the internal weight of a collapsed community).
#[derive(Debug, Clone)]
struct Level {
  n:            usize,
  /// Neighbours without self-loops.
  adjacency:    Vec<Vec<(usize, f64)>>,
  loops:        Vec<f64>,
  /// Weighted degree; a self-loop counts twice.
  degree:       Vec<f64>,
  /// Sum of edge weights, each edge (and loop) once.
  total_weight: f64,
}

impl Level {
  fn from_graph(graph: &StoreGraph) -> Self {
    let edges = graph
      .edges()
      .map(|(a, b, w)| (a.index(), b.index(), w))
      .collect::<Vec<_>>();
    Self::from_edges(graph.node_count(), &edges)
  }

  fn from_edges(n: usize, edges: &[(usize, usize, f64)]) -> Self {
    let mut adjacency = vec![Vec::new(); n];
    let mut loops = vec![0.0; n];
    let mut degree = vec![0.0; n];
    let mut total_weight = 0.0;

    for &(a, b, w) in edges {
      total_weight += w;
      degree[a] += w;
      degree[b] += w;
      if a == b {
        loops[a] += w;
      } else {
        adjacency[a].push((b, w));
        adjacency[b].push((a, w));
      }
    }

    Self { n, adjacency, loops, degree, total_weight }
  }

  fn modularity(&self, community: &[usize], resolution: f64) -> f64 {
    let m = self.total_weight;
    let mut internal = vec![0.0; self.n];
    let mut total = vec![0.0; self.n];

    for i in 0..self.n {
      let c = community[i];
      total[c] += self.degree[i];
      internal[c] += self.loops[i];
      for &(j, w) in &self.adjacency[i] {
        // Each undirected edge is seen from both ends; count it once.
        if i < j && community[j] == c {
          internal[c] += w;
        }
      }
    }

    internal
      .iter()
      .zip(&total)
      .map(|(&inner, &tot)| {
        inner / m - resolution * (tot / (2.0 * m)).powi(2)
      })
      .sum()
  }

  /// Repeatedly move single nodes to the neighbouring community with the
  /// best modularity gain until no node moves.
  fn local_moves(&self, resolution: f64) -> Vec<usize> {
    let m2 = 2.0 * self.total_weight;
    let mut community: Vec<usize> = (0..self.n).collect();
    let mut total: Vec<f64> = self.degree.clone();

    for _ in 0..MAX_SWEEPS {
      let mut moved = false;

      for i in 0..self.n {
        let current = community[i];
        let k = self.degree[i];

        let mut links: BTreeMap<usize, f64> = BTreeMap::new();
        for &(j, w) in &self.adjacency[i] {
          *links.entry(community[j]).or_insert(0.0) += w;
        }

        total[current] -= k;
        let remove_cost = -links.get(&current).copied().unwrap_or(0.0)
          + resolution * total[current] * k / m2;

        let mut best = current;
        let mut best_gain = 0.0;
        for (&c, &w) in &links {
          let gain = remove_cost + w - resolution * total[c] * k / m2;
          if gain > best_gain {
            best = c;
            best_gain = gain;
          }
        }

        total[best] += k;
        if best != current {
          community[i] = best;
          moved = true;
        }
      }

      if !moved {
        break;
      }
    }

    community
  }

  /// Collapse every community into one node.
  fn aggregate(&self, community: &[usize], communities: usize) -> Self {
    let mut weights: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for i in 0..self.n {
      let ci = community[i];
      if self.loops[i] > 0.0 {
        *weights.entry((ci, ci)).or_insert(0.0) += self.loops[i];
      }
      for &(j, w) in &self.adjacency[i] {
        if i < j {
          let cj = community[j];
          let key = (ci.min(cj), ci.max(cj));
          *weights.entry(key).or_insert(0.0) += w;
        }
      }
    }

    let edges: Vec<(usize, usize, f64)> =
      weights.into_iter().map(|((a, b), w)| (a, b, w)).collect();
    Self::from_edges(communities, &edges)
  }
}

/// Relabel communities `0..k` in order of first appearance.
fn renumber(community: &[usize]) -> (Vec<usize>, usize) {
  let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
  let mut order: Vec<usize> = Vec::with_capacity(community.len());
  for &c in community {
    let next = mapping.len();
    order.push(*mapping.entry(c).or_insert(next));
  }
  (order, mapping.len())
}
