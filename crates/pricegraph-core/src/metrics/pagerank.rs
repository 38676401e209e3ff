//! Weighted PageRank by power iteration.
//!
//! Each undirected edge is followed in both directions; a node spreads its
//! rank over its neighbours in proportion to edge weight. Isolated nodes are
//! dangling and redistribute their rank uniformly.

use super::MetricsError;
use crate::graph::StoreGraph;

/// PageRank parameters.
#[derive(Debug, Clone, Copy)]
pub struct PageRank {
  pub damping:        f64,
  pub max_iterations: usize,
  /// Converged once the L1 change of one step drops below `n * tolerance`.
  pub tolerance:      f64,
}

impl Default for PageRank {
  fn default() -> Self {
    Self { damping: 0.85, max_iterations: 100, tolerance: 1.0e-6 }
  }
}

impl PageRank {
  /// Scores indexed by node index. Empty graph → empty vector.
  pub fn compute(&self, graph: &StoreGraph) -> Result<Vec<f64>, MetricsError> {
    let n = graph.node_count();
    if n == 0 {
      return Ok(Vec::new());
    }
    let uniform = 1.0 / n as f64;

    // Row-normalised adjacency.
    let mut out_links: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut dangling: Vec<usize> = Vec::new();
    for (idx, _) in graph.nodes() {
      let total = graph.weighted_degree(idx);
      if total > 0.0 {
        out_links[idx.index()] = graph
          .neighbors(idx)
          .map(|(other, w)| (other.index(), w / total))
          .collect();
      } else {
        dangling.push(idx.index());
      }
    }

    let mut rank = vec![uniform; n];
    for _ in 0..self.max_iterations {
      let previous = rank;
      rank = vec![0.0; n];

      let dangling_sum: f64 =
        self.damping * dangling.iter().map(|&i| previous[i]).sum::<f64>();
      for (i, links) in out_links.iter().enumerate() {
        for &(j, share) in links {
          rank[j] += self.damping * previous[i] * share;
        }
      }
      for r in rank.iter_mut() {
        *r += dangling_sum * uniform + (1.0 - self.damping) * uniform;
      }

      let change: f64 =
        rank.iter().zip(&previous).map(|(a, b)| (a - b).abs()).sum();
      if change < n as f64 * self.tolerance {
        return Ok(rank);
      }
    }

    Err(MetricsError::NoConvergence(self.max_iterations))
  }
}
