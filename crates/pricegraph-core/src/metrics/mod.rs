//! Graph metrics over a [`StoreGraph`].
//!
//! Degree and weighted degree are always available. PageRank and community
//! labels are best-effort: a failure is logged and replaced by defaults so a
//! snapshot can still be written.

pub mod community;
pub mod kpi;
pub mod pagerank;

use thiserror::Error;
use tracing::{debug, warn};

pub use community::{Louvain, NoPartition, Partitioner};
pub use kpi::StoreKpis;
pub use pagerank::PageRank;

use crate::graph::StoreGraph;

#[derive(Debug, Error)]
pub enum MetricsError {
  #[error("pagerank did not converge within {0} iterations")]
  NoConvergence(usize),

  #[error("community detection failed: {0}")]
  Partition(String),
}

/// Per-node metrics, indexed by node index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphMetrics {
  pub degree:          Vec<usize>,
  pub weighted_degree: Vec<f64>,
  /// `0.0` everywhere when PageRank failed.
  pub pagerank:        Vec<f64>,
  /// `-1` everywhere when there was nothing to partition or it failed.
  pub community:       Vec<i64>,
}

/// Computes [`GraphMetrics`] with a fixed PageRank configuration and a
/// partitioner chosen at construction time.
pub struct MetricsEngine {
  pagerank:    PageRank,
  partitioner: Box<dyn Partitioner>,
}

impl Default for MetricsEngine {
  fn default() -> Self { Self::new(PageRank::default(), Box::new(Louvain::default())) }
}

impl std::fmt::Debug for MetricsEngine {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MetricsEngine")
      .field("pagerank", &self.pagerank)
      .field("partitioner", &self.partitioner.name())
      .finish()
  }
}

impl MetricsEngine {
  pub fn new(pagerank: PageRank, partitioner: Box<dyn Partitioner>) -> Self {
    Self { pagerank, partitioner }
  }

  /// Engine that never partitions.
  pub fn without_communities() -> Self {
    Self::new(PageRank::default(), Box::new(NoPartition))
  }

  pub fn partitioner_name(&self) -> &'static str { self.partitioner.name() }

  /// Compute every metric. Never fails.
  pub fn compute(&self, graph: &StoreGraph) -> GraphMetrics {
    let n = graph.node_count();
    let (degree, weighted_degree): (Vec<usize>, Vec<f64>) = graph
      .nodes()
      .map(|(idx, _)| (graph.degree(idx), graph.weighted_degree(idx)))
      .unzip();

    let pagerank = match self.pagerank.compute(graph) {
      Ok(scores) => scores,
      Err(e) => {
        warn!(error = %e, "pagerank unavailable, defaulting to 0");
        vec![0.0; n]
      }
    };

    let community = if graph.edge_count() == 0 {
      vec![-1; n]
    } else {
      match self.partitioner.partition(graph) {
        Ok(labels) if labels.len() == n => labels,
        Ok(labels) => {
          warn!(
            partitioner = self.partitioner.name(),
            expected = n,
            got = labels.len(),
            "partitioner returned the wrong number of labels, ignoring"
          );
          vec![-1; n]
        }
        Err(e) => {
          warn!(
            partitioner = self.partitioner.name(),
            error = %e,
            "community detection unavailable, defaulting to -1"
          );
          vec![-1; n]
        }
      }
    };

    debug!(nodes = n, edges = graph.edge_count(), "metrics computed");
    GraphMetrics { degree, weighted_degree, pagerank, community }
  }
}
