//! Store–store co-occurrence graph.
//!
//! Two stores are linked when they both sold the same product inside the
//! analysis window. The edge weight is the number of such shared products.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::{
  graph::{NodeIndex, UnGraph},
  visit::EdgeRef as _,
};
use tracing::warn;

use crate::observation::{PriceObservation, ProductId, StoreId, store_node_key};

/// Options for [`StoreGraph::build`].
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
  /// Minimum number of shared products for an edge to be kept.
  pub min_interactions:       u32,
  /// Products sold in more stores than this add no pairs. `None` = no cap.
  pub max_stores_per_product: Option<usize>,
}

impl Default for BuildOptions {
  fn default() -> Self {
    Self { min_interactions: 2, max_stores_per_product: None }
  }
}

/// A node of the store graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreNode {
  pub store_id: StoreId,
  pub key:      String,
}

/// Undirected weighted store graph.
///
/// Node indices are assigned in ascending store id order, so every
/// algorithm iterating over `node_indices()` is deterministic.
#[derive(Debug, Clone, Default)]
pub struct StoreGraph {
  graph: UnGraph<StoreNode, f64>,
  index: HashMap<StoreId, NodeIndex>,
}

impl StoreGraph {
  /// Build the graph from the observations of one window.
  pub fn build(observations: &[PriceObservation], opts: &BuildOptions) -> Self {
    let mut stores_by_product: BTreeMap<ProductId, BTreeSet<StoreId>> =
      BTreeMap::new();
    for obs in observations {
      stores_by_product
        .entry(obs.product_id)
        .or_default()
        .insert(obs.store_id);
    }

    let mut pair_counts: BTreeMap<(StoreId, StoreId), u32> = BTreeMap::new();
    let mut capped = 0usize;
    for stores in stores_by_product.values() {
      if opts.max_stores_per_product.is_some_and(|cap| stores.len() > cap) {
        capped += 1;
        continue;
      }
      // BTreeSet iteration is ascending, so (a, b) is already canonical.
      let stores: Vec<StoreId> = stores.iter().copied().collect();
      for (i, &a) in stores.iter().enumerate() {
        for &b in &stores[i + 1..] {
          *pair_counts.entry((a, b)).or_insert(0) += 1;
        }
      }
    }
    if capped > 0 {
      warn!(
        capped,
        cap = ?opts.max_stores_per_product,
        "products above the per-product store cap were left out of pair counting"
      );
    }

    let all_stores: BTreeSet<StoreId> =
      stores_by_product.values().flatten().copied().collect();

    let mut out = Self::default();
    for id in all_stores {
      out.add_store(id);
    }
    for ((a, b), count) in pair_counts {
      if count >= opts.min_interactions {
        out.add_edge(a, b, f64::from(count));
      }
    }
    out
  }

  fn add_store(&mut self, store_id: StoreId) -> NodeIndex {
    if let Some(&idx) = self.index.get(&store_id) {
      return idx;
    }
    let idx = self.graph.add_node(StoreNode {
      store_id,
      key: store_node_key(store_id),
    });
    self.index.insert(store_id, idx);
    idx
  }

  fn add_edge(&mut self, a: StoreId, b: StoreId, weight: f64) {
    let (a, b) = (self.add_store(a), self.add_store(b));
    self.graph.add_edge(a, b, weight);
  }

  pub fn node_count(&self) -> usize { self.graph.node_count() }

  pub fn edge_count(&self) -> usize { self.graph.edge_count() }

  pub fn is_empty(&self) -> bool { self.graph.node_count() == 0 }

  /// Nodes in index order.
  pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &StoreNode)> + '_ {
    self
      .graph
      .node_indices()
      .map(move |idx| (idx, &self.graph[idx]))
  }

  /// Every edge once, as `(a, b, weight)`.
  pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, f64)> + '_ {
    self
      .graph
      .edge_references()
      .map(|e| (e.source(), e.target(), *e.weight()))
  }

  /// Neighbours of `idx` with the connecting edge weight.
  pub fn neighbors(
    &self,
    idx: NodeIndex,
  ) -> impl Iterator<Item = (NodeIndex, f64)> + '_ {
    self.graph.edges(idx).map(move |e| {
      let other = if e.source() == idx { e.target() } else { e.source() };
      (other, *e.weight())
    })
  }

  pub fn node(&self, idx: NodeIndex) -> &StoreNode { &self.graph[idx] }

  pub fn index_of(&self, store_id: StoreId) -> Option<NodeIndex> {
    self.index.get(&store_id).copied()
  }

  pub fn store_ids(&self) -> Vec<StoreId> {
    self.nodes().map(|(_, n)| n.store_id).collect()
  }

  /// Number of incident edges.
  pub fn degree(&self, idx: NodeIndex) -> usize { self.graph.edges(idx).count() }

  /// Sum of incident edge weights.
  pub fn weighted_degree(&self, idx: NodeIndex) -> f64 {
    self.neighbors(idx).map(|(_, w)| w).sum()
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  fn obs(product_id: ProductId, store_id: StoreId, price: f64) -> PriceObservation {
    PriceObservation::new(product_id, store_id, price, Utc::now())
  }

  /// P1 sold by A(1) and B(2); P2 sold by B(2) and C(3).
  fn abc() -> Vec<PriceObservation> {
    vec![obs(1, 1, 10.0), obs(1, 2, 12.0), obs(2, 2, 5.0), obs(2, 3, 5.0)]
  }

  #[test]
  fn empty_input_gives_empty_graph() {
    let g = StoreGraph::build(&[], &BuildOptions::default());
    assert!(g.is_empty());
    assert_eq!(g.edge_count(), 0);
  }

  #[test]
  fn default_threshold_keeps_isolated_stores() {
    let g = StoreGraph::build(&abc(), &BuildOptions::default());
    assert_eq!(g.node_count(), 3);
    assert_eq!(g.edge_count(), 0);
    let keys: Vec<_> = g.nodes().map(|(_, n)| n.key.clone()).collect();
    assert_eq!(keys, ["store:1", "store:2", "store:3"]);
  }

  #[test]
  fn threshold_one_keeps_both_edges() {
    let opts = BuildOptions { min_interactions: 1, ..Default::default() };
    let g = StoreGraph::build(&abc(), &opts);
    assert_eq!(g.node_count(), 3);
    assert_eq!(g.edge_count(), 2);

    let b = g.index_of(2).unwrap();
    assert_eq!(g.degree(b), 2);
    assert_eq!(g.weighted_degree(b), 2.0);
  }

  #[test]
  fn weight_counts_shared_products_not_observations() {
    // Three shared products, one of them observed twice in store 1.
    let data = vec![
      obs(1, 1, 1.0),
      obs(1, 1, 1.1),
      obs(1, 2, 1.0),
      obs(2, 1, 2.0),
      obs(2, 2, 2.0),
      obs(3, 1, 3.0),
      obs(3, 2, 3.0),
    ];
    let g = StoreGraph::build(&data, &BuildOptions::default());
    let edges: Vec<_> = g.edges().collect();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].2, 3.0);
  }

  #[test]
  fn edges_below_threshold_are_dropped() {
    let data = vec![
      obs(1, 1, 1.0),
      obs(1, 2, 1.0),
      obs(2, 1, 1.0),
      obs(2, 2, 1.0),
      obs(2, 3, 1.0),
    ];
    let g = StoreGraph::build(&data, &BuildOptions::default());
    // (1,2) shares two products, (1,3) and (2,3) share one.
    assert_eq!(g.edge_count(), 1);
    assert!(g.edges().all(|(_, _, w)| w >= 2.0));
  }

  #[test]
  fn capped_products_add_nodes_but_no_pairs() {
    let data = vec![
      obs(1, 1, 1.0),
      obs(1, 2, 1.0),
      obs(1, 3, 1.0),
      obs(2, 1, 1.0),
      obs(2, 2, 1.0),
    ];
    let opts = BuildOptions { min_interactions: 1, max_stores_per_product: Some(2) };
    let g = StoreGraph::build(&data, &opts);
    assert_eq!(g.node_count(), 3);
    assert_eq!(g.edge_count(), 1);
    assert_eq!(g.degree(g.index_of(3).unwrap()), 0);
  }
}
