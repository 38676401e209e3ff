//! JSON projection of a persisted snapshot for the read API.
//!
//! [`GraphExport::project`] sorts, truncates and filters the stored metrics
//! according to a [`GraphQuery`]. It does no I/O; callers load the snapshot
//! and its rows first.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::snapshot::{EdgeMetric, GraphSnapshot, NodeExtra, NodeMetric};

/// Number of entries in each `tops` list.
pub const TOPS_LEN: usize = 10;

// ─── Query ───────────────────────────────────────────────────────────────────

/// Sort key for exported nodes. Always descending.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeOrder {
  #[default]
  PageRank,
  Degree,
  /// By `extra.cheapness_score`, missing scores sorting as `0`.
  Cheapness,
  /// By `extra.popularity_count`.
  Popularity,
}

impl NodeOrder {
  /// Unknown values fall back to the default order.
  pub fn parse_lenient(s: &str) -> Self { s.parse().unwrap_or_default() }

  fn sort_key(self, node: &NodeMetric) -> f64 {
    match self {
      Self::PageRank => node.pagerank,
      Self::Degree => node.degree,
      Self::Cheapness => node.extra.cheapness_score.unwrap_or(0.0),
      Self::Popularity => node.extra.popularity_count as f64,
    }
  }
}

/// Filters applied to an export.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQuery {
  pub include_edges: bool,
  pub order:         NodeOrder,
  pub limit_nodes:   Option<usize>,
  pub top:           Option<usize>,
  /// Keep only edges with `weight >= min_weight`.
  pub min_weight:    Option<f64>,
}

impl Default for GraphQuery {
  fn default() -> Self {
    Self {
      include_edges: true,
      order:         NodeOrder::default(),
      limit_nodes:   None,
      top:           None,
      min_weight:    None,
    }
  }
}

// ─── Payload ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotView {
  pub id:           uuid::Uuid,
  #[serde(rename = "type")]
  pub graph_type:   crate::snapshot::GraphType,
  pub params_hash:  String,
  pub window_start: chrono::DateTime<chrono::Utc>,
  pub window_end:   chrono::DateTime<chrono::Utc>,
  pub node_count:   usize,
  pub edge_count:   usize,
  pub created_at:   chrono::DateTime<chrono::Utc>,
}

impl From<GraphSnapshot> for SnapshotView {
  fn from(s: GraphSnapshot) -> Self {
    Self {
      id:           s.snapshot_id,
      graph_type:   s.graph_type,
      params_hash:  s.params_hash,
      window_start: s.window_start,
      window_end:   s.window_end,
      node_count:   s.node_count,
      edge_count:   s.edge_count,
      created_at:   s.created_at,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
  pub key:             String,
  pub label:           String,
  pub degree:          f64,
  #[serde(rename = "weightedDegree")]
  pub weighted_degree: f64,
  pub pagerank:        f64,
  pub community:       i64,
  pub extra:           NodeExtra,
}

impl From<NodeMetric> for NodeView {
  fn from(n: NodeMetric) -> Self {
    Self {
      key:             n.node_key,
      label:           n.label,
      degree:          n.degree,
      weighted_degree: n.weighted_degree,
      pagerank:        n.pagerank,
      community:       n.community,
      extra:           n.extra,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeView {
  pub source:     String,
  pub target:     String,
  pub weight:     f64,
  pub similarity: f64,
  pub extra:      serde_json::Map<String, serde_json::Value>,
}

impl From<EdgeMetric> for EdgeView {
  fn from(e: EdgeMetric) -> Self {
    Self {
      source:     e.source_key,
      target:     e.target_key,
      weight:     e.weight,
      similarity: e.similarity,
      extra:      e.extra,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPageRank {
  pub key:      String,
  pub label:    String,
  pub pagerank: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopDegree {
  pub key:    String,
  pub label:  String,
  pub degree: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tops {
  pub pagerank: Vec<TopPageRank>,
  pub degree:   Vec<TopDegree>,
}

/// Body of `GET /analyses/graph/latest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
  pub snapshot: SnapshotView,
  pub nodes:    Vec<NodeView>,
  pub edges:    Vec<EdgeView>,
  pub tops:     Tops,
}

impl GraphExport {
  /// Project a snapshot and its rows through `query`.
  ///
  /// Nodes are sorted (stable, descending), cut by `limit_nodes` and then
  /// `top`. Edges survive only if both endpoints do, unless no node
  /// survived at all, and only if they meet `min_weight`.
  pub fn project(
    snapshot: GraphSnapshot,
    mut nodes: Vec<NodeMetric>,
    edges: Vec<EdgeMetric>,
    query: &GraphQuery,
  ) -> Self {
    let order = query.order;
    nodes.sort_by(|a, b| order.sort_key(b).total_cmp(&order.sort_key(a)));

    for cut in [query.limit_nodes, query.top].into_iter().flatten() {
      if cut > 0 {
        nodes.truncate(cut);
      }
    }

    let edges = if query.include_edges {
      let kept: HashSet<&str> = nodes.iter().map(|n| n.node_key.as_str()).collect();
      edges
        .into_iter()
        .filter(|e| {
          kept.is_empty()
            || (kept.contains(e.source_key.as_str()) && kept.contains(e.target_key.as_str()))
        })
        .filter(|e| query.min_weight.is_none_or(|w| e.weight >= w))
        .map(EdgeView::from)
        .collect()
    } else {
      Vec::new()
    };

    let tops = tops(&nodes);
    Self {
      snapshot: snapshot.into(),
      nodes: nodes.into_iter().map(NodeView::from).collect(),
      edges,
      tops,
    }
  }
}

fn tops(nodes: &[NodeMetric]) -> Tops {
  let mut by_rank: Vec<&NodeMetric> = nodes.iter().collect();
  by_rank.sort_by(|a, b| b.pagerank.total_cmp(&a.pagerank));
  let mut by_degree: Vec<&NodeMetric> = nodes.iter().collect();
  by_degree.sort_by(|a, b| b.degree.total_cmp(&a.degree));

  Tops {
    pagerank: by_rank
      .into_iter()
      .take(TOPS_LEN)
      .map(|n| TopPageRank {
        key:      n.node_key.clone(),
        label:    n.label.clone(),
        pagerank: n.pagerank,
      })
      .collect(),
    degree:   by_degree
      .into_iter()
      .take(TOPS_LEN)
      .map(|n| TopDegree {
        key:    n.node_key.clone(),
        label:  n.label.clone(),
        degree: n.degree,
      })
      .collect(),
  }
}
