//! Snapshot types: one computed graph per `(type, params, window)` key.
//!
//! A snapshot owns its node and edge metrics. Re-running the pipeline with
//! the same key replaces the metrics wholesale; it never appends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Graph type ──────────────────────────────────────────────────────────────

/// The projection a snapshot was computed for.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
pub enum GraphType {
  /// Stores linked by the products they both sell.
  #[default]
  #[serde(rename = "magasin-magasin")]
  #[strum(serialize = "magasin-magasin")]
  StoreStore,
  #[serde(rename = "client-client")]
  #[strum(serialize = "client-client")]
  ClientClient,
  #[serde(rename = "produit-produit")]
  #[strum(serialize = "produit-produit")]
  ProductProduct,
}

impl GraphType {
  /// Parse the stored/wire form, e.g. `"magasin-magasin"`.
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownGraphType(s.to_owned()))
  }

  /// Only the store–store projection has a builder.
  pub fn is_implemented(self) -> bool { matches!(self, Self::StoreStore) }
}

// ─── Key ─────────────────────────────────────────────────────────────────────

/// Identity of a snapshot. Unique in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotKey {
  pub graph_type:   GraphType,
  pub params_hash:  String,
  pub window_start: DateTime<Utc>,
  pub window_end:   DateTime<Utc>,
}

impl SnapshotKey {
  /// Build the key for a run, hashing the window dates and thresholds.
  ///
  /// The hash covers calendar dates only, so runs on the same day with the
  /// same thresholds share a `params_hash` even though their exact window
  /// bounds differ.
  pub fn derive(
    graph_type: GraphType,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    min_interactions: u32,
    max_stores_per_product: Option<usize>,
  ) -> Self {
    let mut params = format!(
      "{graph_type}|{}|{}|min={min_interactions}",
      window_start.date_naive(),
      window_end.date_naive(),
    );
    if let Some(cap) = max_stores_per_product {
      params.push_str(&format!("|cap={cap}"));
    }
    let digest = hex::encode(Sha256::digest(params.as_bytes()));

    Self {
      graph_type,
      params_hash: digest[..32].to_owned(),
      window_start,
      window_end,
    }
  }
}

// ─── Persisted records ───────────────────────────────────────────────────────

/// Header row of a persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
  pub snapshot_id:  Uuid,
  #[serde(rename = "type")]
  pub graph_type:   GraphType,
  pub params_hash:  String,
  pub window_start: DateTime<Utc>,
  pub window_end:   DateTime<Utc>,
  pub node_count:   usize,
  pub edge_count:   usize,
  /// Set when the key is first written; overwrites keep it.
  pub created_at:   DateTime<Utc>,
}

impl GraphSnapshot {
  pub fn key(&self) -> SnapshotKey {
    SnapshotKey {
      graph_type:   self.graph_type,
      params_hash:  self.params_hash.clone(),
      window_start: self.window_start,
      window_end:   self.window_end,
    }
  }
}

/// Store KPIs and any other per-node extras, stored as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeExtra {
  /// Mean of `price / cheapest price for that product` over the store's
  /// observations. `None` when the store has no usable ratio.
  pub cheapness_avg_ratio: Option<f64>,
  /// `1 / cheapness_avg_ratio`; higher means closer to the cheapest price.
  pub cheapness_score:     Option<f64>,
  #[serde(default)]
  pub popularity_count:    u64,
  #[serde(default)]
  pub product_coverage:    u64,
  #[serde(flatten)]
  pub other:               serde_json::Map<String, serde_json::Value>,
}

/// Metrics for one node of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetric {
  pub node_key:        String,
  pub label:           String,
  pub degree:          f64,
  pub weighted_degree: f64,
  pub pagerank:        f64,
  /// `-1` when no partition was computed.
  pub community:       i64,
  pub extra:           NodeExtra,
}

/// Metrics for one undirected edge. `source_key < target_key` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeMetric {
  pub source_key: String,
  pub target_key: String,
  pub weight:     f64,
  /// Reserved; always `0.0` for now.
  pub similarity: f64,
  pub extra:      serde_json::Map<String, serde_json::Value>,
}

impl EdgeMetric {
  /// Build an edge with its endpoints put in canonical order.
  pub fn canonical(a: String, b: String, weight: f64) -> Self {
    let (source_key, target_key) = if a <= b { (a, b) } else { (b, a) };
    Self {
      source_key,
      target_key,
      weight,
      similarity: 0.0,
      extra: serde_json::Map::new(),
    }
  }
}

// ─── Writer input / output ───────────────────────────────────────────────────

/// Everything the writer needs to persist one snapshot atomically.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
  pub key:   SnapshotKey,
  pub nodes: Vec<NodeMetric>,
  pub edges: Vec<EdgeMetric>,
}

/// Result of [`crate::store::SnapshotStore::write_snapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotWrite {
  pub snapshot: GraphSnapshot,
  /// `false` when an existing snapshot with the same key was overwritten.
  pub created:  bool,
}
