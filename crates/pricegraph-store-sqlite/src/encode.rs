//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 with microsecond precision and a `Z` suffix.
//! UUIDs are hyphenated lowercase strings. `extra` columns hold compact
//! JSON objects.

use chrono::{DateTime, SecondsFormat, Utc};
use pricegraph_core::{
  observation::PriceObservation,
  snapshot::{EdgeMetric, GraphSnapshot, GraphType, NodeExtra, NodeMetric},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_graph_type(t: GraphType) -> &'static str { t.into() }

pub fn decode_graph_type(s: &str) -> Result<GraphType> { Ok(GraphType::parse(s)?) }

pub fn encode_count(n: usize) -> Result<i64> {
  i64::try_from(n).map_err(|_| Error::OutOfRange(format!("count {n}")))
}

pub fn decode_count(n: i64) -> Result<usize> {
  usize::try_from(n).map_err(|_| Error::OutOfRange(format!("count {n}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from a `graph_snapshots` row.
pub struct RawSnapshot {
  pub snapshot_id:  String,
  pub graph_type:   String,
  pub params_hash:  String,
  pub window_start: String,
  pub window_end:   String,
  pub node_count:   i64,
  pub edge_count:   i64,
  pub created_at:   String,
}

/// Column list matching [`RawSnapshot::from_row`].
pub const SNAPSHOT_COLUMNS: &str = "snapshot_id, graph_type, params_hash, window_start, \
                                    window_end, node_count, edge_count, created_at";

impl RawSnapshot {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      snapshot_id:  row.get(0)?,
      graph_type:   row.get(1)?,
      params_hash:  row.get(2)?,
      window_start: row.get(3)?,
      window_end:   row.get(4)?,
      node_count:   row.get(5)?,
      edge_count:   row.get(6)?,
      created_at:   row.get(7)?,
    })
  }

  pub fn into_snapshot(self) -> Result<GraphSnapshot> {
    Ok(GraphSnapshot {
      snapshot_id:  decode_uuid(&self.snapshot_id)?,
      graph_type:   decode_graph_type(&self.graph_type)?,
      params_hash:  self.params_hash,
      window_start: decode_dt(&self.window_start)?,
      window_end:   decode_dt(&self.window_end)?,
      node_count:   decode_count(self.node_count)?,
      edge_count:   decode_count(self.edge_count)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read from a `node_metrics` row.
pub struct RawNode {
  pub node_key:        String,
  pub label:           String,
  pub degree:          f64,
  pub weighted_degree: f64,
  pub pagerank:        f64,
  pub community:       i64,
  pub extra:           String,
}

impl RawNode {
  pub fn into_metric(self) -> Result<NodeMetric> {
    let extra: NodeExtra = serde_json::from_str(&self.extra)?;
    Ok(NodeMetric {
      node_key: self.node_key,
      label: self.label,
      degree: self.degree,
      weighted_degree: self.weighted_degree,
      pagerank: self.pagerank,
      community: self.community,
      extra,
    })
  }
}

/// Raw values read from an `edge_metrics` row.
pub struct RawEdge {
  pub source_key: String,
  pub target_key: String,
  pub weight:     f64,
  pub similarity: f64,
  pub extra:      String,
}

impl RawEdge {
  pub fn into_metric(self) -> Result<EdgeMetric> {
    Ok(EdgeMetric {
      source_key: self.source_key,
      target_key: self.target_key,
      weight:     self.weight,
      similarity: self.similarity,
      extra:      serde_json::from_str(&self.extra)?,
    })
  }
}

/// Raw values read from a `price_observations` row.
pub struct RawObservation {
  pub product_id:    i64,
  pub store_id:      i64,
  pub price:         f64,
  pub available:     bool,
  pub last_modified: String,
}

impl RawObservation {
  pub fn into_observation(self) -> Result<PriceObservation> {
    Ok(PriceObservation {
      product_id:    self.product_id,
      store_id:      self.store_id,
      price:         self.price,
      available:     self.available,
      last_modified: decode_dt(&self.last_modified)?,
    })
  }
}
