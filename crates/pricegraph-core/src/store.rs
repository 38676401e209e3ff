//! Storage abstractions the pipeline and the read API depend on.
//!
//! [`ObservationSource`] is the price catalog the pipeline reads from;
//! [`SnapshotStore`] persists and serves computed snapshots. Backends (e.g.
//! `pricegraph-store-sqlite`) implement both; higher layers only see these
//! traits.

use std::{collections::HashMap, future::Future};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  observation::{PriceObservation, StoreId},
  snapshot::{EdgeMetric, GraphSnapshot, GraphType, NewSnapshot, NodeMetric, SnapshotWrite},
};

/// Read-only access to price observations.
pub trait ObservationSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// All *available* observations whose `last_modified` lies in
  /// `[start, end]`, bounds inclusive.
  fn observations_in_window(
    &self,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<PriceObservation>, Self::Error>> + Send + '_;

  /// Display names for the given stores. Unknown ids are simply absent.
  fn store_labels(
    &self,
    ids: Vec<StoreId>,
  ) -> impl Future<Output = Result<HashMap<StoreId, String>, Self::Error>> + Send + '_;
}

/// Persistence for graph snapshots.
pub trait SnapshotStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist `snapshot` in one transaction.
  ///
  /// If a snapshot with the same key exists, its node and edge metrics are
  /// replaced and its counts updated; readers never see a mix of old and new
  /// rows.
  fn write_snapshot(
    &self,
    snapshot: NewSnapshot,
  ) -> impl Future<Output = Result<SnapshotWrite, Self::Error>> + Send + '_;

  /// Delete all but the `keep` most recent snapshots of `graph_type`.
  /// Returns the number of snapshots removed.
  fn prune_snapshots(
    &self,
    graph_type: GraphType,
    keep: usize,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_snapshot(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<GraphSnapshot>, Self::Error>> + Send + '_;

  /// The most recently created snapshot of `graph_type`, if any.
  fn latest_snapshot(
    &self,
    graph_type: GraphType,
  ) -> impl Future<Output = Result<Option<GraphSnapshot>, Self::Error>> + Send + '_;

  /// Snapshots newest first, optionally restricted to one type.
  fn list_snapshots(
    &self,
    graph_type: Option<GraphType>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<GraphSnapshot>, Self::Error>> + Send + '_;

  fn node_metrics(
    &self,
    snapshot_id: Uuid,
  ) -> impl Future<Output = Result<Vec<NodeMetric>, Self::Error>> + Send + '_;

  /// Edges of a snapshot, optionally only those with `weight >= min_weight`.
  fn edge_metrics(
    &self,
    snapshot_id: Uuid,
    min_weight: Option<f64>,
  ) -> impl Future<Output = Result<Vec<EdgeMetric>, Self::Error>> + Send + '_;
}
