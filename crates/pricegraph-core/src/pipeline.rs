//! The snapshot pipeline: observations → graph → metrics → snapshot.
//!
//! One [`SnapshotPipeline::run`] call is one batch job. Source errors abort
//! the run before anything is written; metric failures only degrade the
//! output; the write itself is a single transaction in the store.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
  Error, Result,
  events::{SnapshotSubscriber, SnapshotWritten},
  graph::{BuildOptions, StoreGraph},
  metrics::{GraphMetrics, MetricsEngine, StoreKpis},
  observation::StoreId,
  snapshot::{EdgeMetric, GraphType, NewSnapshot, NodeMetric, SnapshotKey, SnapshotWrite},
  store::{ObservationSource, SnapshotStore},
};

// ─── Parameters ──────────────────────────────────────────────────────────────

/// Parameters of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphParams {
  pub graph_type:             GraphType,
  pub window_days:            u32,
  pub min_interactions:       u32,
  pub max_stores_per_product: Option<usize>,
  /// Compute and log, but write nothing.
  pub dry_run:                bool,
  /// End of the window; defaults to the time of the run.
  pub as_of:                  Option<DateTime<Utc>>,
}

impl Default for GraphParams {
  fn default() -> Self {
    Self {
      graph_type:             GraphType::StoreStore,
      window_days:            90,
      min_interactions:       2,
      max_stores_per_product: None,
      dry_run:                false,
      as_of:                  None,
    }
  }
}

impl GraphParams {
  /// The snapshot key for a run ending at `as_of`, or at `now` if unset.
  pub fn snapshot_key(&self, now: DateTime<Utc>) -> Result<SnapshotKey> {
    let window_end = self.as_of.unwrap_or(now);
    let window_start = Duration::try_days(i64::from(self.window_days))
      .and_then(|span| window_end.checked_sub_signed(span))
      .ok_or(Error::InvalidWindow(self.window_days))?;
    Ok(SnapshotKey::derive(
      self.graph_type,
      window_start,
      window_end,
      self.min_interactions,
      self.max_stores_per_product,
    ))
  }

  fn build_options(&self) -> BuildOptions {
    BuildOptions {
      min_interactions:       self.min_interactions,
      max_stores_per_product: self.max_stores_per_product,
    }
  }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// What a run did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
  /// The graph type has no builder; nothing was computed.
  Skipped { graph_type: GraphType },
  /// Computed but not persisted.
  DryRun {
    key:        SnapshotKey,
    node_count: usize,
    edge_count: usize,
  },
  Written(SnapshotWrite),
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Builds and persists graph snapshots.
pub struct SnapshotPipeline<O, S> {
  source:      O,
  store:       S,
  metrics:     MetricsEngine,
  subscribers: Vec<Arc<dyn SnapshotSubscriber>>,
}

impl<O, S> SnapshotPipeline<O, S>
where
  O: ObservationSource,
  S: SnapshotStore,
{
  /// Pipeline with the default metrics engine (PageRank + Louvain).
  pub fn new(source: O, store: S) -> Self {
    Self {
      source,
      store,
      metrics: MetricsEngine::default(),
      subscribers: Vec::new(),
    }
  }

  pub fn with_metrics(mut self, metrics: MetricsEngine) -> Self {
    self.metrics = metrics;
    self
  }

  /// Register a subscriber for [`SnapshotWritten`] events.
  pub fn subscribe(&mut self, subscriber: Arc<dyn SnapshotSubscriber>) {
    self.subscribers.push(subscriber);
  }

  pub fn store(&self) -> &S { &self.store }

  /// Run the pipeline once.
  pub async fn run(&self, params: &GraphParams) -> Result<RunOutcome> {
    if !params.graph_type.is_implemented() {
      warn!(graph_type = %params.graph_type, "unsupported graph type, skipping");
      return Ok(RunOutcome::Skipped { graph_type: params.graph_type });
    }

    let key = params.snapshot_key(Utc::now())?;
    info!(
      graph_type = %key.graph_type,
      window_days = params.window_days,
      min_interactions = params.min_interactions,
      params_hash = %key.params_hash,
      "building graph snapshot"
    );

    let observations = self
      .source
      .observations_in_window(key.window_start, key.window_end)
      .await
      .map_err(|e| Error::Source(Box::new(e)))?;

    let graph = StoreGraph::build(&observations, &params.build_options());
    let metrics = self.metrics.compute(&graph);
    let kpis = StoreKpis::compute(&observations);
    info!(
      observations = observations.len(),
      nodes = graph.node_count(),
      edges = graph.edge_count(),
      partitioner = self.metrics.partitioner_name(),
      "graph built"
    );

    if params.dry_run {
      warn!("dry run: nothing written");
      return Ok(RunOutcome::DryRun {
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        key,
      });
    }

    let labels = self
      .source
      .store_labels(graph.store_ids())
      .await
      .map_err(|e| Error::Source(Box::new(e)))?;

    let snapshot = assemble(key, &graph, &metrics, kpis, &labels);
    let write = self
      .store
      .write_snapshot(snapshot)
      .await
      .map_err(|e| Error::Store(Box::new(e)))?;

    info!(
      snapshot_id = %write.snapshot.snapshot_id,
      created = write.created,
      nodes = write.snapshot.node_count,
      edges = write.snapshot.edge_count,
      "snapshot written"
    );

    let event = SnapshotWritten::from(&write);
    for subscriber in &self.subscribers {
      subscriber.snapshot_written(&event);
    }

    Ok(RunOutcome::Written(write))
  }
}

/// Turn the graph and its metrics into writer input.
fn assemble(
  key: SnapshotKey,
  graph: &StoreGraph,
  metrics: &GraphMetrics,
  mut kpis: HashMap<StoreId, StoreKpis>,
  labels: &HashMap<StoreId, String>,
) -> NewSnapshot {
  let nodes = graph
    .nodes()
    .map(|(idx, node)| {
      let i = idx.index();
      NodeMetric {
        node_key:        node.key.clone(),
        label:           labels
          .get(&node.store_id)
          .cloned()
          .unwrap_or_else(|| node.store_id.to_string()),
        degree:          metrics.degree[i] as f64,
        weighted_degree: metrics.weighted_degree[i],
        pagerank:        metrics.pagerank[i],
        community:       metrics.community[i],
        extra:           kpis.remove(&node.store_id).unwrap_or_default().into_extra(),
      }
    })
    .collect();

  let edges = graph
    .edges()
    .map(|(a, b, w)| {
      EdgeMetric::canonical(graph.node(a).key.clone(), graph.node(b).key.clone(), w)
    })
    .collect();

  NewSnapshot { key, nodes, edges }
}
