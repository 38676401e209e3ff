//! Handler for the latest-snapshot export.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/analyses/graph/latest[/]` | `?type&include_edges&order&top&min_weight&limit_nodes` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use pricegraph_core::{
  export::{GraphExport, GraphQuery, NodeOrder},
  snapshot::GraphType,
  store::SnapshotStore,
};
use serde::Deserialize;

use crate::{error::ApiError, params};

/// Raw query parameters; every value is parsed leniently.
#[derive(Debug, Default, Deserialize)]
pub struct LatestParams {
  #[serde(rename = "type")]
  pub graph_type:    Option<String>,
  pub include_edges: Option<String>,
  pub order:         Option<String>,
  pub top:           Option<String>,
  pub min_weight:    Option<String>,
  pub limit_nodes:   Option<String>,
}

impl LatestParams {
  pub fn query(&self) -> GraphQuery {
    GraphQuery {
      include_edges: params::flag(self.include_edges.as_deref(), true),
      order:         self
        .order
        .as_deref()
        .map(NodeOrder::parse_lenient)
        .unwrap_or_default(),
      limit_nodes:   params::positive(self.limit_nodes.as_deref()),
      top:           params::positive(self.top.as_deref()),
      min_weight:    params::number(self.min_weight.as_deref()),
    }
  }
}

/// `GET /analyses/graph/latest`
pub async fn latest<S>(
  State(store): State<Arc<S>>,
  Query(raw): Query<LatestParams>,
) -> Result<Json<GraphExport>, ApiError>
where
  S: SnapshotStore,
{
  let type_str = raw.graph_type.as_deref().unwrap_or("magasin-magasin");
  let no_snapshot = || ApiError::NotFound(format!("no snapshot available for type {type_str:?}"));

  // An unknown type can never have a snapshot.
  let graph_type = GraphType::parse(type_str).map_err(|_| no_snapshot())?;
  let snapshot = store
    .latest_snapshot(graph_type)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(no_snapshot)?;

  let query = raw.query();
  let nodes = store
    .node_metrics(snapshot.snapshot_id)
    .await
    .map_err(ApiError::store)?;
  let edges = if query.include_edges {
    store
      .edge_metrics(snapshot.snapshot_id, query.min_weight)
      .await
      .map_err(ApiError::store)?
  } else {
    Vec::new()
  };

  Ok(Json(GraphExport::project(snapshot, nodes, edges, &query)))
}
