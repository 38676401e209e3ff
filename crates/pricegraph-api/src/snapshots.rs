//! Handlers for browsing persisted snapshots.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/analyses/graph/snapshots` | `?type=<graph type>&limit=N`, newest first |
//! | `GET`  | `/analyses/graph/snapshots/{id}` | 404 if not found |
//! | `GET`  | `/analyses/graph/snapshots/{id}/nodes` | |
//! | `GET`  | `/analyses/graph/snapshots/{id}/edges` | `?min_weight=W` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use pricegraph_core::{
  export::{EdgeView, NodeView, SnapshotView},
  snapshot::{GraphSnapshot, GraphType},
  store::SnapshotStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, params};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

async fn find<S: SnapshotStore>(store: &S, id: Uuid) -> Result<GraphSnapshot, ApiError> {
  store
    .get_snapshot(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("snapshot {id} not found")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(rename = "type")]
  pub graph_type: Option<String>,
  pub limit:      Option<String>,
}

/// `GET /analyses/graph/snapshots[?type=<type>&limit=N]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(raw): Query<ListParams>,
) -> Result<Json<Vec<SnapshotView>>, ApiError>
where
  S: SnapshotStore,
{
  let graph_type = raw
    .graph_type
    .as_deref()
    .map(GraphType::parse)
    .transpose()
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
  let limit = params::positive(raw.limit.as_deref())
    .unwrap_or(DEFAULT_LIMIT)
    .min(MAX_LIMIT);

  let snapshots = store
    .list_snapshots(graph_type, limit)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(snapshots.into_iter().map(SnapshotView::from).collect()))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /analyses/graph/snapshots/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SnapshotView>, ApiError>
where
  S: SnapshotStore,
{
  Ok(Json(find(store.as_ref(), id).await?.into()))
}

// ─── Metrics ──────────────────────────────────────────────────────────────────

/// `GET /analyses/graph/snapshots/{id}/nodes`
pub async fn nodes<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<NodeView>>, ApiError>
where
  S: SnapshotStore,
{
  find(store.as_ref(), id).await?;
  let nodes = store.node_metrics(id).await.map_err(ApiError::store)?;
  Ok(Json(nodes.into_iter().map(NodeView::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct EdgeParams {
  pub min_weight: Option<String>,
}

/// `GET /analyses/graph/snapshots/{id}/edges[?min_weight=W]`
pub async fn edges<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Query(raw): Query<EdgeParams>,
) -> Result<Json<Vec<EdgeView>>, ApiError>
where
  S: SnapshotStore,
{
  find(store.as_ref(), id).await?;
  let edges = store
    .edge_metrics(id, params::number(raw.min_weight.as_deref()))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(edges.into_iter().map(EdgeView::from).collect()))
}
