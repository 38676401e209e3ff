//! Server-side wiring for pricegraph: configuration, the HTTP app, the
//! scheduled trigger with its retry policy, and snapshot event fan-out.

pub mod config;
pub mod events;
pub mod import;
pub mod retry;
pub mod scheduler;

use std::sync::Arc;

use axum::Router;
use pricegraph_core::{
  events::SnapshotSubscriber, pipeline::SnapshotPipeline, store::SnapshotStore,
};
use pricegraph_store_sqlite::SqliteStore;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;

/// The HTTP application: the read API under `/api`, with request tracing.
pub fn app<S>(store: Arc<S>) -> Router
where
  S: SnapshotStore + 'static,
{
  Router::new()
    .nest("/api", pricegraph_api::api_router(store))
    .layer(TraceLayer::new_for_http())
}

/// A pipeline reading from and writing to the same SQLite database.
pub fn build_pipeline(
  store: &SqliteStore,
  config: &ServerConfig,
  subscribers: impl IntoIterator<Item = Arc<dyn SnapshotSubscriber>>,
) -> SnapshotPipeline<SqliteStore, SqliteStore> {
  let mut pipeline = SnapshotPipeline::new(store.clone(), store.clone())
    .with_metrics(config.community_detection.engine());
  for subscriber in subscribers {
    pipeline.subscribe(subscriber);
  }
  pipeline
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use chrono::Utc;
  use pricegraph_core::{
    observation::PriceObservation,
    pipeline::{GraphParams, RunOutcome},
  };
  use tower::ServiceExt as _;

  use super::*;
  use crate::events::BroadcastSubscriber;

  async fn get(store: Arc<SqliteStore>, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = app(store).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[tokio::test]
  async fn api_is_mounted_under_prefix() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let (status, body) = get(store, "/api/analyses/graph/latest/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
  }

  #[tokio::test]
  async fn pipeline_run_is_visible_through_the_api() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let t = Utc::now() - chrono::Duration::hours(1);
    for (product, s) in [(1, 1), (1, 2), (2, 2), (2, 3)] {
      store
        .record_observation(PriceObservation::new(product, s, 1.0, t))
        .await
        .unwrap();
    }

    let (events, mut rx) = BroadcastSubscriber::channel(4);
    let pipeline = build_pipeline(
      &store,
      &ServerConfig::default(),
      [Arc::new(events) as Arc<dyn SnapshotSubscriber>],
    );
    let params = GraphParams { min_interactions: 1, ..Default::default() };
    let RunOutcome::Written(w) = pipeline.run(&params).await.unwrap() else {
      panic!("expected a write")
    };
    assert_eq!(rx.recv().await.unwrap().snapshot.snapshot_id, w.snapshot.snapshot_id);

    let (status, body) = get(Arc::new(store), "/api/analyses/graph/latest?top=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["snapshot"]["id"], w.snapshot.snapshot_id.to_string());
    assert_eq!(body["nodes"].as_array().unwrap().len(), 1);
    assert_eq!(body["nodes"][0]["key"], "store:2");
  }
}
