//! Router tests against an in-memory SQLite store.

use std::sync::Arc;

use axum::{
  body::Body,
  http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use pricegraph_core::{
  snapshot::{EdgeMetric, GraphType, NewSnapshot, NodeExtra, NodeMetric, SnapshotKey},
  store::SnapshotStore,
};
use pricegraph_store_sqlite::SqliteStore;
use serde_json::Value;
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::api_router;

async fn store() -> Arc<SqliteStore> {
  Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"))
}

fn node(id: i64, degree: f64, pagerank: f64, score: Option<f64>, popularity: u64) -> NodeMetric {
  NodeMetric {
    node_key: format!("store:{id}"),
    label: format!("Store {id}"),
    degree,
    weighted_degree: degree * 2.0,
    pagerank,
    community: 0,
    extra: NodeExtra {
      cheapness_score: score,
      cheapness_avg_ratio: score.map(|s| 1.0 / s),
      popularity_count: popularity,
      product_coverage: popularity,
      ..Default::default()
    },
  }
}

/// Four stores on a path 1-2-3-4 with increasing edge weights.
async fn seed(store: &SqliteStore) -> Uuid {
  let end = Utc::now();
  let key = SnapshotKey::derive(GraphType::StoreStore, end - Duration::days(90), end, 1, None);
  let snapshot = NewSnapshot {
    key,
    nodes: vec![
      node(1, 1.0, 0.15, Some(0.5), 9),
      node(2, 2.0, 0.35, None, 3),
      node(3, 2.0, 0.30, Some(0.9), 4),
      node(4, 1.0, 0.20, Some(0.7), 1),
    ],
    edges: vec![
      EdgeMetric::canonical("store:1".into(), "store:2".into(), 1.0),
      EdgeMetric::canonical("store:2".into(), "store:3".into(), 2.0),
      EdgeMetric::canonical("store:3".into(), "store:4".into(), 3.0),
    ],
  };
  store.write_snapshot(snapshot).await.unwrap().snapshot.snapshot_id
}

async fn get(store: Arc<SqliteStore>, uri: &str) -> (StatusCode, Value) {
  let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
  let resp = api_router(store).oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let body = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, body)
}

fn keys(body: &Value) -> Vec<&str> {
  body["nodes"]
    .as_array()
    .unwrap()
    .iter()
    .map(|n| n["key"].as_str().unwrap())
    .collect()
}

// ─── Latest ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn latest_without_snapshot_is_404() {
  let s = store().await;
  let (status, body) = get(s, "/analyses/graph/latest/").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn latest_unknown_type_is_404() {
  let s = store().await;
  seed(&s).await;
  let (status, body) = get(s, "/analyses/graph/latest?type=store-store").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn latest_defaults() {
  let s = store().await;
  let id = seed(&s).await;
  let (status, body) = get(s, "/analyses/graph/latest/").await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["snapshot"]["id"], id.to_string());
  assert_eq!(body["snapshot"]["type"], "magasin-magasin");
  assert_eq!(body["snapshot"]["node_count"], 4);
  assert_eq!(body["snapshot"]["edge_count"], 3);
  assert_eq!(keys(&body), ["store:2", "store:3", "store:4", "store:1"]);
  assert_eq!(body["nodes"][0]["weightedDegree"], 4.0);
  assert!(body["nodes"][0]["extra"]["cheapness_score"].is_null());
  assert_eq!(body["edges"].as_array().unwrap().len(), 3);
  assert_eq!(body["tops"]["pagerank"][0]["key"], "store:2");
  assert_eq!(body["tops"]["degree"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn latest_without_trailing_slash() {
  let s = store().await;
  seed(&s).await;
  let (status, _) = get(s, "/analyses/graph/latest").await;
  assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn latest_orders_by_kpis() {
  let s = store().await;
  seed(&s).await;

  let (_, body) = get(s.clone(), "/analyses/graph/latest?order=cheapness").await;
  assert_eq!(keys(&body), ["store:3", "store:4", "store:1", "store:2"]);

  let (_, body) = get(s.clone(), "/analyses/graph/latest?order=popularity").await;
  assert_eq!(keys(&body), ["store:1", "store:3", "store:2", "store:4"]);

  let (_, body) = get(s, "/analyses/graph/latest?order=nonsense").await;
  assert_eq!(keys(&body), ["store:2", "store:3", "store:4", "store:1"]);
}

#[tokio::test]
async fn latest_top_keeps_only_edges_between_survivors() {
  let s = store().await;
  seed(&s).await;
  let (_, body) = get(s, "/analyses/graph/latest?top=2").await;

  assert_eq!(keys(&body), ["store:2", "store:3"]);
  let edges = body["edges"].as_array().unwrap();
  assert_eq!(edges.len(), 1);
  assert_eq!(edges[0]["source"], "store:2");
  assert_eq!(edges[0]["target"], "store:3");
  assert_eq!(edges[0]["similarity"], 0.0);
}

#[tokio::test]
async fn latest_min_weight_and_include_edges() {
  let s = store().await;
  seed(&s).await;

  let (_, body) = get(s.clone(), "/analyses/graph/latest?min_weight=2").await;
  let weights: Vec<f64> = body["edges"]
    .as_array()
    .unwrap()
    .iter()
    .map(|e| e["weight"].as_f64().unwrap())
    .collect();
  assert_eq!(weights, [2.0, 3.0]);

  let (_, body) = get(s, "/analyses/graph/latest?include_edges=no").await;
  assert!(body["edges"].as_array().unwrap().is_empty());
  assert_eq!(body["nodes"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn latest_ignores_malformed_numbers() {
  let s = store().await;
  seed(&s).await;
  let (status, body) = get(
    s,
    "/analyses/graph/latest?top=lots&limit_nodes=-1&min_weight=heavy",
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["nodes"].as_array().unwrap().len(), 4);
  assert_eq!(body["edges"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn latest_limit_nodes_then_top() {
  let s = store().await;
  seed(&s).await;
  let (_, body) = get(s, "/analyses/graph/latest?limit_nodes=3&top=5").await;
  assert_eq!(keys(&body), ["store:2", "store:3", "store:4"]);
  assert_eq!(body["edges"].as_array().unwrap().len(), 2);
}

// ─── Browsing ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_and_get_snapshots() {
  let s = store().await;
  let id = seed(&s).await;

  let (status, body) = get(s.clone(), "/analyses/graph/snapshots?type=magasin-magasin").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body.as_array().unwrap().len(), 1);
  assert_eq!(body[0]["id"], id.to_string());

  let (_, body) = get(s.clone(), "/analyses/graph/snapshots?type=client-client").await;
  assert!(body.as_array().unwrap().is_empty());

  let (status, body) = get(s.clone(), "/analyses/graph/snapshots?type=bogus").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].is_string());

  let (status, body) = get(s, &format!("/analyses/graph/snapshots/{id}")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["params_hash"].as_str().unwrap().len(), 32);
}

#[tokio::test]
async fn snapshot_nodes_and_edges() {
  let s = store().await;
  let id = seed(&s).await;

  let (_, body) = get(s.clone(), &format!("/analyses/graph/snapshots/{id}/nodes")).await;
  assert_eq!(body.as_array().unwrap().len(), 4);
  assert_eq!(body[0]["key"], "store:1");

  let (_, body) = get(s, &format!("/analyses/graph/snapshots/{id}/edges?min_weight=3")).await;
  let edges = body.as_array().unwrap();
  assert_eq!(edges.len(), 1);
  assert_eq!(edges[0]["source"], "store:3");
}

#[tokio::test]
async fn missing_snapshot_is_404() {
  let s = store().await;
  let id = Uuid::new_v4();
  for uri in [
    format!("/analyses/graph/snapshots/{id}"),
    format!("/analyses/graph/snapshots/{id}/nodes"),
    format!("/analyses/graph/snapshots/{id}/edges"),
  ] {
    let (status, body) = get(s.clone(), &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    assert!(body["error"].is_string());
  }
}
