//! JSON read API for pricegraph snapshots.
//!
//! Exposes an axum [`Router`] backed by any
//! [`pricegraph_core::store::SnapshotStore`]. It never writes; snapshots are
//! produced by the pipeline. TLS and auth are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", pricegraph_api::api_router(store.clone()))
//! ```

pub mod error;
pub mod graph;
pub mod params;
pub mod snapshots;

use std::sync::Arc;

use axum::{Router, routing::get};
use pricegraph_core::store::SnapshotStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: SnapshotStore + 'static,
{
  Router::new()
    // Latest export; the trailing-slash form is the historical URL.
    .route("/analyses/graph/latest", get(graph::latest::<S>))
    .route("/analyses/graph/latest/", get(graph::latest::<S>))
    // Browsing
    .route("/analyses/graph/snapshots", get(snapshots::list::<S>))
    .route("/analyses/graph/snapshots/{id}", get(snapshots::get_one::<S>))
    .route("/analyses/graph/snapshots/{id}/nodes", get(snapshots::nodes::<S>))
    .route("/analyses/graph/snapshots/{id}/edges", get(snapshots::edges::<S>))
    .with_state(store)
}

#[cfg(test)]
mod tests;
