//! SQLite backend for pricegraph.
//!
//! One database file holds both the price catalog the pipeline reads from
//! (`stores`, `price_observations`) and the snapshots it writes
//! (`graph_snapshots`, `node_metrics`, `edge_metrics`). All access goes
//! through [`tokio_rusqlite`] so queries run on a dedicated thread without
//! blocking the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
