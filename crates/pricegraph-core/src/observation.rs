//! Price observations: the read-only input of the pipeline.
//!
//! Observations are owned by the price catalog. The pipeline never writes
//! them back; it only reads the ones that fall inside the analysis window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type StoreId = i64;
pub type ProductId = i64;

/// One observed price for a product in a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
  pub product_id:    ProductId,
  pub store_id:      StoreId,
  pub price:         f64,
  /// Observations flagged unavailable are never returned by a source.
  #[serde(default = "default_available")]
  pub available:     bool,
  pub last_modified: DateTime<Utc>,
}

fn default_available() -> bool { true }

impl PriceObservation {
  pub fn new(
    product_id: ProductId,
    store_id: StoreId,
    price: f64,
    last_modified: DateTime<Utc>,
  ) -> Self {
    Self { product_id, store_id, price, available: true, last_modified }
  }
}

/// A store as known to the price catalog; only the display name matters here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
  pub id:   StoreId,
  pub name: String,
}

/// The node key used for a store in snapshots, e.g. `"store:42"`.
pub fn store_node_key(id: StoreId) -> String { format!("store:{id}") }
