//! JSON catalog import for `pricegraph import`.

use pricegraph_core::observation::{PriceObservation, Store};
use pricegraph_store_sqlite::SqliteStore;
use serde::Deserialize;

/// `{"stores": [{"id", "name"}], "observations": [...]}`; both lists optional.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogImport {
  #[serde(default)]
  pub stores:       Vec<Store>,
  #[serde(default)]
  pub observations: Vec<PriceObservation>,
}

impl CatalogImport {
  pub fn from_json(s: &str) -> serde_json::Result<Self> { serde_json::from_str(s) }

  /// Write everything in one transaction. Returns `(stores, observations)`.
  pub async fn apply(self, store: &SqliteStore) -> pricegraph_store_sqlite::Result<(usize, usize)> {
    store.import_catalog(self.stores, self.observations).await
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use pricegraph_core::store::ObservationSource;

  use super::*;

  const DOC: &str = r#"{
    "stores": [{"id": 1, "name": "Nord"}, {"id": 2, "name": "Sud"}],
    "observations": [
      {"product_id": 10, "store_id": 1, "price": 2.5, "last_modified": "2024-05-01T08:00:00Z"},
      {"product_id": 10, "store_id": 2, "price": 2.0, "available": false,
       "last_modified": "2024-05-01T09:00:00Z"}
    ]
  }"#;

  #[tokio::test]
  async fn imports_stores_and_observations() {
    let doc = CatalogImport::from_json(DOC).unwrap();
    assert!(doc.observations[0].available);
    assert!(!doc.observations[1].available);

    let s = SqliteStore::open_in_memory().await.unwrap();
    assert_eq!(doc.apply(&s).await.unwrap(), (2, 2));

    let labels = s.store_labels(vec![1, 2]).await.unwrap();
    assert_eq!(labels[&2], "Sud");

    let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
    let obs = s.observations_in_window(start, end).await.unwrap();
    assert_eq!(obs.len(), 1);
    assert_eq!(obs[0].price, 2.5);
  }

  #[test]
  fn empty_document_is_valid() {
    let doc = CatalogImport::from_json("{}").unwrap();
    assert!(doc.stores.is_empty() && doc.observations.is_empty());
    assert!(CatalogImport::from_json(r#"{"stores": 3}"#).is_err());
  }
}
