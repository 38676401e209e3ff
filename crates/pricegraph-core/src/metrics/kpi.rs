//! Per-store KPIs derived straight from the observations.

use std::collections::{HashMap, HashSet};

use crate::{
  observation::{PriceObservation, ProductId, StoreId},
  snapshot::NodeExtra,
};

/// Cheapness, popularity and coverage of one store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreKpis {
  pub cheapness_avg_ratio: Option<f64>,
  pub cheapness_score:     Option<f64>,
  pub popularity_count:    u64,
  pub product_coverage:    u64,
}

impl StoreKpis {
  /// Compute KPIs for every store seen in `observations`.
  ///
  /// A store's cheapness ratio for one observation is its price divided by
  /// the lowest price of that product across all stores. Observations of a
  /// product whose lowest price is zero, and observations with a
  /// non-positive price, do not contribute a ratio.
  pub fn compute(observations: &[PriceObservation]) -> HashMap<StoreId, Self> {
    let mut min_price: HashMap<ProductId, f64> = HashMap::new();
    for obs in observations {
      min_price
        .entry(obs.product_id)
        .and_modify(|m| *m = m.min(obs.price))
        .or_insert(obs.price);
    }

    #[derive(Default)]
    struct Acc {
      count:     u64,
      products:  HashSet<ProductId>,
      ratio_sum: f64,
      ratio_n:   u64,
    }

    let mut acc: HashMap<StoreId, Acc> = HashMap::new();
    for obs in observations {
      let a = acc.entry(obs.store_id).or_default();
      a.count += 1;
      a.products.insert(obs.product_id);

      let min = min_price.get(&obs.product_id).copied().unwrap_or(0.0);
      if min > 0.0 && obs.price > 0.0 {
        a.ratio_sum += obs.price / min;
        a.ratio_n += 1;
      }
    }

    acc
      .into_iter()
      .map(|(store, a)| {
        let avg = (a.ratio_n > 0).then(|| a.ratio_sum / a.ratio_n as f64);
        let score = avg.filter(|&r| r > 0.0).map(|r| 1.0 / r);
        let kpis = StoreKpis {
          cheapness_avg_ratio: avg,
          cheapness_score:     score,
          popularity_count:    a.count,
          product_coverage:    a.products.len() as u64,
        };
        (store, kpis)
      })
      .collect()
  }

  pub fn into_extra(self) -> NodeExtra {
    NodeExtra {
      cheapness_avg_ratio: self.cheapness_avg_ratio,
      cheapness_score:     self.cheapness_score,
      popularity_count:    self.popularity_count,
      product_coverage:    self.product_coverage,
      other:               serde_json::Map::new(),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  fn obs(product_id: ProductId, store_id: StoreId, price: f64) -> PriceObservation {
    PriceObservation::new(product_id, store_id, price, Utc::now())
  }

  fn close(a: f64, b: f64) -> bool { (a - b).abs() < 1e-12 }

  #[test]
  fn cheapness_is_inverse_mean_ratio() {
    // P1: A $10, B $12. P2: B $5, C $5.
    let kpis = StoreKpis::compute(&[
      obs(1, 1, 10.0),
      obs(1, 2, 12.0),
      obs(2, 2, 5.0),
      obs(2, 3, 5.0),
    ]);

    let a = &kpis[&1];
    assert!(close(a.cheapness_avg_ratio.unwrap(), 1.0));
    assert!(close(a.cheapness_score.unwrap(), 1.0));

    let b = &kpis[&2];
    assert!(close(b.cheapness_avg_ratio.unwrap(), 1.1));
    assert!(close(b.cheapness_score.unwrap(), 1.0 / 1.1));
    assert_eq!(b.popularity_count, 2);
    assert_eq!(b.product_coverage, 2);

    assert!(close(kpis[&3].cheapness_score.unwrap(), 1.0));
  }

  #[test]
  fn zero_minimum_price_is_excluded() {
    // P3 is free somewhere, so nobody gets a ratio for it.
    let kpis = StoreKpis::compute(&[
      obs(3, 1, 0.0),
      obs(3, 2, 4.0),
      obs(4, 2, 2.0),
      obs(4, 3, 3.0),
    ]);

    let a = &kpis[&1];
    assert_eq!(a.cheapness_avg_ratio, None);
    assert_eq!(a.cheapness_score, None);
    assert_eq!(a.popularity_count, 1);

    // Store 2 only keeps its P4 ratio (2 / 2 = 1).
    let b = &kpis[&2];
    assert!(close(b.cheapness_avg_ratio.unwrap(), 1.0));
    assert_eq!(b.product_coverage, 2);

    assert!(close(kpis[&3].cheapness_avg_ratio.unwrap(), 1.5));
  }

  #[test]
  fn repeated_observations_count_towards_popularity_only_once_per_product() {
    let kpis = StoreKpis::compute(&[obs(1, 1, 2.0), obs(1, 1, 3.0), obs(2, 1, 1.0)]);
    let a = &kpis[&1];
    assert_eq!(a.popularity_count, 3);
    assert_eq!(a.product_coverage, 2);
    // Ratios: 2/2, 3/2, 1/1.
    assert!(close(a.cheapness_avg_ratio.unwrap(), 3.5 / 3.0));
  }

  #[test]
  fn into_extra_carries_every_field() {
    let extra = StoreKpis {
      cheapness_avg_ratio: Some(1.25),
      cheapness_score:     Some(0.8),
      popularity_count:    7,
      product_coverage:    3,
    }
    .into_extra();
    assert_eq!(extra.cheapness_score, Some(0.8));
    assert_eq!(extra.popularity_count, 7);
    assert!(extra.other.is_empty());
  }
}
