//! [`SqliteStore`]: the SQLite implementation of [`ObservationSource`] and
//! [`SnapshotStore`].

use std::{collections::HashMap, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use pricegraph_core::{
  observation::{PriceObservation, Store, StoreId},
  snapshot::{EdgeMetric, GraphSnapshot, GraphType, NewSnapshot, NodeMetric, SnapshotWrite},
  store::{ObservationSource, SnapshotStore},
};

use crate::{
  Result,
  encode::{
    RawEdge, RawNode, RawObservation, RawSnapshot, SNAPSHOT_COLUMNS, encode_count, encode_dt,
    encode_graph_type, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A pricegraph database backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Price catalog ─────────────────────────────────────────────────────────

  /// Insert a store or rename an existing one.
  pub async fn record_store(&self, store: Store) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO stores (store_id, name) VALUES (?1, ?2)
           ON CONFLICT (store_id) DO UPDATE SET name = excluded.name",
          rusqlite::params![store.id, store.name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Append one price observation. Returns its row id.
  pub async fn record_observation(&self, obs: PriceObservation) -> Result<i64> {
    let last_modified = encode_dt(obs.last_modified);
    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO price_observations
             (product_id, store_id, price, available, last_modified)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![obs.product_id, obs.store_id, obs.price, obs.available, last_modified],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(id)
  }

  /// Load stores and observations in one transaction.
  ///
  /// Returns `(stores, observations)` written.
  pub async fn import_catalog(
    &self,
    stores: Vec<Store>,
    observations: Vec<PriceObservation>,
  ) -> Result<(usize, usize)> {
    let rows: Vec<_> = observations
      .into_iter()
      .map(|o| (o.product_id, o.store_id, o.price, o.available, encode_dt(o.last_modified)))
      .collect();

    let counts = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO stores (store_id, name) VALUES (?1, ?2)
             ON CONFLICT (store_id) DO UPDATE SET name = excluded.name",
          )?;
          for s in &stores {
            stmt.execute(rusqlite::params![s.id, s.name])?;
          }

          let mut stmt = tx.prepare(
            "INSERT INTO price_observations
               (product_id, store_id, price, available, last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for (product_id, store_id, price, available, last_modified) in &rows {
            stmt.execute(rusqlite::params![product_id, store_id, price, available, last_modified])?;
          }
        }
        tx.commit()?;
        Ok((stores.len(), rows.len()))
      })
      .await?;
    Ok(counts)
  }
}

// ─── ObservationSource impl ──────────────────────────────────────────────────

impl ObservationSource for SqliteStore {
  type Error = crate::Error;

  async fn observations_in_window(
    &self,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> Result<Vec<PriceObservation>> {
    let start_str = encode_dt(start);
    let end_str = encode_dt(end);

    let raw: Vec<RawObservation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT product_id, store_id, price, available, last_modified
           FROM price_observations
           WHERE available = 1 AND last_modified >= ?1 AND last_modified <= ?2
           ORDER BY observation_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![start_str, end_str], |r| {
            Ok(RawObservation {
              product_id:    r.get(0)?,
              store_id:      r.get(1)?,
              price:         r.get(2)?,
              available:     r.get(3)?,
              last_modified: r.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raw.into_iter().map(RawObservation::into_observation).collect()
  }

  async fn store_labels(&self, ids: Vec<StoreId>) -> Result<HashMap<StoreId, String>> {
    let labels = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare("SELECT name FROM stores WHERE store_id = ?1")?;
        let mut labels = HashMap::with_capacity(ids.len());
        for id in ids {
          let name: Option<String> =
            stmt.query_row(rusqlite::params![id], |r| r.get(0)).optional()?;
          if let Some(name) = name {
            labels.insert(id, name);
          }
        }
        Ok(labels)
      })
      .await?;
    Ok(labels)
  }
}

// ─── SnapshotStore impl ──────────────────────────────────────────────────────

impl SnapshotStore for SqliteStore {
  type Error = crate::Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn write_snapshot(&self, snapshot: NewSnapshot) -> Result<SnapshotWrite> {
    let NewSnapshot { key, nodes, edges } = snapshot;

    let graph_type = encode_graph_type(key.graph_type);
    let params_hash = key.params_hash;
    let window_start = encode_dt(key.window_start);
    let window_end = encode_dt(key.window_end);
    let node_count = encode_count(nodes.len())?;
    let edge_count = encode_count(edges.len())?;
    let new_id = encode_uuid(Uuid::new_v4());
    let now = encode_dt(Utc::now());

    let node_rows = nodes
      .into_iter()
      .map(|n| {
        let extra = serde_json::to_string(&n.extra)?;
        Ok((n.node_key, n.label, n.degree, n.weighted_degree, n.pagerank, n.community, extra))
      })
      .collect::<Result<Vec<_>>>()?;
    let edge_rows = edges
      .into_iter()
      .map(|e| {
        let extra = serde_json::to_string(&e.extra)?;
        Ok((e.source_key, e.target_key, e.weight, e.similarity, extra))
      })
      .collect::<Result<Vec<_>>>()?;

    // Dropping `tx` without commit rolls everything back, so a failure at
    // any step leaves the previous metrics untouched.
    let (raw, created) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
          .query_row(
            "SELECT snapshot_id FROM graph_snapshots
             WHERE graph_type = ?1 AND params_hash = ?2
               AND window_start = ?3 AND window_end = ?4",
            rusqlite::params![graph_type, params_hash, window_start, window_end],
            |r| r.get(0),
          )
          .optional()?;

        let (snapshot_id, created) = match existing {
          Some(id) => {
            tx.execute("DELETE FROM node_metrics WHERE snapshot_id = ?1", rusqlite::params![id])?;
            tx.execute("DELETE FROM edge_metrics WHERE snapshot_id = ?1", rusqlite::params![id])?;
            tx.execute(
              "UPDATE graph_snapshots SET node_count = ?2, edge_count = ?3
               WHERE snapshot_id = ?1",
              rusqlite::params![id, node_count, edge_count],
            )?;
            (id, false)
          }
          None => {
            tx.execute(
              "INSERT INTO graph_snapshots (
                 snapshot_id, graph_type, params_hash, window_start, window_end,
                 node_count, edge_count, created_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
              rusqlite::params![
                new_id,
                graph_type,
                params_hash,
                window_start,
                window_end,
                node_count,
                edge_count,
                now,
              ],
            )?;
            (new_id, true)
          }
        };

        {
          let mut stmt = tx.prepare(
            "INSERT INTO node_metrics (
               snapshot_id, node_key, label, degree, weighted_degree,
               pagerank, community, extra
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          )?;
          for (key, label, degree, weighted, pagerank, community, extra) in &node_rows {
            stmt.execute(rusqlite::params![
              snapshot_id,
              key,
              label,
              degree,
              weighted,
              pagerank,
              community,
              extra
            ])?;
          }

          let mut stmt = tx.prepare(
            "INSERT INTO edge_metrics (
               snapshot_id, source_key, target_key, weight, similarity, extra
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          )?;
          for (source, target, weight, similarity, extra) in &edge_rows {
            stmt.execute(rusqlite::params![snapshot_id, source, target, weight, similarity, extra])?;
          }
        }

        let raw = tx.query_row(
          &format!("SELECT {SNAPSHOT_COLUMNS} FROM graph_snapshots WHERE snapshot_id = ?1"),
          rusqlite::params![snapshot_id],
          RawSnapshot::from_row,
        )?;
        tx.commit()?;
        Ok((raw, created))
      })
      .await?;

    let snapshot = raw.into_snapshot()?;
    debug!(snapshot_id = %snapshot.snapshot_id, created, "snapshot committed");
    Ok(SnapshotWrite { snapshot, created })
  }

  async fn prune_snapshots(&self, graph_type: GraphType, keep: usize) -> Result<usize> {
    let type_str = encode_graph_type(graph_type);
    let keep = encode_count(keep)?;

    let removed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM graph_snapshots
           WHERE graph_type = ?1
             AND snapshot_id NOT IN (
               SELECT snapshot_id FROM graph_snapshots
               WHERE graph_type = ?1
               ORDER BY created_at DESC, rowid DESC
               LIMIT ?2
             )",
          rusqlite::params![type_str, keep],
        )?;
        Ok(n)
      })
      .await?;

    debug!(graph_type = %graph_type, removed, "pruned snapshots");
    Ok(removed)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_snapshot(&self, id: Uuid) -> Result<Option<GraphSnapshot>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            &format!("SELECT {SNAPSHOT_COLUMNS} FROM graph_snapshots WHERE snapshot_id = ?1"),
            rusqlite::params![id_str],
            RawSnapshot::from_row,
          )
          .optional()?;
        Ok(raw)
      })
      .await?;
    raw.map(RawSnapshot::into_snapshot).transpose()
  }

  async fn latest_snapshot(&self, graph_type: GraphType) -> Result<Option<GraphSnapshot>> {
    Ok(self.list_snapshots(Some(graph_type), 1).await?.into_iter().next())
  }

  async fn list_snapshots(
    &self,
    graph_type: Option<GraphType>,
    limit: usize,
  ) -> Result<Vec<GraphSnapshot>> {
    let type_str = graph_type.map(encode_graph_type);
    let limit = encode_count(limit)?;

    let raw: Vec<RawSnapshot> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SNAPSHOT_COLUMNS} FROM graph_snapshots
           WHERE (?1 IS NULL OR graph_type = ?1)
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![type_str, limit], RawSnapshot::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raw.into_iter().map(RawSnapshot::into_snapshot).collect()
  }

  async fn node_metrics(&self, snapshot_id: Uuid) -> Result<Vec<NodeMetric>> {
    let id_str = encode_uuid(snapshot_id);
    let raw: Vec<RawNode> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT node_key, label, degree, weighted_degree, pagerank, community, extra
           FROM node_metrics WHERE snapshot_id = ?1
           ORDER BY node_metric_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |r| {
            Ok(RawNode {
              node_key:        r.get(0)?,
              label:           r.get(1)?,
              degree:          r.get(2)?,
              weighted_degree: r.get(3)?,
              pagerank:        r.get(4)?,
              community:       r.get(5)?,
              extra:           r.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raw.into_iter().map(RawNode::into_metric).collect()
  }

  async fn edge_metrics(
    &self,
    snapshot_id: Uuid,
    min_weight: Option<f64>,
  ) -> Result<Vec<EdgeMetric>> {
    let id_str = encode_uuid(snapshot_id);
    let raw: Vec<RawEdge> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT source_key, target_key, weight, similarity, extra
           FROM edge_metrics
           WHERE snapshot_id = ?1 AND (?2 IS NULL OR weight >= ?2)
           ORDER BY edge_metric_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, min_weight], |r| {
            Ok(RawEdge {
              source_key: r.get(0)?,
              target_key: r.get(1)?,
              weight:     r.get(2)?,
              similarity: r.get(3)?,
              extra:      r.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raw.into_iter().map(RawEdge::into_metric).collect()
  }
}
