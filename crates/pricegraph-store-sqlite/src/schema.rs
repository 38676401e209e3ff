//! SQL schema for the pricegraph SQLite store.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
///
/// Timestamps are fixed-width RFC 3339 UTC strings (microseconds, `Z`), so
/// text comparison matches chronological order.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Price catalog (pipeline input) ──────────────────────────────────────────

CREATE TABLE IF NOT EXISTS stores (
    store_id INTEGER PRIMARY KEY,
    name     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS price_observations (
    observation_id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id     INTEGER NOT NULL,
    store_id       INTEGER NOT NULL,
    price          REAL    NOT NULL,
    available      INTEGER NOT NULL DEFAULT 1,
    last_modified  TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS price_observations_window_idx
    ON price_observations(available, last_modified);

-- ── Snapshots (pipeline output) ─────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS graph_snapshots (
    snapshot_id  TEXT PRIMARY KEY,
    graph_type   TEXT    NOT NULL,   -- 'magasin-magasin' | 'client-client' | 'produit-produit'
    params_hash  TEXT    NOT NULL,
    window_start TEXT    NOT NULL,
    window_end   TEXT    NOT NULL,
    node_count   INTEGER NOT NULL DEFAULT 0,
    edge_count   INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT    NOT NULL,
    UNIQUE (graph_type, params_hash, window_start, window_end)
);

CREATE INDEX IF NOT EXISTS graph_snapshots_latest_idx
    ON graph_snapshots(graph_type, created_at);

CREATE TABLE IF NOT EXISTS node_metrics (
    node_metric_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    snapshot_id     TEXT    NOT NULL REFERENCES graph_snapshots(snapshot_id) ON DELETE CASCADE,
    node_key        TEXT    NOT NULL,
    label           TEXT    NOT NULL DEFAULT '',
    degree          REAL    NOT NULL DEFAULT 0,
    weighted_degree REAL    NOT NULL DEFAULT 0,
    pagerank        REAL    NOT NULL DEFAULT 0,
    community       INTEGER NOT NULL DEFAULT -1,
    extra           TEXT    NOT NULL DEFAULT '{}',   -- JSON object
    UNIQUE (snapshot_id, node_key)
);

CREATE TABLE IF NOT EXISTS edge_metrics (
    edge_metric_id INTEGER PRIMARY KEY AUTOINCREMENT,
    snapshot_id    TEXT NOT NULL REFERENCES graph_snapshots(snapshot_id) ON DELETE CASCADE,
    source_key     TEXT NOT NULL,
    target_key     TEXT NOT NULL,
    weight         REAL NOT NULL DEFAULT 0,
    similarity     REAL NOT NULL DEFAULT 0,
    extra          TEXT NOT NULL DEFAULT '{}',   -- JSON object
    UNIQUE (snapshot_id, source_key, target_key),
    CHECK  (source_key != target_key)
);

CREATE INDEX IF NOT EXISTS edge_metrics_weight_idx ON edge_metrics(snapshot_id, weight);

PRAGMA user_version = 1;
";
