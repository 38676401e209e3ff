//! Runtime configuration, layered from an optional TOML file and
//! `PRICEGRAPH_*` environment variables.
//!
//! Nested keys use `__` in the environment, e.g.
//! `PRICEGRAPH_SCHEDULE__INTERVAL_HOURS=6`.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use pricegraph_core::{
  metrics::MetricsEngine, pipeline::GraphParams, snapshot::GraphType,
};
use serde::Deserialize;

use crate::retry::RetryPolicy;

pub const ENV_PREFIX: &str = "PRICEGRAPH";

// ─── Server ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  /// SQLite database file; a leading `~/` is expanded.
  pub store_path:          PathBuf,
  pub schedule:            ScheduleConfig,
  pub retry:               RetryPolicy,
  pub community_detection: CommunityDetection,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                "127.0.0.1".into(),
      port:                8000,
      store_path:          PathBuf::from("pricegraph.db"),
      schedule:            ScheduleConfig::default(),
      retry:               RetryPolicy::default(),
      community_detection: CommunityDetection::default(),
    }
  }
}

impl ServerConfig {
  /// Read `path` (if it exists) and then the environment.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    Self::from_sources(path, environment())
  }

  fn from_sources(
    path: &Path,
    env: config::Environment,
  ) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(env)
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

fn environment() -> config::Environment {
  config::Environment::with_prefix(ENV_PREFIX)
    .prefix_separator("_")
    .separator("__")
}

// ─── Schedule ────────────────────────────────────────────────────────────────

/// The in-process trigger run by `pricegraph serve`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
  pub enabled:                bool,
  pub interval_hours:         u64,
  /// Run once immediately instead of waiting a full interval.
  pub run_on_start:           bool,
  pub graph_type:             GraphType,
  pub window_days:            u32,
  pub min_interactions:       u32,
  pub max_stores_per_product: Option<usize>,
  /// Keep only this many snapshots per type after each successful run.
  pub retain_snapshots:       Option<usize>,
}

impl Default for ScheduleConfig {
  fn default() -> Self {
    let params = GraphParams::default();
    Self {
      enabled:                true,
      interval_hours:         24,
      run_on_start:           false,
      graph_type:             params.graph_type,
      window_days:            params.window_days,
      min_interactions:       params.min_interactions,
      max_stores_per_product: params.max_stores_per_product,
      retain_snapshots:       None,
    }
  }
}

impl ScheduleConfig {
  /// Parameters for one scheduled run. The window always ends "now".
  pub fn params(&self) -> GraphParams {
    GraphParams {
      graph_type: self.graph_type,
      window_days: self.window_days,
      min_interactions: self.min_interactions,
      max_stores_per_product: self.max_stores_per_product,
      dry_run: false,
      as_of: None,
    }
  }

  /// Time between runs; never shorter than an hour.
  pub fn period(&self) -> Duration {
    Duration::from_secs(self.interval_hours.max(1).saturating_mul(3600))
  }
}

// ─── Metrics ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunityDetection {
  #[default]
  Louvain,
  /// Every node gets community `-1`.
  None,
}

impl CommunityDetection {
  pub fn engine(self) -> MetricsEngine {
    match self {
      Self::Louvain => MetricsEngine::default(),
      Self::None => MetricsEngine::without_communities(),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
