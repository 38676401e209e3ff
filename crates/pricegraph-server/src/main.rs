//! pricegraph binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `PRICEGRAPH_*` environment variables, opens the SQLite store and runs
//! one of:
//!
//! ```text
//! pricegraph analyse --min-interactions 2 --window-days 90 [--dry-run]
//! pricegraph import catalog.json
//! pricegraph serve
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use pricegraph_core::{
  events::SnapshotSubscriber,
  pipeline::{GraphParams, RunOutcome},
  snapshot::GraphType,
};
use pricegraph_server::{
  ServerConfig, app, build_pipeline,
  config::expand_tilde,
  events::{BroadcastSubscriber, spawn_logger},
  import::CatalogImport,
  scheduler::{Scheduler, run_with_retry},
};
use pricegraph_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Store co-occurrence graph snapshots")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Build one snapshot now, retrying failures per the retry policy.
  Analyse {
    /// Graph type, e.g. `magasin-magasin`.
    #[arg(long = "type")]
    graph_type:             Option<GraphType>,
    #[arg(long)]
    window_days:            Option<u32>,
    #[arg(long)]
    min_interactions:       Option<u32>,
    /// Skip products sold in more than this many stores.
    #[arg(long)]
    max_stores_per_product: Option<usize>,
    /// End of the window (RFC 3339); defaults to now.
    #[arg(long)]
    as_of:                  Option<DateTime<Utc>>,
    /// Compute and log, but write nothing.
    #[arg(long)]
    dry_run:                bool,
  },

  /// Load stores and price observations from a JSON file.
  Import { file: PathBuf },

  /// Serve the read API and run the scheduled trigger.
  Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let config = ServerConfig::load(&cli.config).context("failed to read configuration")?;
  let store_path = expand_tilde(&config.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command {
    Command::Analyse {
      graph_type,
      window_days,
      min_interactions,
      max_stores_per_product,
      as_of,
      dry_run,
    } => {
      let defaults = config.schedule.params();
      let params = GraphParams {
        graph_type: graph_type.unwrap_or(defaults.graph_type),
        window_days: window_days.unwrap_or(defaults.window_days),
        min_interactions: min_interactions.unwrap_or(defaults.min_interactions),
        max_stores_per_product: max_stores_per_product.or(defaults.max_stores_per_product),
        dry_run,
        as_of,
      };
      analyse(&store, &config, &params).await
    }
    Command::Import { file } => import(&store, &file).await,
    Command::Serve => serve(store, config).await,
  }
}

async fn analyse(
  store: &SqliteStore,
  config: &ServerConfig,
  params: &GraphParams,
) -> anyhow::Result<()> {
  let pipeline = build_pipeline(store, config, Vec::new());
  let outcome = run_with_retry(&pipeline, params, &config.retry)
    .await
    .context("snapshot run failed")?;

  if let RunOutcome::Skipped { graph_type } = &outcome {
    tracing::warn!(%graph_type, "nothing to do for this graph type");
  }
  println!("{}", serde_json::to_string_pretty(&outcome)?);
  Ok(())
}

async fn import(store: &SqliteStore, file: &Path) -> anyhow::Result<()> {
  let text = tokio::fs::read_to_string(file)
    .await
    .with_context(|| format!("failed to read {file:?}"))?;
  let doc = CatalogImport::from_json(&text)
    .with_context(|| format!("failed to parse {file:?}"))?;
  let (stores, observations) = doc.apply(store).await.context("import failed")?;
  tracing::info!(stores, observations, "catalog imported");
  Ok(())
}

async fn serve(store: SqliteStore, config: ServerConfig) -> anyhow::Result<()> {
  let (events, rx) = BroadcastSubscriber::channel(64);
  spawn_logger(rx);

  if config.schedule.enabled {
    let pipeline = build_pipeline(
      &store,
      &config,
      [Arc::new(events) as Arc<dyn SnapshotSubscriber>],
    );
    Scheduler::new(Arc::new(pipeline), config.schedule.clone(), config.retry.clone()).spawn();
  } else {
    tracing::info!("scheduled snapshots disabled");
  }

  let app = app(Arc::new(store));
  let address = config.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
