//! In-process trigger: run the pipeline on a fixed interval.

use std::sync::Arc;

use pricegraph_core::{
  Error,
  pipeline::{GraphParams, RunOutcome, SnapshotPipeline},
  store::{ObservationSource, SnapshotStore},
};
use tokio::{
  task::JoinHandle,
  time::{Instant, MissedTickBehavior},
};
use tracing::{error, info, warn};

use crate::{
  config::ScheduleConfig,
  retry::{RetryPolicy, with_retry},
};

/// Run the pipeline once under `policy`. Skipped runs and invalid parameters
/// are not retried.
pub async fn run_with_retry<O, S>(
  pipeline: &SnapshotPipeline<O, S>,
  params: &GraphParams,
  policy: &RetryPolicy,
) -> Result<RunOutcome, Error>
where
  O: ObservationSource,
  S: SnapshotStore,
{
  with_retry(policy, || pipeline.run(params), Error::is_retryable).await
}

pub struct Scheduler<O, S> {
  pipeline: Arc<SnapshotPipeline<O, S>>,
  schedule: ScheduleConfig,
  retry:    RetryPolicy,
}

impl<O, S> Scheduler<O, S>
where
  O: ObservationSource + 'static,
  S: SnapshotStore + 'static,
{
  pub fn new(
    pipeline: Arc<SnapshotPipeline<O, S>>,
    schedule: ScheduleConfig,
    retry: RetryPolicy,
  ) -> Self {
    Self { pipeline, schedule, retry }
  }

  /// One scheduled run, followed by pruning if the run wrote a snapshot.
  pub async fn tick(&self) -> Result<RunOutcome, Error> {
    let params = self.schedule.params();
    let outcome = run_with_retry(&self.pipeline, &params, &self.retry).await?;

    if let (RunOutcome::Written(_), Some(keep)) = (&outcome, self.schedule.retain_snapshots) {
      match self.pipeline.store().prune_snapshots(params.graph_type, keep).await {
        Ok(0) => {}
        Ok(removed) => info!(removed, keep, "pruned old snapshots"),
        Err(e) => warn!(error = %e, "snapshot pruning failed"),
      }
    }
    Ok(outcome)
  }

  /// Run [`Self::tick`] forever on the configured interval.
  pub fn spawn(self) -> JoinHandle<()> {
    tokio::spawn(async move {
      let period = self.schedule.period();
      let first = if self.schedule.run_on_start {
        Instant::now()
      } else {
        Instant::now() + period
      };
      let mut interval = tokio::time::interval_at(first, period);
      interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

      info!(
        every_hours = self.schedule.interval_hours,
        graph_type = %self.schedule.graph_type,
        run_on_start = self.schedule.run_on_start,
        "snapshot schedule started"
      );
      loop {
        interval.tick().await;
        if let Err(e) = self.tick().await {
          error!(error = %e, "scheduled snapshot run failed");
        }
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration as Days, Utc};
  use pricegraph_core::{observation::PriceObservation, snapshot::GraphType};
  use pricegraph_store_sqlite::SqliteStore;

  use super::*;

  async fn seeded() -> SqliteStore {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let t = Utc::now() - Days::days(1);
    for (product, store) in [(1, 1), (1, 2), (2, 2), (2, 3)] {
      s.record_observation(PriceObservation::new(product, store, 2.0, t))
        .await
        .unwrap();
    }
    s
  }

  fn scheduler(s: &SqliteStore, schedule: ScheduleConfig) -> Scheduler<SqliteStore, SqliteStore> {
    let pipeline = Arc::new(SnapshotPipeline::new(s.clone(), s.clone()));
    Scheduler::new(pipeline, schedule, RetryPolicy { max_retries: 0, delay_secs: 0 })
  }

  #[tokio::test]
  async fn tick_writes_a_snapshot() {
    let s = seeded().await;
    let schedule = ScheduleConfig { min_interactions: 1, ..Default::default() };
    let outcome = scheduler(&s, schedule).tick().await.unwrap();
    let RunOutcome::Written(w) = outcome else { panic!("expected a write") };
    assert_eq!(w.snapshot.node_count, 3);
    assert_eq!(w.snapshot.edge_count, 2);
  }

  #[tokio::test]
  async fn tick_prunes_when_retention_is_set() {
    let s = seeded().await;
    let schedule = ScheduleConfig { retain_snapshots: Some(1), ..Default::default() };
    let sched = scheduler(&s, schedule);

    sched.tick().await.unwrap();
    let RunOutcome::Written(latest) = sched.tick().await.unwrap() else {
      panic!("expected a write")
    };

    let left = s.list_snapshots(None, 10).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].snapshot_id, latest.snapshot.snapshot_id);
  }

  #[tokio::test]
  async fn unsupported_type_is_skipped() {
    let s = seeded().await;
    let schedule = ScheduleConfig { graph_type: GraphType::ClientClient, ..Default::default() };
    let outcome = scheduler(&s, schedule).tick().await.unwrap();
    assert!(matches!(outcome, RunOutcome::Skipped { .. }));
    assert!(s.list_snapshots(None, 10).await.unwrap().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn invalid_window_fails_without_retrying() {
    let s = seeded().await;
    let pipeline = Arc::new(SnapshotPipeline::new(s.clone(), s.clone()));
    let schedule = ScheduleConfig { window_days: u32::MAX, ..Default::default() };
    let sched = Scheduler::new(pipeline, schedule, RetryPolicy::default());

    let start = Instant::now();
    assert!(matches!(sched.tick().await, Err(Error::InvalidWindow(_))));
    assert_eq!(start.elapsed(), std::time::Duration::ZERO);
    assert!(s.list_snapshots(None, 10).await.unwrap().is_empty());
  }
}
