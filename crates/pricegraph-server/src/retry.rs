//! Fixed-delay retry for whole pipeline runs, built on `backon`.

use std::{fmt::Display, future::Future, time::Duration};

use backon::{ConstantBuilder, Retryable as _};
use serde::Deserialize;
use tracing::{error, warn};

/// How often, and how far apart, a failed run is retried.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Retries after the first attempt, so `max_retries + 1` attempts total.
  pub max_retries: u32,
  pub delay_secs:  u64,
}

impl Default for RetryPolicy {
  fn default() -> Self { Self { max_retries: 3, delay_secs: 60 } }
}

impl RetryPolicy {
  pub fn delay(&self) -> Duration { Duration::from_secs(self.delay_secs) }

  pub fn max_attempts(&self) -> u32 { self.max_retries.saturating_add(1) }

  /// Constant backoff: `max_retries` waits of `delay_secs`, no jitter.
  pub fn backoff(&self) -> ConstantBuilder {
    ConstantBuilder::default()
      .with_delay(self.delay())
      .with_max_times(self.max_retries as usize)
  }
}

/// Run `op` until it succeeds, `retryable` rejects its error, or the policy
/// is exhausted.
///
/// Any `Ok` value, including a skipped run, ends the loop. The last error is
/// returned when no attempt succeeded.
pub async fn with_retry<T, E, F, Fut>(
  policy: &RetryPolicy,
  op: F,
  retryable: impl FnMut(&E) -> bool,
) -> Result<T, E>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
  E: Display,
{
  let max_attempts = policy.max_attempts();
  op.retry(policy.backoff())
    .when(retryable)
    .notify(|e: &E, dur: Duration| {
      warn!(error = %e, delay = ?dur, max_attempts, "attempt failed, retrying");
    })
    .await
    .inspect_err(|e| error!(error = %e, max_attempts, "giving up"))
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;

  fn instant(max_retries: u32) -> RetryPolicy { RetryPolicy { max_retries, delay_secs: 0 } }

  #[tokio::test]
  async fn succeeds_after_transient_failures() {
    let calls = AtomicU32::new(0);
    let result: Result<u32, String> = with_retry(&instant(3), || async {
      let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
      if n < 3 { Err(format!("failure {n}")) } else { Ok(n) }
    }, |_| true)
    .await;
    assert_eq!(result, Ok(3));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn gives_up_after_max_retries() {
    let calls = AtomicU32::new(0);
    let result: Result<(), String> = with_retry(&instant(3), || async {
      calls.fetch_add(1, Ordering::SeqCst);
      Err("down".to_string())
    }, |_| true)
    .await;
    assert_eq!(result, Err("down".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
  }

  #[tokio::test]
  async fn zero_retries_means_one_attempt() {
    let calls = AtomicU32::new(0);
    let _: Result<(), &str> = with_retry(&instant(0), || async {
      calls.fetch_add(1, Ordering::SeqCst);
      Err("down")
    }, |_| true)
    .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn waits_between_attempts() {
    let start = tokio::time::Instant::now();
    let policy = RetryPolicy { max_retries: 2, delay_secs: 60 };
    let _: Result<(), &str> = with_retry(&policy, || async { Err("down") }, |_| true).await;
    assert_eq!(start.elapsed(), Duration::from_secs(120));
  }

  #[tokio::test(start_paused = true)]
  async fn permanent_errors_are_not_retried() {
    let start = tokio::time::Instant::now();
    let calls = AtomicU32::new(0);
    let result: Result<(), &str> = with_retry(
      &RetryPolicy::default(),
      || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err("bad input")
      },
      |e| *e != "bad input",
    )
    .await;
    assert_eq!(result, Err("bad input"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
  }

  #[test]
  fn backoff_is_constant() {
    use backon::BackoffBuilder as _;
    let delays: Vec<Duration> = RetryPolicy::default().backoff().build().collect();
    assert_eq!(delays, vec![Duration::from_secs(60); 3]);
  }
}
