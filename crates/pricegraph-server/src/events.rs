//! Fan-out of snapshot events over a broadcast channel.

use pricegraph_core::events::{SnapshotSubscriber, SnapshotWritten};
use tokio::{
  sync::broadcast::{self, error::RecvError},
  task::JoinHandle,
};
use tracing::{info, warn};

/// Forwards every [`SnapshotWritten`] onto a `tokio` broadcast channel.
#[derive(Clone)]
pub struct BroadcastSubscriber {
  tx: broadcast::Sender<SnapshotWritten>,
}

impl BroadcastSubscriber {
  pub fn channel(capacity: usize) -> (Self, broadcast::Receiver<SnapshotWritten>) {
    let (tx, rx) = broadcast::channel(capacity);
    (Self { tx }, rx)
  }

  pub fn subscribe(&self) -> broadcast::Receiver<SnapshotWritten> { self.tx.subscribe() }
}

impl SnapshotSubscriber for BroadcastSubscriber {
  fn snapshot_written(&self, event: &SnapshotWritten) {
    // No receivers is not an error.
    let _ = self.tx.send(event.clone());
  }
}

/// Log every event until the channel closes.
pub fn spawn_logger(mut rx: broadcast::Receiver<SnapshotWritten>) -> JoinHandle<()> {
  tokio::spawn(async move {
    loop {
      match rx.recv().await {
        Ok(e) => info!(
          snapshot_id = %e.snapshot.snapshot_id,
          graph_type = %e.snapshot.graph_type,
          nodes = e.snapshot.node_count,
          edges = e.snapshot.edge_count,
          created = e.created,
          "snapshot published"
        ),
        Err(RecvError::Lagged(skipped)) => warn!(skipped, "snapshot event logger lagged"),
        Err(RecvError::Closed) => break,
      }
    }
  })
}
