//! Notifications emitted after a snapshot is committed.

use serde::Serialize;

use crate::snapshot::{GraphSnapshot, SnapshotWrite};

/// Emitted once per successful, non-dry-run write.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotWritten {
  pub snapshot: GraphSnapshot,
  /// `false` when an existing snapshot was overwritten.
  pub created:  bool,
}

impl From<&SnapshotWrite> for SnapshotWritten {
  fn from(w: &SnapshotWrite) -> Self {
    Self { snapshot: w.snapshot.clone(), created: w.created }
  }
}

/// Receives [`SnapshotWritten`] events from the pipeline.
///
/// Called synchronously after the transaction commits; implementations
/// should hand the event off rather than do heavy work inline.
pub trait SnapshotSubscriber: Send + Sync {
  fn snapshot_written(&self, event: &SnapshotWritten);
}

impl<F> SnapshotSubscriber for F
where
  F: Fn(&SnapshotWritten) + Send + Sync,
{
  fn snapshot_written(&self, event: &SnapshotWritten) { self(event) }
}
