//! Core types and algorithms for the pricegraph snapshot pipeline.
//!
//! Builds store co-occurrence graphs from price observations, computes
//! graph metrics and store KPIs, and hands finished snapshots to whatever
//! [`store::SnapshotStore`] backend the caller provides. No HTTP or
//! database code lives here.

pub mod error;
pub mod events;
pub mod export;
pub mod graph;
pub mod metrics;
pub mod observation;
pub mod pipeline;
pub mod snapshot;
pub mod store;

pub use error::{Error, Result};
