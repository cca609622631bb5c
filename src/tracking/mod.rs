//! Experiment tracking
//!
//! The pipeline reports scores through the [`MetricsSink`] capability; the
//! caller decides what backs it. [`ExperimentTracker`] keeps runs in a
//! JSON store, [`LoggingSink`] only logs and [`NoopSink`] drops everything.

mod sink;
mod storage;
mod tracker;

pub use sink::{LoggingSink, MemorySink, MetricsSink, NoopSink};
pub use storage::{LocalStorage, StorageBackend};
pub use tracker::{Experiment, ExperimentTracker, Metric, Run, RunStatus, TrackingConfig};
