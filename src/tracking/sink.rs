//! Metrics sinks

use crate::error::{PipelineError, Result};
use std::sync::Mutex;
use tracing::info;

/// Records named numeric values for later inspection
pub trait MetricsSink {
    fn record(&self, name: &str, value: f64) -> Result<()>;
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record(&self, _name: &str, _value: f64) -> Result<()> {
        Ok(())
    }
}

/// Emits each metric as a tracing event
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

impl MetricsSink for LoggingSink {
    fn record(&self, name: &str, value: f64) -> Result<()> {
        info!(metric = name, value, "Metric recorded");
        Ok(())
    }
}

/// Keeps recorded metrics in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(String, f64)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn records(&self) -> Vec<(String, f64)> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Latest value recorded under `name`
    pub fn get(&self, name: &str) -> Option<f64> {
        self.records()
            .into_iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

impl MetricsSink for MemorySink {
    fn record(&self, name: &str, value: f64) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| PipelineError::TrackingError("metric buffer poisoned".to_string()))?
            .push((name.to_string(), value));
        Ok(())
    }
}

impl<T: MetricsSink + ?Sized> MetricsSink for &T {
    fn record(&self, name: &str, value: f64) -> Result<()> {
        (**self).record(name, value)
    }
}
