//! Experiment tracker
//!
//! Groups runs under named experiments and records their parameters and
//! metrics. Records are persisted through a [`StorageBackend`] whenever a
//! run ends.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::sink::MetricsSink;
use super::storage::{LocalStorage, StorageBackend};
use crate::error::{PipelineError, Result};

/// Tracking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Directory holding the experiment store
    pub output_dir: PathBuf,
    /// Experiment that new runs are filed under
    pub experiment_name: String,
    /// When false, the pipeline reports metrics to the log only
    pub enabled: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./mlruns"),
            experiment_name: "customer_satisfaction".to_string(),
            enabled: true,
        }
    }
}

/// One recorded metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub step: u64,
    pub timestamp: DateTime<Utc>,
}

/// Run lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// A single pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub run_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub params: HashMap<String, String>,
    /// Latest value per metric
    pub metrics: HashMap<String, f64>,
    pub metrics_history: Vec<Metric>,
    pub status: RunStatus,
}

impl Run {
    pub fn new(run_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().simple().to_string(),
            run_name: run_name.into(),
            start_time: Utc::now(),
            end_time: None,
            params: HashMap::new(),
            metrics: HashMap::new(),
            metrics_history: Vec::new(),
            status: RunStatus::Running,
        }
    }
}

/// Named collection of runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub runs: Vec<Run>,
}

impl Experiment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            experiment_id: Uuid::new_v4().simple().to_string(),
            name: name.into(),
            created_at: Utc::now(),
            runs: Vec::new(),
        }
    }

    /// Best finished run by a metric
    pub fn best_run(&self, metric_name: &str, maximize: bool) -> Option<&Run> {
        self.runs
            .iter()
            .filter(|r| r.status == RunStatus::Finished)
            .filter_map(|r| r.metrics.get(metric_name).map(|v| (r, *v)))
            .max_by(|(_, a), (_, b)| {
                let ord = a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal);
                if maximize { ord } else { ord.reverse() }
            })
            .map(|(r, _)| r)
    }
}

/// Records runs and metrics for one experiment
pub struct ExperimentTracker {
    config: TrackingConfig,
    storage: Box<dyn StorageBackend + Send + Sync>,
    experiments: RwLock<Vec<Experiment>>,
    current_run: RwLock<Option<Run>>,
}

impl ExperimentTracker {
    /// Tracker backed by [`LocalStorage`] in `config.output_dir`
    pub fn new(config: TrackingConfig) -> Result<Self> {
        let storage = LocalStorage::new(config.output_dir.clone());
        Self::with_storage(config, Box::new(storage))
    }

    /// Tracker over a custom backend; existing records are loaded eagerly
    pub fn with_storage(
        config: TrackingConfig,
        storage: Box<dyn StorageBackend + Send + Sync>,
    ) -> Result<Self> {
        let experiments = storage.load_experiments()?;
        debug!(
            location = %storage.location(),
            experiments = experiments.len(),
            "Experiment store opened"
        );
        Ok(Self {
            config,
            storage,
            experiments: RwLock::new(experiments),
            current_run: RwLock::new(None),
        })
    }

    /// Where records are stored
    pub fn tracking_uri(&self) -> String {
        self.storage.location()
    }

    pub fn experiment_name(&self) -> &str {
        &self.config.experiment_name
    }

    /// Begin a run; fails if one is already active
    pub fn start_run(&self, run_name: impl Into<String>) -> Result<String> {
        let mut current = self.current_run.write().map_err(poisoned)?;
        if let Some(active) = current.as_ref() {
            return Err(PipelineError::TrackingError(format!(
                "run {} is still active",
                active.run_id
            )));
        }

        let run = Run::new(run_name);
        let run_id = run.run_id.clone();
        info!(run_id = %run_id, experiment = %self.config.experiment_name, "Run started");
        *current = Some(run);
        Ok(run_id)
    }

    pub fn log_param(&self, key: impl Into<String>, value: impl ToString) -> Result<()> {
        self.with_active_run(|run| {
            run.params.insert(key.into(), value.to_string());
        })
    }

    pub fn log_metric(&self, name: &str, value: f64) -> Result<()> {
        self.with_active_run(|run| {
            let step = run
                .metrics_history
                .iter()
                .filter(|m| m.name == name)
                .count() as u64;
            run.metrics.insert(name.to_string(), value);
            run.metrics_history.push(Metric {
                name: name.to_string(),
                value,
                step,
                timestamp: Utc::now(),
            });
        })
    }

    /// Close the active run and persist every experiment
    pub fn end_run(&self, status: RunStatus) -> Result<Run> {
        let mut run = self
            .current_run
            .write()
            .map_err(poisoned)?
            .take()
            .ok_or_else(|| PipelineError::TrackingError("no active run".to_string()))?;
        run.status = status;
        run.end_time = Some(Utc::now());

        let snapshot = {
            let mut experiments = self.experiments.write().map_err(poisoned)?;
            let name = &self.config.experiment_name;
            let idx = match experiments.iter().position(|e| &e.name == name) {
                Some(idx) => idx,
                None => {
                    experiments.push(Experiment::new(name.clone()));
                    experiments.len() - 1
                }
            };
            experiments[idx].runs.push(run.clone());
            experiments.clone()
        };

        self.storage.save_experiments(&snapshot)?;
        info!(run_id = %run.run_id, status = ?run.status, "Run ended");
        Ok(run)
    }

    /// Id of the active run, if any
    pub fn active_run_id(&self) -> Option<String> {
        self.current_run
            .read()
            .ok()
            .and_then(|r| r.as_ref().map(|run| run.run_id.clone()))
    }

    /// The tracked experiment, if it has any ended runs
    pub fn experiment(&self) -> Option<Experiment> {
        self.experiments
            .read()
            .ok()?
            .iter()
            .find(|e| e.name == self.config.experiment_name)
            .cloned()
    }

    fn with_active_run(&self, f: impl FnOnce(&mut Run)) -> Result<()> {
        let mut current = self.current_run.write().map_err(poisoned)?;
        let run = current
            .as_mut()
            .ok_or_else(|| PipelineError::TrackingError("no active run".to_string()))?;
        f(run);
        Ok(())
    }
}

impl MetricsSink for ExperimentTracker {
    fn record(&self, name: &str, value: f64) -> Result<()> {
        self.log_metric(name, value)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> PipelineError {
    PipelineError::TrackingError("tracker lock poisoned".to_string())
}
