//! Local model registry
//!
//! Each pipeline has at most one deployment, stored as
//! `<registry_dir>/<pipeline_name>.json`. Deploying again replaces it with
//! a higher version.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::service::PredictionService;
use crate::error::{PipelineError, Result};
use crate::evaluation::EvaluationScores;
use crate::training::TrainedModel;

/// Registry and serving settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Directory holding deployment records
    pub registry_dir: PathBuf,
    /// Worker count recorded for the prediction service
    pub workers: usize,
    /// Service start/stop timeout in seconds
    pub timeout_secs: u64,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            registry_dir: PathBuf::from("./deployments"),
            workers: 1,
            timeout_secs: 60,
        }
    }
}

/// Prediction service state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Running,
    Stopped,
}

/// Stored deployment: the model plus serving metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub service_id: String,
    pub pipeline_name: String,
    pub version: u32,
    pub status: ServiceStatus,
    pub workers: usize,
    pub timeout_secs: u64,
    pub created_at: DateTime<Utc>,
    pub scores: Option<EvaluationScores>,
    pub model: TrainedModel,
}

/// Deploys models into the registry and hands out prediction services
#[derive(Debug, Clone)]
pub struct ModelDeployer {
    config: DeploymentConfig,
}

impl ModelDeployer {
    pub fn new(config: DeploymentConfig) -> Self {
        Self { config }
    }

    pub fn registry_dir(&self) -> &Path {
        &self.config.registry_dir
    }

    /// Deploy `model` when `decision` is true; returns the new record.
    pub fn deploy(
        &self,
        pipeline_name: &str,
        model: &TrainedModel,
        scores: Option<EvaluationScores>,
        decision: bool,
    ) -> Result<Option<DeploymentRecord>> {
        if !decision {
            info!(pipeline = pipeline_name, "Deployment decision is negative, skipping deployment");
            return Ok(None);
        }

        let previous = self.load_record(pipeline_name)?;
        let version = previous.as_ref().map_or(1, |r| r.version + 1);
        if let Some(prev) = &previous {
            info!(
                pipeline = pipeline_name,
                service_id = %prev.service_id,
                version = prev.version,
                "Replacing existing deployment"
            );
        }

        let record = DeploymentRecord {
            service_id: Uuid::new_v4().to_string(),
            pipeline_name: pipeline_name.to_string(),
            version,
            status: ServiceStatus::Running,
            workers: self.config.workers,
            timeout_secs: self.config.timeout_secs,
            created_at: Utc::now(),
            scores,
            model: model.clone(),
        };
        self.save_record(&record)?;

        info!(
            pipeline = pipeline_name,
            service_id = %record.service_id,
            version,
            workers = record.workers,
            "Model deployed"
        );
        Ok(Some(record))
    }

    /// Service for a pipeline's deployment, if any.
    ///
    /// With `running_only`, a stopped deployment is treated as absent.
    pub fn find_model_server(
        &self,
        pipeline_name: &str,
        running_only: bool,
    ) -> Result<Option<PredictionService>> {
        let service = self
            .load_record(pipeline_name)?
            .map(PredictionService::new)
            .filter(|s| !running_only || s.is_running());
        Ok(service)
    }

    /// Mark a pipeline's deployment as stopped
    pub fn stop_service(&self, pipeline_name: &str) -> Result<()> {
        let mut record = self.load_record(pipeline_name)?.ok_or_else(|| {
            PipelineError::DeploymentError(format!("no deployment for pipeline '{}'", pipeline_name))
        })?;
        if record.status == ServiceStatus::Stopped {
            warn!(pipeline = pipeline_name, "Service already stopped");
            return Ok(());
        }
        record.status = ServiceStatus::Stopped;
        self.save_record(&record)?;
        info!(pipeline = pipeline_name, service_id = %record.service_id, "Service stopped");
        Ok(())
    }

    fn record_path(&self, pipeline_name: &str) -> Result<PathBuf> {
        let valid = !pipeline_name.is_empty()
            && pipeline_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(PipelineError::DeploymentError(format!(
                "invalid pipeline name '{}'",
                pipeline_name
            )));
        }
        Ok(self.config.registry_dir.join(format!("{}.json", pipeline_name)))
    }

    fn load_record(&self, pipeline_name: &str) -> Result<Option<DeploymentRecord>> {
        let path = self.record_path(pipeline_name)?;
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn save_record(&self, record: &DeploymentRecord) -> Result<()> {
        let path = self.record_path(&record.pipeline_name)?;
        fs::create_dir_all(&self.config.registry_dir)?;
        fs::write(path, serde_json::to_string_pretty(record)?)?;
        Ok(())
    }
}
