//! Pipeline configuration
//!
//! One JSON document configures every step. Missing sections fall back to
//! their defaults, so `{}` is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cleaning::{DivideConfig, PreprocessConfig};
use crate::deployment::DeploymentConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::{DeploymentTriggerConfig, IngestConfig};
use crate::tracking::TrackingConfig;
use crate::training::LinearRegressionOptions;

/// Configuration for the training, deployment and inference pipelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name the deployment is registered under
    pub pipeline_name: String,
    pub ingest: IngestConfig,
    pub preprocess: PreprocessConfig,
    pub divide: DivideConfig,
    pub model: LinearRegressionOptions,
    pub trigger: DeploymentTriggerConfig,
    pub deployment: DeploymentConfig,
    pub tracking: TrackingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline_name: "continuous_deployment_pipeline".to_string(),
            ingest: IngestConfig::default(),
            preprocess: PreprocessConfig::default(),
            divide: DivideConfig::default(),
            model: LinearRegressionOptions::default(),
            trigger: DeploymentTriggerConfig::default(),
            deployment: DeploymentConfig::default(),
            tracking: TrackingConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            PipelineError::ConfigError(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let test_size = self.divide.test_size;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(PipelineError::ConfigError(format!(
                "divide.test_size must be in (0, 1), got {}",
                test_size
            )));
        }
        if !self.trigger.min_accuracy.is_finite() {
            return Err(PipelineError::ConfigError(
                "trigger.min_accuracy must be finite".to_string(),
            ));
        }
        if self.deployment.workers == 0 {
            return Err(PipelineError::ConfigError(
                "deployment.workers must be at least 1".to_string(),
            ));
        }
        if self.pipeline_name.is_empty() {
            return Err(PipelineError::ConfigError(
                "pipeline_name must not be empty".to_string(),
            ));
        }
        if self.divide.target_column.is_empty() {
            return Err(PipelineError::ConfigError(
                "divide.target_column must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_data_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.ingest.data_path = path.into();
        self
    }

    pub fn with_min_accuracy(mut self, min_accuracy: f64) -> Self {
        self.trigger.min_accuracy = min_accuracy;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.deployment.workers = workers;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.deployment.timeout_secs = timeout_secs;
        self
    }

    pub fn with_preprocess(mut self, preprocess: PreprocessConfig) -> Self {
        self.preprocess = preprocess;
        self
    }

    pub fn with_divide(mut self, divide: DivideConfig) -> Self {
        self.divide = divide;
        self
    }

    pub fn with_registry_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.deployment.registry_dir = dir.into();
        self
    }

    pub fn with_tracking(mut self, tracking: TrackingConfig) -> Self {
        self.tracking = tracking;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new();
        assert_eq!(config.trigger.min_accuracy, 0.92);
        assert_eq!(config.divide.test_size, 0.2);
        assert_eq!(config.divide.random_state, 100);
        assert_eq!(config.divide.target_column, "review_score");
        assert!(config.model.fit_intercept);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"trigger": {"min_accuracy": 0.5}, "model": {"normalize": true}}"#)
            .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.trigger.min_accuracy, 0.5);
        assert!(config.model.normalize);
        assert!(config.model.fit_intercept);
        assert_eq!(config.pipeline_name, "continuous_deployment_pipeline");
    }

    #[test]
    fn test_unknown_model_option_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"model": {"max_iter": 10}}"#).unwrap();
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        let config = PipelineConfig::new().with_min_accuracy(0.7).with_workers(3);
        config.save(&path).unwrap();
        assert_eq!(PipelineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_validation() {
        let bad = PipelineConfig::new().with_workers(0);
        assert!(bad.validate().is_err());

        let bad = PipelineConfig::new().with_min_accuracy(f64::NAN);
        assert!(bad.validate().is_err());

        let mut bad = PipelineConfig::new();
        bad.divide.test_size = 0.0;
        assert!(bad.validate().is_err());
    }
}
