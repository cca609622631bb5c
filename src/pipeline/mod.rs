//! Pipelines
//!
//! - [`train_pipeline`] - ingest, clean, train, evaluate
//! - [`continuous_deployment_pipeline`] - the above plus the deployment gate
//! - [`inference_pipeline`] - query the deployed model

mod steps;

pub use steps::{
    clean_df, deploy_model, deployment_trigger, evaluate_model, ingest_df, train_model,
    DeploymentTriggerConfig, IngestConfig,
};

use std::path::PathBuf;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cleaning::DataPreProcessStrategy;
use crate::config::PipelineConfig;
use crate::deployment::{DeploymentRecord, ModelDeployer, PredictionService, SplitPayload};
use crate::error::{PipelineError, Result};
use crate::evaluation::EvaluationScores;
use crate::tracking::MetricsSink;
use crate::training::TrainedModel;
use crate::utils::{column_names, column_to_f64};

/// Output of [`train_pipeline`]
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub scores: EvaluationScores,
    pub n_train: usize,
    pub n_test: usize,
}

/// Output of [`continuous_deployment_pipeline`]
#[derive(Debug, Clone)]
pub struct DeploymentRunSummary {
    pub scores: EvaluationScores,
    pub decision: bool,
    /// Present only when the gate passed
    pub deployment: Option<DeploymentRecord>,
    pub n_train: usize,
    pub n_test: usize,
}

/// Batch fed to [`inference_pipeline`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InferenceInput {
    /// JSON file holding records or a split payload
    Json(PathBuf),
    /// First `rows` rows of the configured dataset, cleaned like training data
    Sample { rows: usize },
}

/// Train and evaluate a model from the configured dataset
pub fn train_pipeline(config: &PipelineConfig, sink: &dyn MetricsSink) -> Result<TrainingOutcome> {
    let df = ingest_df(&config.ingest)?;
    let split = clean_df(&df, &config.preprocess, &config.divide)?;
    let model = train_model(&split, &config.model)?;
    let scores = evaluate_model(&model, &split.x_test, &split.y_test, sink)?;

    Ok(TrainingOutcome {
        model,
        scores,
        n_train: split.n_train(),
        n_test: split.n_test(),
    })
}

/// Train, evaluate and deploy when R2 reaches `config.trigger.min_accuracy`
pub fn continuous_deployment_pipeline(
    config: &PipelineConfig,
    sink: &dyn MetricsSink,
    deployer: &ModelDeployer,
) -> Result<DeploymentRunSummary> {
    info!(pipeline = %config.pipeline_name, "Running continuous deployment pipeline");

    let outcome = train_pipeline(config, sink)?;
    let decision = deployment_trigger(outcome.scores.r2, &config.trigger);
    let deployment = deploy_model(
        deployer,
        &config.pipeline_name,
        &outcome.model,
        outcome.scores,
        decision,
    )?;

    Ok(DeploymentRunSummary {
        scores: outcome.scores,
        decision,
        deployment,
        n_train: outcome.n_train,
        n_test: outcome.n_test,
    })
}

/// Load the running deployment for `pipeline_name`
pub fn prediction_service_loader(
    deployer: &ModelDeployer,
    pipeline_name: &str,
) -> Result<PredictionService> {
    deployer
        .find_model_server(pipeline_name, true)?
        .ok_or_else(|| {
            PipelineError::DeploymentError(format!(
                "no running prediction service for pipeline '{}' in {}",
                pipeline_name,
                deployer.registry_dir().display()
            ))
        })
}

/// Produce the JSON request body for an inference batch
pub fn dynamic_importer(config: &PipelineConfig, input: &InferenceInput) -> Result<String> {
    match input {
        InferenceInput::Json(path) => Ok(std::fs::read_to_string(path)?),
        InferenceInput::Sample { rows } => {
            let df = ingest_df(&config.ingest)?;
            let cleaned = DataPreProcessStrategy::with_config(config.preprocess.clone())
                .preprocess(&df)?;
            let features = match cleaned.column(&config.divide.target_column) {
                Ok(_) => cleaned.drop(&config.divide.target_column)?,
                Err(_) => cleaned,
            };
            let batch = features.head(Some(*rows));
            Ok(serde_json::to_string(&frame_to_split_payload(&batch)?)?)
        }
    }
}

/// Run a JSON request body through the service
pub fn predictor(service: &PredictionService, body: &str) -> Result<Vec<f64>> {
    let predictions = service.predict_json(body)?;
    info!(
        service_id = %service.service_id(),
        predictions = predictions.len(),
        "Inference complete"
    );
    Ok(predictions)
}

/// Query the deployed model with a batch
pub fn inference_pipeline(
    config: &PipelineConfig,
    deployer: &ModelDeployer,
    input: &InferenceInput,
) -> Result<Vec<f64>> {
    let body = dynamic_importer(config, input)?;
    let service = prediction_service_loader(deployer, &config.pipeline_name)?;
    predictor(&service, &body)
}

fn frame_to_split_payload(df: &DataFrame) -> Result<SplitPayload> {
    let columns = column_names(df);
    let values: Vec<Vec<f64>> = columns
        .iter()
        .map(|name| column_to_f64(df, name, "feature"))
        .collect::<Result<_>>()?;
    let data = (0..df.height())
        .map(|row| values.iter().map(|col| col[row]).collect())
        .collect();
    Ok(SplitPayload { columns, data })
}
