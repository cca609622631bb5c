//! Pipeline steps
//!
//! Each step is a plain function over explicit inputs, run in order
//! ingest → clean → train → evaluate → trigger → deploy.

use std::path::PathBuf;

use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cleaning::{
    DataCleaning, DataDivideStrategy, DataPreProcessStrategy, DivideConfig, PreprocessConfig, Split,
};
use crate::deployment::{DeploymentRecord, ModelDeployer};
use crate::error::{PipelineError, Result};
use crate::evaluation::{Evaluation, EvaluationScores, Mse, Rmse, R2};
use crate::training::{LinearRegressionModel, LinearRegressionOptions, Model, Predict, TrainedModel};
use crate::tracking::MetricsSink;
use crate::utils::series_to_array1;

/// Where and how to read the raw dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub data_path: PathBuf,
    /// Field delimiter byte
    pub delimiter: char,
    /// Rows read to infer column types
    pub infer_schema_length: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/olist_customers_dataset.csv"),
            delimiter: ',',
            infer_schema_length: 10_000,
        }
    }
}

/// Threshold for the deployment gate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentTriggerConfig {
    pub min_accuracy: f64,
}

impl Default for DeploymentTriggerConfig {
    fn default() -> Self {
        Self { min_accuracy: 0.92 }
    }
}

/// Read the raw dataset from a delimited file
pub fn ingest_df(config: &IngestConfig) -> Result<DataFrame> {
    if !config.delimiter.is_ascii() {
        return Err(PipelineError::ConfigError(format!(
            "delimiter must be a single ASCII character, got '{}'",
            config.delimiter
        )));
    }

    let parse_options = CsvParseOptions::default().with_separator(config.delimiter as u8);
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(config.infer_schema_length))
        .with_parse_options(parse_options)
        .try_into_reader_with_file_path(Some(config.data_path.clone()))
        .and_then(|reader| reader.finish())
        .map_err(|e| {
            PipelineError::DataError(format!("cannot read {}: {}", config.data_path.display(), e))
        })?;

    info!(
        path = %config.data_path.display(),
        rows = df.height(),
        columns = df.width(),
        "Data ingested"
    );
    Ok(df)
}

/// Preprocess the raw frame and divide it into a train/test split
pub fn clean_df(df: &DataFrame, preprocess: &PreprocessConfig, divide: &DivideConfig) -> Result<Split> {
    let processed = DataCleaning::new(df, DataPreProcessStrategy::with_config(preprocess.clone()))
        .handle_data()?
        .into_dataset()?;

    let split = DataCleaning::new(&processed, DataDivideStrategy::with_config(divide.clone()))
        .handle_data()?
        .into_split()?;

    info!("Data cleaning complete");
    Ok(split)
}

/// Fit a linear regression on the training partition
pub fn train_model(split: &Split, options: &LinearRegressionOptions) -> Result<TrainedModel> {
    LinearRegressionModel.train(&split.x_train, &split.y_train, options)
}

/// Score `model` on the test partition and report each score to `sink`.
///
/// All three scores are computed before anything is reported; sink
/// failures are logged and do not affect the result.
pub fn evaluate_model(
    model: &dyn Predict,
    x_test: &DataFrame,
    y_test: &Series,
    sink: &dyn MetricsSink,
) -> Result<EvaluationScores> {
    let y_true: Array1<f64> = series_to_array1(y_test)?;
    let y_pred = model.predict(x_test)?;

    let scores = EvaluationScores {
        mse: Mse.calculate_scores(&y_true, &y_pred)?,
        rmse: Rmse.calculate_scores(&y_true, &y_pred)?,
        r2: R2.calculate_scores(&y_true, &y_pred)?,
    };

    for (kind, value) in scores.pairs() {
        if let Err(e) = sink.record(kind.name(), value) {
            warn!(metric = kind.name(), error = %e, "Failed to record metric");
        }
    }

    info!(mse = scores.mse, rmse = scores.rmse, r2 = scores.r2, "Model evaluated");
    Ok(scores)
}

/// Gate: deploy only when the evaluated accuracy reaches the threshold
pub fn deployment_trigger(accuracy: f64, config: &DeploymentTriggerConfig) -> bool {
    let decision = accuracy >= config.min_accuracy;
    info!(accuracy, min_accuracy = config.min_accuracy, decision, "Deployment trigger evaluated");
    decision
}

/// Hand the model to the deployer, which acts only on a positive decision
pub fn deploy_model(
    deployer: &ModelDeployer,
    pipeline_name: &str,
    model: &TrainedModel,
    scores: EvaluationScores,
    decision: bool,
) -> Result<Option<DeploymentRecord>> {
    deployer.deploy(pipeline_name, model, Some(scores), decision)
}
