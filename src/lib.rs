//! Customer satisfaction pipeline
//!
//! Predicts an order's review score from tabular order data with a linear
//! regression, and redeploys the model whenever it clears an accuracy gate.
//!
//! # Modules
//!
//! - [`cleaning`] - preprocessing and train/test division strategies
//! - [`training`] - the train contract and linear regression
//! - [`evaluation`] - MSE, RMSE and R2 scores
//! - [`tracking`] - experiment tracking and metric sinks
//! - [`deployment`] - local model registry and prediction services
//! - [`pipeline`] - the training, deployment and inference pipelines
//! - [`config`] - JSON pipeline configuration
//! - [`cli`] - command-line interface

pub mod error;

pub mod cleaning;
pub mod evaluation;
pub mod training;

pub mod deployment;
pub mod tracking;

pub mod config;
pub mod pipeline;

pub mod cli;
pub mod utils;

pub use error::{PipelineError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{PipelineError, Result};

    pub use crate::cleaning::{
        CleaningOutput, DataCleaning, DataDivideStrategy, DataPreProcessStrategy, DataStrategy,
        DivideConfig, PreprocessConfig, Split,
    };

    pub use crate::training::{
        LinearRegression, LinearRegressionModel, LinearRegressionOptions, Model, Predict,
        TrainedModel,
    };

    pub use crate::evaluation::{Evaluation, EvaluationScores, MetricKind, Mse, Rmse, R2};

    pub use crate::tracking::{ExperimentTracker, LoggingSink, MetricsSink, NoopSink, TrackingConfig};

    pub use crate::deployment::{DeploymentConfig, ModelDeployer, PredictionService};

    pub use crate::config::PipelineConfig;

    pub use crate::pipeline::{
        continuous_deployment_pipeline, inference_pipeline, train_pipeline, InferenceInput,
    };
}
