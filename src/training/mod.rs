//! Model training
//!
//! [`Model`] is the uniform train contract; [`LinearRegressionModel`] is the
//! one trainer provided. Training yields a [`TrainedModel`], which carries
//! the feature names it was fitted on and is consumed through [`Predict`].

pub mod linear_models;

pub use linear_models::{LinearRegression, LinearRegressionOptions};

use crate::error::{PipelineError, Result};
use crate::utils::{column_names, frame_to_array2, series_to_array1};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info};

/// Anything that can turn a feature frame into predictions
pub trait Predict {
    fn predict(&self, x: &DataFrame) -> Result<Array1<f64>>;
}

/// Uniform training contract
pub trait Model {
    /// Estimator configuration forwarded as-is
    type Options;

    fn train(
        &self,
        x_train: &DataFrame,
        y_train: &Series,
        options: &Self::Options,
    ) -> Result<TrainedModel>;
}

/// Fitted estimator variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    LinearRegression(LinearRegression),
}

impl Estimator {
    pub fn name(&self) -> &'static str {
        match self {
            Estimator::LinearRegression(_) => "linear_regression",
        }
    }

    fn predict_array(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::LinearRegression(model) => model.predict(x),
        }
    }
}

/// A fitted model together with the schema it expects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub estimator: Estimator,
    /// Feature columns in fit order
    pub feature_names: Vec<String>,
    /// Name of the target series the model was fitted on
    pub target_name: String,
    pub n_train_samples: usize,
    pub training_time_secs: f64,
    pub trained_at: DateTime<Utc>,
}

impl TrainedModel {
    /// Predict from a pre-built matrix whose columns follow `feature_names`
    pub fn predict_array(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.estimator.predict_array(x)
    }
}

impl Predict for TrainedModel {
    /// Select the fitted feature columns by name and predict; extra columns
    /// in `x` are ignored.
    fn predict(&self, x: &DataFrame) -> Result<Array1<f64>> {
        let matrix = frame_to_array2(x, &self.feature_names)?;
        self.predict_array(&matrix)
    }
}

/// Ordinary least squares trainer
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearRegressionModel;

impl Model for LinearRegressionModel {
    type Options = LinearRegressionOptions;

    fn train(
        &self,
        x_train: &DataFrame,
        y_train: &Series,
        options: &LinearRegressionOptions,
    ) -> Result<TrainedModel> {
        let start = Instant::now();

        if x_train.height() != y_train.len() {
            return Err(PipelineError::TrainingError(format!(
                "X_train has {} rows but y_train has {}",
                x_train.height(),
                y_train.len()
            )));
        }

        let feature_names = column_names(x_train);
        let result = to_training_arrays(x_train, y_train, &feature_names).and_then(|(x, y)| {
            let mut reg = LinearRegression::new(options.clone());
            reg.fit(&x, &y)?;
            Ok(reg)
        });

        let reg = match result {
            Ok(reg) => reg,
            Err(e) => {
                error!(error = %e, "Error in training model");
                return Err(e);
            }
        };

        let model = TrainedModel {
            estimator: Estimator::LinearRegression(reg),
            feature_names,
            target_name: y_train.name().to_string(),
            n_train_samples: x_train.height(),
            training_time_secs: start.elapsed().as_secs_f64(),
            trained_at: Utc::now(),
        };

        info!(
            features = model.feature_names.len(),
            samples = model.n_train_samples,
            secs = model.training_time_secs,
            "Model training complete"
        );
        Ok(model)
    }
}

/// Convert frames to arrays; data problems surface as training errors
fn to_training_arrays(
    x_train: &DataFrame,
    y_train: &Series,
    feature_names: &[String],
) -> Result<(Array2<f64>, Array1<f64>)> {
    let as_training = |e: PipelineError| match e {
        PipelineError::InvalidInputError(msg) | PipelineError::SchemaError(msg) => {
            PipelineError::TrainingError(msg)
        }
        other => other,
    };

    let x = frame_to_array2(x_train, feature_names).map_err(as_training)?;
    let y = series_to_array1(y_train).map_err(as_training)?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_and_predict_by_name() {
        let x = df!("a" => &[1.0, 2.0, 3.0], "b" => &[0.0, 1.0, 0.0]).unwrap();
        let y = Series::new("target".into(), &[2.0, 5.0, 6.0]);

        let model = LinearRegressionModel
            .train(&x, &y, &LinearRegressionOptions::default())
            .unwrap();
        assert_eq!(model.feature_names, vec!["a", "b"]);
        assert_eq!(model.target_name, "target");

        // Columns in a different order plus an extra one
        let query = df!("extra" => &[9.0], "b" => &[1.0], "a" => &[2.0]).unwrap();
        let pred = model.predict(&query).unwrap();
        assert!((pred[0] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_row_mismatch_is_training_error() {
        let x = df!("a" => &[1.0, 2.0, 3.0]).unwrap();
        let y = Series::new("target".into(), &[1.0, 2.0]);
        let err = LinearRegressionModel
            .train(&x, &y, &LinearRegressionOptions::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::TrainingError(_)));
    }

    #[test]
    fn test_missing_feature_values_are_training_error() {
        let x = DataFrame::new(vec![Column::new("a".into(), &[Some(1.0), None, Some(3.0)])]).unwrap();
        let y = Series::new("target".into(), &[1.0, 2.0, 3.0]);
        let err = LinearRegressionModel
            .train(&x, &y, &LinearRegressionOptions::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::TrainingError(_)));
    }

    #[test]
    fn test_predict_missing_feature_is_schema_error() {
        let x = df!("a" => &[1.0, 2.0, 3.0]).unwrap();
        let y = Series::new("target".into(), &[1.0, 2.0, 3.0]);
        let model = LinearRegressionModel
            .train(&x, &y, &LinearRegressionOptions::default())
            .unwrap();

        let query = df!("b" => &[1.0]).unwrap();
        assert!(matches!(model.predict(&query), Err(PipelineError::SchemaError(_))));
    }

    #[test]
    fn test_model_roundtrips_through_json() {
        let x = df!("a" => &[1.0, 2.0, 3.0]).unwrap();
        let y = Series::new("target".into(), &[2.0, 4.0, 6.0]);
        let model = LinearRegressionModel
            .train(&x, &y, &LinearRegressionOptions::default())
            .unwrap();

        let json = serde_json::to_string(&model).unwrap();
        let restored: TrainedModel = serde_json::from_str(&json).unwrap();
        let pred = restored.predict(&df!("a" => &[4.0]).unwrap()).unwrap();
        assert!((pred[0] - 8.0).abs() < 1e-9);
    }
}
