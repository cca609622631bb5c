//! Evaluation strategies
//!
//! Each strategy scores a pair of (true, predicted) label vectors:
//! - [`Mse`] - mean squared error
//! - [`Rmse`] - root mean squared error
//! - [`R2`] - coefficient of determination
//!
//! Strategies are stateless; recording the scores anywhere is left to the
//! caller (see [`crate::tracking::MetricsSink`]).

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Metric kind a score is tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Mse,
    Rmse,
    R2,
}

impl MetricKind {
    /// Name used when reporting the metric
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Mse => "mse",
            MetricKind::Rmse => "rmse",
            MetricKind::R2 => "r2",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strategy for scoring model predictions
pub trait Evaluation {
    /// Metric this strategy computes
    fn kind(&self) -> MetricKind;

    /// Score `y_pred` against `y_true`
    fn calculate_scores(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64>;
}

fn check_pair(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.is_empty() || y_pred.is_empty() {
        return Err(PipelineError::InvalidInputError(
            "cannot score empty label vectors".to_string(),
        ));
    }
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::InvalidInputError(format!(
            "y_true has {} values but y_pred has {}",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_pair(y_true, y_pred)?;
    let sse: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    Ok(sse / y_true.len() as f64)
}

/// Mean squared error
#[derive(Debug, Clone, Copy, Default)]
pub struct Mse;

impl Evaluation for Mse {
    fn kind(&self) -> MetricKind {
        MetricKind::Mse
    }

    fn calculate_scores(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        debug!("Calculating MSE");
        let mse = mean_squared_error(y_true, y_pred)?;
        info!(mse, "MSE computed");
        Ok(mse)
    }
}

/// Root mean squared error
#[derive(Debug, Clone, Copy, Default)]
pub struct Rmse;

impl Evaluation for Rmse {
    fn kind(&self) -> MetricKind {
        MetricKind::Rmse
    }

    fn calculate_scores(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        debug!("Calculating RMSE");
        let rmse = mean_squared_error(y_true, y_pred)?.sqrt();
        info!(rmse, "RMSE computed");
        Ok(rmse)
    }
}

/// Coefficient of determination
#[derive(Debug, Clone, Copy, Default)]
pub struct R2;

impl Evaluation for R2 {
    fn kind(&self) -> MetricKind {
        MetricKind::R2
    }

    fn calculate_scores(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        debug!("Calculating R2 score");
        check_pair(y_true, y_pred)?;

        let mean = y_true.sum() / y_true.len() as f64;
        let ss_tot: f64 = y_true.iter().map(|t| (t - mean) * (t - mean)).sum();
        if y_true.iter().all(|&t| t == y_true[0]) || ss_tot == 0.0 {
            return Err(PipelineError::DegenerateInputError(
                "R2 is undefined when every true value is identical".to_string(),
            ));
        }

        let ss_res: f64 = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p) * (t - p))
            .sum();

        let r2 = 1.0 - ss_res / ss_tot;
        info!(r2, "R2 score computed");
        Ok(r2)
    }
}

/// The three scores produced by one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScores {
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
}

impl EvaluationScores {
    /// Score a prediction vector with every strategy
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        Ok(Self {
            mse: Mse.calculate_scores(y_true, y_pred)?,
            rmse: Rmse.calculate_scores(y_true, y_pred)?,
            r2: R2.calculate_scores(y_true, y_pred)?,
        })
    }

    /// (kind, value) pairs in computation order
    pub fn pairs(&self) -> [(MetricKind, f64); 3] {
        [
            (MetricKind::Mse, self.mse),
            (MetricKind::Rmse, self.rmse),
            (MetricKind::R2, self.r2),
        ]
    }

    /// Value for a given metric kind
    pub fn get(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Mse => self.mse,
            MetricKind::Rmse => self.rmse,
            MetricKind::R2 => self.r2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mse_known_value() {
        let y_true = array![1.0, 2.0, 3.0, 4.0];
        let y_pred = array![1.0, 2.0, 3.0, 6.0];
        let mse = Mse.calculate_scores(&y_true, &y_pred).unwrap();
        assert!((mse - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rmse_is_sqrt_of_mse() {
        let y_true = array![3.0, -0.5, 2.0, 7.0];
        let y_pred = array![2.5, 0.0, 2.0, 8.0];
        let mse = Mse.calculate_scores(&y_true, &y_pred).unwrap();
        let rmse = Rmse.calculate_scores(&y_true, &y_pred).unwrap();
        assert!((rmse - mse.sqrt()).abs() < 1e-12);
        assert!(rmse >= 0.0);
    }

    #[test]
    fn test_r2_perfect_prediction() {
        let y = array![1.0, 5.0, 2.0, 8.0];
        let r2 = R2.calculate_scores(&y, &y).unwrap();
        assert!((r2 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_r2_known_value() {
        // Same data as the scikit-learn r2_score docstring
        let y_true = array![3.0, -0.5, 2.0, 7.0];
        let y_pred = array![2.5, 0.0, 2.0, 8.0];
        let r2 = R2.calculate_scores(&y_true, &y_pred).unwrap();
        assert!((r2 - 0.9486081370449679).abs() < 1e-9, "r2 = {}", r2);
    }

    #[test]
    fn test_r2_is_not_mse() {
        let y_true = array![1.0, 2.0, 3.0];
        let y_pred = array![1.5, 2.5, 2.0];
        let r2 = R2.calculate_scores(&y_true, &y_pred).unwrap();
        let mse = Mse.calculate_scores(&y_true, &y_pred).unwrap();
        assert!((r2 - mse).abs() > 1e-6);
    }

    #[test]
    fn test_r2_constant_truth_is_degenerate() {
        let y_true = array![4.0, 4.0, 4.0];
        let y_pred = array![4.0, 3.0, 5.0];
        let err = R2.calculate_scores(&y_true, &y_pred).unwrap_err();
        assert!(matches!(err, PipelineError::DegenerateInputError(_)));
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let y_true = array![1.0, 2.0, 3.0];
        let y_pred = array![1.0, 2.0];
        let strategies: [&dyn Evaluation; 3] = [&Mse, &Rmse, &R2];
        for strategy in strategies {
            let err = strategy.calculate_scores(&y_true, &y_pred).unwrap_err();
            assert!(
                matches!(err, PipelineError::InvalidInputError(_)),
                "{} should reject mismatched input",
                strategy.kind()
            );
        }
    }

    #[test]
    fn test_empty_input_rejected() {
        let empty: Array1<f64> = Array1::zeros(0);
        let strategies: [&dyn Evaluation; 3] = [&Mse, &Rmse, &R2];
        for strategy in strategies {
            let err = strategy.calculate_scores(&empty, &empty).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidInputError(_)));
        }
    }

    #[test]
    fn test_compute_all_scores() {
        let y_true = array![1.0, 2.0, 3.0, 4.0];
        let y_pred = array![1.1, 1.9, 3.2, 3.8];
        let scores = EvaluationScores::compute(&y_true, &y_pred).unwrap();
        assert!((scores.rmse - scores.mse.sqrt()).abs() < 1e-12);
        assert!(scores.r2 > 0.9);
        assert_eq!(scores.get(MetricKind::R2), scores.r2);
        assert_eq!(scores.pairs()[0].0, MetricKind::Mse);
    }
}
