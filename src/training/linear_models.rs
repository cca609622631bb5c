//! Ordinary least squares estimator

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Options accepted by [`LinearRegression`]
///
/// Unknown keys are rejected when deserializing, the same way the
/// estimator would refuse an unknown keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinearRegressionOptions {
    /// Whether to fit an intercept term
    pub fit_intercept: bool,
    /// Scale centred features to unit L2 norm before solving.
    /// Ignored when `fit_intercept` is false.
    pub normalize: bool,
    /// Accepted for compatibility; inputs are never modified in place
    pub copy_x: bool,
}

impl Default for LinearRegressionOptions {
    fn default() -> Self {
        Self {
            fit_intercept: true,
            normalize: false,
            copy_x: true,
        }
    }
}

impl LinearRegressionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Parse options from a JSON object such as `{"fit_intercept": false}`
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| PipelineError::TrainingError(format!("invalid estimator options: {}", e)))
    }
}

/// Cholesky factor of a symmetric positive-definite matrix, or `None`
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let dot: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - dot;
                // Pivots lost to cancellation count as singular.
                if !diag.is_finite() || diag <= 1e-10 * a[[i, i]].abs() || diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - dot) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve `L L^T x = b` given the Cholesky factor `L`
fn cholesky_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let dot: f64 = (0..i).map(|j| l[[i, j]] * z[j]).sum();
        z[i] = (b[i] - dot) / l[[i, i]];
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let dot: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (z[i] - dot) / l[[i, i]];
    }
    x
}

/// Solve the normal equations `(X^T X) w = X^T y`.
///
/// A rank-deficient Gram matrix is retried with a growing diagonal jitter,
/// which converges towards the minimum-norm least-squares solution.
fn solve_normal_equations(x: &Array2<f64>, y: &Array1<f64>) -> Option<Array1<f64>> {
    let xtx = x.t().dot(x);
    let xty = x.t().dot(y);
    let n = xtx.nrows();

    if let Some(l) = cholesky(&xtx) {
        return Some(cholesky_substitute(&l, &xty));
    }

    let scale = (xtx.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64).max(1.0);
    for exponent in [-12, -10, -8, -6] {
        let jitter = scale * 10f64.powi(exponent);
        let mut regularized = xtx.clone();
        regularized.diag_mut().mapv_inplace(|v| v + jitter);
        if let Some(l) = cholesky(&regularized) {
            warn!(jitter, "Gram matrix is singular, solved with diagonal jitter");
            return Some(cholesky_substitute(&l, &xty));
        }
    }
    None
}

/// Linear regression fitted by ordinary least squares
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients, one per feature
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept (0 when not fitted)
    pub intercept: f64,
    pub options: LinearRegressionOptions,
    pub is_fitted: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new(LinearRegressionOptions::default())
    }
}

impl LinearRegression {
    pub fn new(options: LinearRegressionOptions) -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            options,
            is_fitted: false,
        }
    }

    /// Fit the model to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let (n_samples, n_features) = x.dim();

        if n_samples == 0 {
            return Err(PipelineError::TrainingError(
                "cannot fit on an empty training set".to_string(),
            ));
        }
        if n_features == 0 {
            return Err(PipelineError::TrainingError(
                "training data has no feature columns".to_string(),
            ));
        }
        if n_samples != y.len() {
            return Err(PipelineError::TrainingError(format!(
                "X_train has {} rows but y_train has {}",
                n_samples,
                y.len()
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(PipelineError::TrainingError(
                "training data contains non-finite values".to_string(),
            ));
        }

        let (coefficients, intercept) = if self.options.fit_intercept {
            let x_mean = x.mean_axis(Axis(0)).ok_or_else(|| {
                PipelineError::TrainingError("cannot average an empty matrix".to_string())
            })?;
            let y_mean = y.sum() / n_samples as f64;

            let mut x_centered = x - &x_mean.view().insert_axis(Axis(0));
            let y_centered = y - y_mean;

            let x_scale = if self.options.normalize {
                let norms = x_centered
                    .map_axis(Axis(0), |col| col.dot(&col).sqrt())
                    .mapv(|v| if v == 0.0 { 1.0 } else { v });
                x_centered /= &norms.view().insert_axis(Axis(0));
                norms
            } else {
                Array1::ones(n_features)
            };

            let scaled = solve_normal_equations(&x_centered, &y_centered).ok_or_else(singular)?;
            let coefficients = scaled / &x_scale;
            let intercept = y_mean - coefficients.dot(&x_mean);
            (coefficients, intercept)
        } else {
            let coefficients = solve_normal_equations(x, y).ok_or_else(singular)?;
            (coefficients, 0.0)
        };

        debug!(
            n_samples,
            n_features,
            intercept,
            "Linear regression fitted"
        );

        self.coefficients = Some(coefficients);
        self.intercept = intercept;
        self.is_fitted = true;
        Ok(self)
    }

    /// Predict targets for each row of `x`
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = match (&self.coefficients, self.is_fitted) {
            (Some(c), true) => c,
            _ => return Err(PipelineError::ModelNotFitted),
        };

        if x.ncols() != coefficients.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.dot(coefficients) + self.intercept)
    }
}

fn singular() -> PipelineError {
    PipelineError::TrainingError("normal equations could not be solved".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_recovers_exact_plane() {
        // y = 2*x1 + 3*x2 + 1
        let x = array![[1.0, 1.0], [2.0, 1.0], [1.0, 2.0], [2.0, 2.0], [3.0, 1.0]];
        let y = array![6.0, 8.0, 9.0, 11.0, 10.0];

        let mut model = LinearRegression::default();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-9);
        assert!((coef[1] - 3.0).abs() < 1e-9);
        assert!((model.intercept - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_without_intercept() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![3.0, 6.0, 9.0];

        let mut model = LinearRegression::new(LinearRegressionOptions::new().with_fit_intercept(false));
        model.fit(&x, &y).unwrap();

        assert_eq!(model.intercept, 0.0);
        assert!((model.coefficients.as_ref().unwrap()[0] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_gives_same_fit() {
        let x = array![[1.0, 10.0], [2.0, 30.0], [3.0, 20.0], [4.0, 50.0], [5.0, 40.0]];
        let y = array![3.0, 5.5, 6.0, 9.5, 9.0];

        let mut plain = LinearRegression::default();
        plain.fit(&x, &y).unwrap();
        let mut normalized = LinearRegression::new(LinearRegressionOptions::new().with_normalize(true));
        normalized.fit(&x, &y).unwrap();

        let a = plain.predict(&x).unwrap();
        let b = normalized.predict(&x).unwrap();
        for (p, q) in a.iter().zip(b.iter()) {
            assert!((p - q).abs() < 1e-8);
        }
    }

    #[test]
    fn test_collinear_features_still_fit() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0]];
        let y = array![3.0, 6.0, 9.0, 12.0];

        let mut model = LinearRegression::default();
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x).unwrap();
        for (p, t) in preds.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-3, "prediction {} vs {}", p, t);
        }
    }

    #[test]
    fn test_empty_and_misaligned_inputs() {
        let mut model = LinearRegression::default();

        let empty = Array2::<f64>::zeros((0, 2));
        let err = model.fit(&empty, &Array1::zeros(0)).unwrap_err();
        assert!(matches!(err, PipelineError::TrainingError(_)));

        let x = array![[1.0], [2.0], [3.0]];
        let err = model.fit(&x, &array![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, PipelineError::TrainingError(_)));
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LinearRegression::default();
        let err = model.predict(&array![[1.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::ModelNotFitted));
    }

    #[test]
    fn test_options_reject_unknown_keys() {
        let ok = LinearRegressionOptions::from_json(serde_json::json!({"fit_intercept": false}))
            .unwrap();
        assert!(!ok.fit_intercept);
        assert!(!ok.normalize);

        let err = LinearRegressionOptions::from_json(serde_json::json!({"n_jobs": 4})).unwrap_err();
        assert!(matches!(err, PipelineError::TrainingError(_)));
    }
}
