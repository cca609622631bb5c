//! In-process prediction service backed by a deployed model

use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::registry::{DeploymentRecord, ServiceStatus};
use crate::error::{PipelineError, Result};
use crate::training::Predict;

/// Column-oriented request body: `{"columns": [...], "data": [[...], ...]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitPayload {
    pub columns: Vec<String>,
    pub data: Vec<Vec<f64>>,
}

/// Serves predictions from one deployment record
#[derive(Debug, Clone)]
pub struct PredictionService {
    record: DeploymentRecord,
}

impl PredictionService {
    pub fn new(record: DeploymentRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &DeploymentRecord {
        &self.record
    }

    pub fn service_id(&self) -> &str {
        &self.record.service_id
    }

    pub fn is_running(&self) -> bool {
        self.record.status == ServiceStatus::Running
    }

    /// Feature columns a request must provide
    pub fn feature_names(&self) -> &[String] {
        &self.record.model.feature_names
    }

    /// Predict from a JSON body.
    ///
    /// Accepts either a list of records (`[{"col": 1.0, ...}, ...]`) or a
    /// [`SplitPayload`]. Columns not used by the model are ignored.
    pub fn predict_json(&self, body: &str) -> Result<Vec<f64>> {
        self.ensure_running()?;
        let value: Value = serde_json::from_str(body)?;

        let matrix = match value {
            Value::Array(records) => self.records_to_matrix(&records)?,
            Value::Object(_) => {
                let payload: SplitPayload = serde_json::from_value(value)?;
                self.split_to_matrix(&payload)?
            }
            _ => {
                return Err(PipelineError::InvalidInputError(
                    "request body must be a list of records or a split payload".to_string(),
                ))
            }
        };

        debug!(service_id = %self.record.service_id, rows = matrix.nrows(), "Serving prediction");
        Ok(self.record.model.predict_array(&matrix)?.to_vec())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(PipelineError::DeploymentError(format!(
                "service {} is not running",
                self.record.service_id
            )))
        }
    }

    fn records_to_matrix(&self, records: &[Value]) -> Result<Array2<f64>> {
        let features = self.feature_names();
        let mut matrix = Array2::<f64>::zeros((records.len(), features.len()));

        for (row, record) in records.iter().enumerate() {
            let obj: &Map<String, Value> = record.as_object().ok_or_else(|| {
                PipelineError::InvalidInputError(format!("record {} is not an object", row))
            })?;
            for (col, name) in features.iter().enumerate() {
                let value = obj.get(name).ok_or_else(|| PipelineError::missing_column(name))?;
                matrix[[row, col]] = value.as_f64().ok_or_else(|| {
                    PipelineError::InvalidInputError(format!(
                        "record {} field '{}' is not a number",
                        row, name
                    ))
                })?;
            }
        }
        Ok(matrix)
    }

    fn split_to_matrix(&self, payload: &SplitPayload) -> Result<Array2<f64>> {
        let positions: Vec<usize> = self
            .feature_names()
            .iter()
            .map(|name| {
                payload
                    .columns
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| PipelineError::missing_column(name))
            })
            .collect::<Result<_>>()?;

        let mut matrix = Array2::<f64>::zeros((payload.data.len(), positions.len()));
        for (row, values) in payload.data.iter().enumerate() {
            if values.len() != payload.columns.len() {
                return Err(PipelineError::ShapeError {
                    expected: format!("{} values per row", payload.columns.len()),
                    actual: format!("{} in row {}", values.len(), row),
                });
            }
            for (col, &pos) in positions.iter().enumerate() {
                matrix[[row, col]] = values[pos];
            }
        }
        Ok(matrix)
    }
}

impl Predict for PredictionService {
    fn predict(&self, x: &DataFrame) -> Result<Array1<f64>> {
        self.ensure_running()?;
        self.record.model.predict(x)
    }
}
