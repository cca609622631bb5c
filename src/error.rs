//! Error types for the satisfaction pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
///
/// The first four variants form the core taxonomy raised by the cleaning,
/// training and evaluation strategies. The rest belong to the glue around
/// them (ingestion, configuration, tracking and deployment).
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Invalid input: {0}")]
    InvalidInputError(String),

    #[error("Degenerate input: {0}")]
    DegenerateInputError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Deployment error: {0}")]
    DeploymentError(String),

    #[error("Tracking error: {0}")]
    TrackingError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },
}

impl PipelineError {
    /// Shorthand for a missing-column schema error
    pub fn missing_column(name: &str) -> Self {
        PipelineError::SchemaError(format!("expected column '{}' is absent", name))
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::SchemaError("no target".to_string());
        assert_eq!(err.to_string(), "Schema error: no target");

        let err = PipelineError::missing_column("review_score");
        assert_eq!(
            err.to_string(),
            "Schema error: expected column 'review_score' is absent"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::IoError(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<f64>("not a number").unwrap_err();
        let err: PipelineError = json_err.into();
        assert!(matches!(err, PipelineError::SerializationError(_)));
    }
}
