//! Error types for the salary prediction pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PredictorError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PredictorError {
    /// One or more input fields are missing or out of range.
    #[error("Validation error: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Missing feature: {0}")]
    MissingFeature(String),

    #[error("Artifact not found: {name} ({})", path.display())]
    ArtifactNotFound { name: String, path: PathBuf },

    /// A set of artifacts could not be loaded together.
    #[error("Failed to load model '{name}': {source}")]
    ModelLoad {
        name: String,
        #[source]
        source: Box<PredictorError>,
    },

    #[error("No model loaded")]
    NotLoaded,

    #[error("Training failed for {variant}: {reason}")]
    Training { variant: String, reason: String },

    #[error("Artifact {artifact} belongs to generation {found}, expected {expected}")]
    GenerationMismatch {
        artifact: String,
        expected: String,
        found: String,
    },

    #[error("Data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Computation error: {0}")]
    Computation(String),
}

impl PredictorError {
    /// Whether the error was caused by the caller's input rather than server state.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PredictorError::Validation(_)
                | PredictorError::MissingFeature(_)
                | PredictorError::InvalidInput(_)
        )
    }

    pub(crate) fn shape_mismatch(expected_rows: usize, actual_rows: usize) -> Self {
        PredictorError::Shape {
            expected: format!("y length = {}", expected_rows),
            actual: format!("y length = {}", actual_rows),
        }
    }
}

impl From<polars::error::PolarsError> for PredictorError {
    fn from(err: polars::error::PolarsError) -> Self {
        PredictorError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for PredictorError {
    fn from(err: serde_json::Error) -> Self {
        PredictorError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PredictorError {
    fn from(err: ndarray::ShapeError) -> Self {
        PredictorError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_joins_messages() {
        let err = PredictorError::Validation(vec![
            "Missing required field: work_year".to_string(),
            "remote_ratio must be between 0 and 100".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation error: Missing required field: work_year; remote_ratio must be between 0 and 100"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn test_model_load_keeps_source() {
        let inner = PredictorError::ArtifactNotFound {
            name: "ridge_regression".to_string(),
            path: PathBuf::from("models/ridge_regression_model.json"),
        };
        let err = PredictorError::ModelLoad {
            name: "ridge_regression".to_string(),
            source: Box::new(inner),
        };
        assert!(err.to_string().contains("ridge_regression"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PredictorError = io_err.into();
        assert!(matches!(err, PredictorError::Io(_)));
    }
}
