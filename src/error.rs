//! Error types for model training and selection

use thiserror::Error;

/// Result type alias for estimator, evaluation and persistence operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Low-level error raised while preparing data, fitting, scoring or persisting models
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ModelError {
    fn from(err: ndarray::ShapeError) -> Self {
        ModelError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for ModelError {
    fn from(err: polars::error::PolarsError) -> Self {
        ModelError::DataError(err.to_string())
    }
}

/// Error surfaced by [`ModelTrainer::train`](crate::selection::ModelTrainer::train)
///
/// The quality gate is reported on its own; every other failure is wrapped in
/// [`TrainerError::Training`] with the original cause attached.
#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("No best model found: {model_name} scored {score:.4}, below the {threshold} threshold")]
    NoBestModel {
        model_name: String,
        score: f64,
        threshold: f64,
    },

    #[error("Model training failed: {source}")]
    Training {
        #[source]
        source: ModelError,
    },
}

impl From<ModelError> for TrainerError {
    fn from(source: ModelError) -> Self {
        TrainerError::Training { source }
    }
}
