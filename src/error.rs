//! Pipeline error types

use serde::Serialize;
use thiserror::Error;

/// Pipeline-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// No price column could be resolved in a raw source. Fatal for the run.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Network failure or non-success status from a remote source.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Missing dataset: {0}")]
    MissingDataset(String),

    #[error("Model missing: {0}")]
    ModelMissing(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Schema(_) => "SCHEMA_ERROR",
            AppError::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
            AppError::MissingDataset(_) => "MISSING_DATASET",
            AppError::ModelMissing(_) => "MODEL_MISSING",
            AppError::Csv(_) => "CSV_ERROR",
            AppError::Http(_) => "HTTP_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Training(_) => "TRAINING_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the next scheduled tick may succeed without operator action
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::SourceUnavailable(_) | AppError::Http(_))
    }
}

/// Serializable error response for callers that expect JSON
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(err: AppError) -> Self {
        let message = match &err {
            AppError::ModelMissing(_) => "model missing".to_string(),
            _ => err.to_string(),
        };

        ErrorResponse {
            code: err.code().to_string(),
            message,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
