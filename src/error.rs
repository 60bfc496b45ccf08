use std::path::PathBuf;
use thiserror::Error;

use crate::models::Source;

pub type Result<T> = std::result::Result<T, MergeError>;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error in {path} at line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    // The field is named `stream`, not `source`, because thiserror reserves
    // `source` for the error-chain cause.
    #[error("Schema mismatch in {stream} stream, field '{field}': {details}")]
    SchemaMismatch {
        stream: Source,
        field: String,
        details: String,
    },

    #[error("Empty {stream} stream: nothing to align against under intersection policy")]
    EmptyStream { stream: Source },

    #[error("Clock mismatch: {details}")]
    ClockMismatch { details: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl MergeError {
    /// Short error-kind tag used in CLI failure reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            MergeError::Io(_) => "io",
            MergeError::Json(_) => "json",
            MergeError::Parse { .. } => "parse",
            MergeError::SchemaMismatch { .. } => "schema-mismatch",
            MergeError::EmptyStream { .. } => "empty-stream",
            MergeError::ClockMismatch { .. } => "clock-mismatch",
            MergeError::Csv(_) => "csv",
            MergeError::Parquet(_) => "parquet",
            MergeError::Arrow(_) => "arrow",
            MergeError::Config(_) => "config",
            MergeError::Validation(_) => "validation",
            MergeError::MissingData(_) => "missing-data",
            MergeError::InvalidFormat(_) => "invalid-format",
            MergeError::TaskJoin(_) => "task-join",
        }
    }
}
