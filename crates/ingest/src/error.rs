use dtm_matrix_store::InvalidPostalCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Failures that abort ingestion. Any of these keeps the service from starting.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Matrix store error: {0}")]
    StoreError(#[from] dtm_matrix_store::MatrixStoreError),

    #[error("Raw file is missing required column {0:?}")]
    MissingColumn(&'static str),

    #[error("Raw file has no header line")]
    EmptySource,

    #[error("Fetch failed: {0}")]
    FetchError(String),

    #[error("{0}")]
    Other(String),
}

/// A single raw row that cannot be normalized. Skipped and counted, never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("missing field {0}")]
    MissingField(&'static str),

    #[error("field {field} is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field {field} is negative, non-finite or too large to store, got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error(transparent)]
    InvalidPostalCode(#[from] InvalidPostalCode),
}
