use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MatrixStoreError>;

#[derive(Error, Debug)]
pub enum MatrixStoreError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Matrix store has not been built: {}", .0.display())]
    NotBuilt(PathBuf),

    #[error("{0}")]
    Other(String),
}

/// Raised when a raw value cannot be turned into a 4-digit postal-area code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid postal code {raw:?}: expected 1-4 ASCII digits")]
pub struct InvalidPostalCode {
    pub raw: String,
}
