use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryError>;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("{0} parameter required")]
    MissingParameter(&'static str),

    #[error("{name} parameter must be an integer, got {value:?}")]
    InvalidParameter { name: &'static str, value: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Matrix store error: {0}")]
    StoreError(#[from] dtm_matrix_store::MatrixStoreError),
}

impl QueryError {
    /// Stable identifier for logs and clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "missing_parameter",
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::NotFound(_) => "not_found",
            Self::StoreError(_) => "store_error",
        }
    }

    /// Whether the caller sent something wrong, as opposed to the service failing.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::StoreError(_))
    }
}
