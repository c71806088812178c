use crate::error::Result;
use crate::types::{Edge, PostalCode};

/// Read side of the matrix.
///
/// Implementations are shared across serving tasks and must tolerate concurrent calls. The
/// matrix is never written after the build, so readers never wait on a writer.
pub trait MatrixReader: Send + Sync {
    /// All outgoing edges of `origin`, ordered by destination. Empty when there are none.
    fn lookup_row(&self, origin: &PostalCode) -> Result<Vec<Edge>>;

    /// Outgoing edges with `time_minutes <= max_time`, ordered by destination.
    fn lookup_row_filtered(&self, origin: &PostalCode, max_time: i64) -> Result<Vec<Edge>>;

    fn lookup_pair(&self, origin: &PostalCode, dest: &PostalCode) -> Result<Option<Edge>>;

    /// Distinct origins in ascending order.
    fn list_origins(&self) -> Result<Vec<PostalCode>>;

    fn contains_origin(&self, code: &PostalCode) -> Result<bool>;
}
