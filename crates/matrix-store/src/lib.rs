//! # DTM Matrix Store
//!
//! Indexed on-disk storage for the symmetric PC4 drive-time matrix.
//!
//! ## Layout
//!
//! ```text
//! edges(from_pc4, to_pc4, time_min, dist_units)   PRIMARY KEY (from_pc4, to_pc4)
//!     ├── idx_edges_from        (from_pc4)            full-row scans
//!     └── idx_edges_from_time   (from_pc4, time_min)  threshold scans
//! ```
//!
//! [`MatrixWriter`] bulk-loads a fresh file and compacts it; [`SqliteMatrixStore`] serves the
//! finished file read-only through the [`MatrixReader`] trait.
//!
//! ## Example
//!
//! ```no_run
//! use dtm_matrix_store::{MatrixReader, PostalCode, SqliteMatrixStore};
//!
//! fn main() -> dtm_matrix_store::Result<()> {
//!     let store = SqliteMatrixStore::open("data/matrix.sqlite")?;
//!     let origin = PostalCode::parse("1012").expect("valid code");
//!     for edge in store.lookup_row_filtered(&origin, 30)? {
//!         println!("{} {} min {:.1} km", edge.to, edge.time_minutes, edge.distance_km());
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod paths;
mod reader;
mod schema;
mod store;
mod types;
mod writer;

pub use error::{InvalidPostalCode, MatrixStoreError, Result};
pub use paths::{
    build_lock_path, partial_store_path, raw_file_path, store_is_built, store_path,
    RAW_FILE_NAME, STORE_FILE_NAME,
};
pub use reader::MatrixReader;
pub use store::{SqliteMatrixStore, DEFAULT_READ_POOL_SIZE};
pub use types::{
    quantize_distance, quantize_minutes, Edge, PostalCode, DISTANCE_RESOLUTION_METERS,
    DISTANCE_UNITS_PER_KM, POSTAL_CODE_LEN,
};
pub use writer::{MatrixSummary, MatrixWriter};
