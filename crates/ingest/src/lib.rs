//! # DTM Ingest
//!
//! Turns the raw pairwise PC4 file into the symmetric matrix store.
//!
//! ## Pipeline
//!
//! ```text
//! Raw file (URL)
//!     │
//!     ├──> Fetch (once, cached on disk)
//!     │
//!     ├──> Normalizer (header-driven, `;`/`,` detected)
//!     │      └─> PairRecord, or a skipped row
//!     │
//!     └──> Matrix Builder (forward + reverse edge, batched)
//!            └─> indexes, VACUUM, rename into place
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use dtm_ingest::{fetch_raw_file, BuildOutcome, MatrixBuilder, DEFAULT_FETCH_TIMEOUT};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> dtm_ingest::Result<()> {
//!     let raw = Path::new("data/dtm_pc4.csv");
//!     fetch_raw_file(dtm_ingest::DEFAULT_SOURCE_URL, raw, DEFAULT_FETCH_TIMEOUT).await?;
//!
//!     match MatrixBuilder::new("data/matrix.sqlite").build_from_file(raw)? {
//!         BuildOutcome::Skipped { .. } => println!("store already built"),
//!         BuildOutcome::Built(stats) => println!("{} edges", stats.edges),
//!     }
//!     Ok(())
//! }
//! ```

mod build_lock;
mod builder;
mod error;
mod fetch;
mod normalizer;
mod stats;

pub use builder::{BuildOutcome, MatrixBuilder, DEFAULT_BATCH_RECORDS};
pub use error::{IngestError, NormalizeError, Result};
pub use fetch::{fetch_raw_file, FetchOutcome, DEFAULT_FETCH_TIMEOUT, DEFAULT_SOURCE_URL};
pub use normalizer::{
    detect_delimiter, Normalizer, PairRecord, DISTANCE_COLUMN, DURATION_COLUMN, FROM_COLUMN,
    TO_COLUMN,
};
pub use stats::{IngestStats, MAX_RECORDED_ERRORS};
