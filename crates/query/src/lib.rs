//! Query layer over the drive-time matrix: full rows, threshold rows, single pairs, the origin
//! listing and per-credential profile metadata.

mod engine;
mod error;
mod profile;

pub use engine::QueryEngine;
pub use error::{QueryError, Result};
pub use profile::{ClientProfile, ClientProfiles, Plan, DEFAULT_DISPLAY_TITLE};
