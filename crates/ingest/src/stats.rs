use serde::{Deserialize, Serialize};

/// How many rejected rows keep their reason in [`IngestStats::errors`].
pub const MAX_RECORDED_ERRORS: usize = 20;

/// Statistics about one matrix build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Data rows read from the raw file
    pub records: u64,

    /// Rows that normalized cleanly
    pub accepted: u64,

    /// Rows skipped as malformed
    pub skipped: u64,

    /// Distinct `(from, to)` edges in the finished store
    pub edges: u64,

    /// Distinct origins in the finished store
    pub origins: u64,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// First few rejection reasons, prefixed with the 1-based data row number
    pub errors: Vec<String>,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_accepted(&mut self) {
        self.records += 1;
        self.accepted += 1;
    }

    pub fn add_skipped(&mut self, reason: String) {
        self.records += 1;
        self.skipped += 1;
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(reason);
        }
    }
}
