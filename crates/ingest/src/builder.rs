use crate::build_lock::acquire_build_lock;
use crate::error::{IngestError, Result};
use crate::normalizer::{detect_delimiter, strip_bom, Normalizer};
use crate::stats::IngestStats;
use dtm_matrix_store::{partial_store_path, store_is_built, Edge, MatrixWriter};
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Raw records per write transaction. Each record contributes two edges.
pub const DEFAULT_BATCH_RECORDS: usize = 10_000;

/// Rejected rows logged at `warn`; the rest go to `debug`.
const WARN_LOG_LIMIT: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// A non-empty store already existed and was left untouched.
    Skipped { store: PathBuf },
    Built(IngestStats),
}

/// Turns a raw pairwise file into the symmetric, indexed matrix store.
///
/// The store is written to a `.partial` sibling and renamed into place only after indexes and
/// compaction succeed, so an existing non-empty store is always a complete one.
pub struct MatrixBuilder {
    store_path: PathBuf,
    batch_records: usize,
}

impl MatrixBuilder {
    pub fn new(store_path: impl AsRef<Path>) -> Self {
        Self {
            store_path: store_path.as_ref().to_path_buf(),
            batch_records: DEFAULT_BATCH_RECORDS,
        }
    }

    pub fn with_batch_records(mut self, batch_records: usize) -> Self {
        self.batch_records = batch_records.max(1);
        self
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Builds from `raw_path` unless a built store already exists.
    pub fn build_from_file(&self, raw_path: &Path) -> Result<BuildOutcome> {
        if store_is_built(&self.store_path) {
            log::info!(
                "Matrix store {} already built, skipping ingestion",
                self.store_path.display()
            );
            return Ok(self.skipped());
        }

        let _lock = acquire_build_lock(&self.store_path)?;
        // Another process may have finished the build while we waited for the lock.
        if store_is_built(&self.store_path) {
            log::info!(
                "Matrix store {} was built concurrently, skipping ingestion",
                self.store_path.display()
            );
            return Ok(self.skipped());
        }

        let file = File::open(raw_path).map_err(|err| {
            IngestError::Other(format!("open raw file {}: {err}", raw_path.display()))
        })?;
        self.load(BufReader::new(file)).map(BuildOutcome::Built)
    }

    /// Builds from `raw_path` even when a store exists, replacing it on success.
    pub fn rebuild_from_file(&self, raw_path: &Path) -> Result<IngestStats> {
        let _lock = acquire_build_lock(&self.store_path)?;
        let file = File::open(raw_path).map_err(|err| {
            IngestError::Other(format!("open raw file {}: {err}", raw_path.display()))
        })?;
        self.load(BufReader::new(file))
    }

    /// Builds from an in-memory or streamed source. Honors the same skip rule as
    /// [`MatrixBuilder::build_from_file`].
    pub fn build_from_reader<R: BufRead>(&self, reader: R) -> Result<BuildOutcome> {
        if store_is_built(&self.store_path) {
            return Ok(self.skipped());
        }
        let _lock = acquire_build_lock(&self.store_path)?;
        if store_is_built(&self.store_path) {
            return Ok(self.skipped());
        }
        self.load(reader).map(BuildOutcome::Built)
    }

    fn skipped(&self) -> BuildOutcome {
        BuildOutcome::Skipped {
            store: self.store_path.clone(),
        }
    }

    fn load<R: BufRead>(&self, mut reader: R) -> Result<IngestStats> {
        let start = Instant::now();
        let mut stats = IngestStats::new();

        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            return Err(IngestError::EmptySource);
        }
        let header = strip_bom(&header).to_string();
        let delimiter = detect_delimiter(&header);
        log::debug!(
            "Raw file delimiter {:?}, header {:?}",
            delimiter as char,
            header.trim_end()
        );

        let source = Cursor::new(header.into_bytes()).chain(reader);
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(source);
        let normalizer = Normalizer::from_headers(csv_reader.headers()?)?;

        let partial = partial_store_path(&self.store_path);
        let mut writer = MatrixWriter::create(&partial)?;
        let mut batch: Vec<Edge> = Vec::with_capacity(self.batch_records * 2);

        for (row_index, result) in csv_reader.records().enumerate() {
            let row_number = row_index + 1;
            let record = match result {
                Ok(record) => record,
                Err(err) if err.is_io_error() => return Err(err.into()),
                Err(err) => {
                    self.reject(&mut stats, row_number, &err.to_string());
                    continue;
                }
            };

            match normalizer.normalize(&record) {
                Ok(pair) => {
                    let forward = pair.to_edge();
                    let reverse = forward.reversed();
                    batch.push(forward);
                    batch.push(reverse);
                    stats.add_accepted();
                }
                Err(err) => {
                    self.reject(&mut stats, row_number, &err.to_string());
                    continue;
                }
            }

            if batch.len() >= self.batch_records * 2 {
                writer.write_batch(&batch)?;
                log::debug!("Wrote batch ending at row {row_number}");
                batch.clear();
            }
        }
        writer.write_batch(&batch)?;

        let summary = writer.finish()?;
        std::fs::rename(&partial, &self.store_path)?;

        stats.edges = summary.edges;
        stats.origins = summary.origins;
        stats.time_ms = start.elapsed().as_millis() as u64;
        log::info!(
            "Built matrix store {}: {} rows, {} accepted, {} skipped, {} edges, {} origins in {} ms",
            self.store_path.display(),
            stats.records,
            stats.accepted,
            stats.skipped,
            stats.edges,
            stats.origins,
            stats.time_ms
        );
        Ok(stats)
    }

    fn reject(&self, stats: &mut IngestStats, row_number: usize, reason: &str) {
        if stats.skipped < WARN_LOG_LIMIT {
            log::warn!("Skipping raw row {row_number}: {reason}");
        } else {
            log::debug!("Skipping raw row {row_number}: {reason}");
        }
        stats.add_skipped(format!("row {row_number}: {reason}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtm_matrix_store::{store_path, MatrixReader, PostalCode, SqliteMatrixStore};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn pc(raw: &str) -> PostalCode {
        PostalCode::parse(raw).unwrap()
    }

    #[test]
    fn reference_record_yields_both_directions() {
        let temp = TempDir::new().unwrap();
        let store = store_path(temp.path());
        let raw = "pc4_from;pc4_to;duration_s;distance_m\n1012;3011;900;12500\n";

        let outcome = MatrixBuilder::new(&store)
            .build_from_reader(raw.as_bytes())
            .unwrap();
        let BuildOutcome::Built(stats) = outcome else {
            panic!("expected a fresh build");
        };
        assert_eq!((stats.accepted, stats.edges, stats.origins), (1, 2, 2));

        let matrix = SqliteMatrixStore::open(&store).unwrap();
        let forward = matrix.lookup_pair(&pc("1012"), &pc("3011")).unwrap().unwrap();
        let reverse = matrix.lookup_pair(&pc("3011"), &pc("1012")).unwrap().unwrap();
        assert_eq!((forward.time_minutes, forward.distance_units), (15, 125));
        assert_eq!(reverse, forward.reversed());
        assert!(!partial_store_path(&store).exists());
    }

    #[test]
    fn later_record_wins_across_batches() {
        let temp = TempDir::new().unwrap();
        let store = store_path(temp.path());
        let raw = "pc4_from,pc4_to,duration_s,distance_m\n\
                   1012,3011,900,12500\n\
                   0021,0022,60,100\n\
                   3011,1012,1200,13000\n";

        MatrixBuilder::new(&store)
            .with_batch_records(1)
            .build_from_reader(raw.as_bytes())
            .unwrap();

        let matrix = SqliteMatrixStore::open(&store).unwrap();
        for (from, to) in [("1012", "3011"), ("3011", "1012")] {
            let edge = matrix.lookup_pair(&pc(from), &pc(to)).unwrap().unwrap();
            assert_eq!((edge.time_minutes, edge.distance_units), (20, 130));
        }
    }

    #[test]
    fn malformed_rows_are_counted_not_fatal() {
        let temp = TempDir::new().unwrap();
        let store = store_path(temp.path());
        let raw = "pc4_from;pc4_to;duration_s;distance_m\n\
                   1012;3011;900;12500\n\
                   1012;;900;12500\n\
                   1012;2000;n/a;12500\n\
                   1012;2001;600\n";

        let BuildOutcome::Built(stats) = MatrixBuilder::new(&store)
            .build_from_reader(raw.as_bytes())
            .unwrap()
        else {
            panic!("expected a fresh build");
        };
        assert_eq!((stats.records, stats.accepted, stats.skipped), (4, 1, 3));
        assert_eq!(stats.errors.len(), 3);
        assert!(stats.errors[0].starts_with("row 2:"), "{:?}", stats.errors);
    }

    #[test]
    fn missing_column_aborts_without_store() {
        let temp = TempDir::new().unwrap();
        let store = store_path(temp.path());
        let raw = "from;to;duration_s;distance_m\n1012;3011;900;12500\n";

        let err = MatrixBuilder::new(&store)
            .build_from_reader(raw.as_bytes())
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn("pc4_from")));
        assert!(!store_is_built(&store));
    }

    #[test]
    fn empty_source_is_an_error() {
        let temp = TempDir::new().unwrap();
        let err = MatrixBuilder::new(store_path(temp.path()))
            .build_from_reader("".as_bytes())
            .unwrap_err();
        assert!(matches!(err, IngestError::EmptySource));
    }
}
