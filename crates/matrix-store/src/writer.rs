use crate::error::Result;
use crate::schema;
use crate::types::Edge;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// Counts reported once a bulk load has been finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixSummary {
    pub edges: u64,
    pub origins: u64,
}

/// Bulk loader for a fresh matrix file.
///
/// Only the ingestion pipeline holds one of these; once [`MatrixWriter::finish`] runs, the file
/// is treated as immutable.
pub struct MatrixWriter {
    conn: Connection,
    path: PathBuf,
    upserts: u64,
}

impl MatrixWriter {
    /// Creates an empty matrix at `path`, replacing whatever was there.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => log::debug!("Removed stale matrix file {}", path.display()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let conn = Connection::open(&path)?;
        // The file is rebuilt from scratch on failure, so durability during the load is moot.
        conn.execute_batch(
            "PRAGMA journal_mode = OFF;
             PRAGMA synchronous = OFF;
             PRAGMA temp_store = MEMORY;",
        )?;
        conn.execute_batch(schema::CREATE_TABLE)?;

        log::debug!("Created matrix file {}", path.display());
        Ok(Self {
            conn,
            path,
            upserts: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Upserts `edges` in one transaction. Later edges win over earlier ones with the same
    /// `(from, to)` key, including edges from previous batches.
    pub fn write_batch(&mut self, edges: &[Edge]) -> Result<usize> {
        if edges.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(schema::UPSERT_EDGE)?;
            for edge in edges {
                stmt.execute(params![
                    edge.from.as_str(),
                    edge.to.as_str(),
                    edge.time_minutes,
                    edge.distance_units
                ])?;
            }
        }
        tx.commit()?;

        self.upserts += edges.len() as u64;
        Ok(edges.len())
    }

    /// Builds the row indexes, compacts the file and closes it.
    pub fn finish(self) -> Result<MatrixSummary> {
        log::debug!(
            "Finalizing matrix {} after {} upserts",
            self.path.display(),
            self.upserts
        );
        self.conn.execute_batch(schema::CREATE_INDEXES)?;
        self.conn.execute_batch("ANALYZE;")?;

        let edges: i64 = self.conn.query_row(schema::COUNT_EDGES, [], |row| row.get(0))?;
        let origins: i64 = self.conn.query_row(schema::COUNT_ORIGINS, [], |row| row.get(0))?;

        self.conn.execute_batch("VACUUM;")?;
        self.conn
            .close()
            .map_err(|(_, err)| crate::MatrixStoreError::Db(err))?;

        Ok(MatrixSummary {
            edges: edges as u64,
            origins: origins as u64,
        })
    }
}
