use crate::error::{MatrixStoreError, Result};
use crate::paths::store_is_built;
use crate::reader::MatrixReader;
use crate::schema;
use crate::types::{Edge, PostalCode};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

pub const DEFAULT_READ_POOL_SIZE: usize = 4;

/// Read-only SQLite matrix.
///
/// `rusqlite::Connection` is `Send` but not `Sync`, so each pooled connection sits behind its own
/// mutex and callers are spread round-robin. There is no writer connection at all.
pub struct SqliteMatrixStore {
    path: PathBuf,
    read_connections: Vec<Mutex<Connection>>,
    read_cursor: AtomicUsize,
}

impl SqliteMatrixStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_pool(path, DEFAULT_READ_POOL_SIZE)
    }

    pub fn open_with_pool(path: impl AsRef<Path>, pool_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !store_is_built(&path) {
            return Err(MatrixStoreError::NotBuilt(path));
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let read_connections = (0..pool_size.max(1))
            .map(|_| Connection::open_with_flags(&path, flags).map(Mutex::new))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        log::info!(
            "Opened matrix store {} ({} read connections)",
            path.display(),
            read_connections.len()
        );
        Ok(Self {
            path,
            read_connections,
            read_cursor: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn edge_count(&self) -> Result<u64> {
        let conn = self.read_connection();
        let count: i64 = conn.query_row(schema::COUNT_EDGES, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn origin_count(&self) -> Result<u64> {
        let conn = self.read_connection();
        let count: i64 = conn.query_row(schema::COUNT_ORIGINS, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn read_connection(&self) -> MutexGuard<'_, Connection> {
        let len = self.read_connections.len();
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % len;
        // A panic while holding the guard cannot leave a read-only connection inconsistent.
        self.read_connections[index]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn collect_edges(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Edge>> {
        let conn = self.read_connection();
        let mut stmt = conn.prepare_cached(sql)?;
        let edges = stmt
            .query_map(params, edge_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(edges)
    }
}

impl MatrixReader for SqliteMatrixStore {
    fn lookup_row(&self, origin: &PostalCode) -> Result<Vec<Edge>> {
        self.collect_edges(schema::SELECT_ROW, params![origin.as_str()])
    }

    fn lookup_row_filtered(&self, origin: &PostalCode, max_time: i64) -> Result<Vec<Edge>> {
        self.collect_edges(
            schema::SELECT_ROW_FILTERED,
            params![origin.as_str(), max_time],
        )
    }

    fn lookup_pair(&self, origin: &PostalCode, dest: &PostalCode) -> Result<Option<Edge>> {
        let conn = self.read_connection();
        let mut stmt = conn.prepare_cached(schema::SELECT_PAIR)?;
        let edge = stmt
            .query_row(params![origin.as_str(), dest.as_str()], edge_from_row)
            .optional()?;
        Ok(edge)
    }

    fn list_origins(&self) -> Result<Vec<PostalCode>> {
        let conn = self.read_connection();
        let mut stmt = conn.prepare_cached(schema::SELECT_ORIGINS)?;
        let origins = stmt
            .query_map([], |row| row.get::<_, String>(0).map(PostalCode::from_stored))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(origins)
    }

    fn contains_origin(&self, code: &PostalCode) -> Result<bool> {
        let conn = self.read_connection();
        let mut stmt = conn.prepare_cached(schema::SELECT_ORIGIN_EXISTS)?;
        let exists: bool = stmt.query_row(params![code.as_str()], |row| row.get(0))?;
        Ok(exists)
    }
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<Edge> {
    Ok(Edge {
        from: PostalCode::from_stored(row.get(0)?),
        to: PostalCode::from_stored(row.get(1)?),
        time_minutes: row.get(2)?,
        distance_units: row.get(3)?,
    })
}
