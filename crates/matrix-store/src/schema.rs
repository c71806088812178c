//! Table layout shared by the writer and the reader.
//!
//! `dist_units` holds distances in [`crate::DISTANCE_RESOLUTION_METERS`] steps.

pub(crate) const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS edges (
        from_pc4 TEXT NOT NULL,
        to_pc4 TEXT NOT NULL,
        time_min INTEGER NOT NULL,
        dist_units INTEGER NOT NULL,
        PRIMARY KEY (from_pc4, to_pc4)
    ) WITHOUT ROWID;";

// Built after the bulk load so inserts do not pay for index maintenance.
pub(crate) const CREATE_INDEXES: &str = "
    CREATE INDEX IF NOT EXISTS idx_edges_from ON edges (from_pc4);
    CREATE INDEX IF NOT EXISTS idx_edges_from_time ON edges (from_pc4, time_min);";

pub(crate) const UPSERT_EDGE: &str =
    "INSERT OR REPLACE INTO edges (from_pc4, to_pc4, time_min, dist_units) VALUES (?1, ?2, ?3, ?4)";

pub(crate) const SELECT_ROW: &str = "
    SELECT from_pc4, to_pc4, time_min, dist_units FROM edges
    WHERE from_pc4 = ?1
    ORDER BY to_pc4";

pub(crate) const SELECT_ROW_FILTERED: &str = "
    SELECT from_pc4, to_pc4, time_min, dist_units FROM edges INDEXED BY idx_edges_from_time
    WHERE from_pc4 = ?1 AND time_min <= ?2
    ORDER BY to_pc4";

pub(crate) const SELECT_PAIR: &str = "
    SELECT from_pc4, to_pc4, time_min, dist_units FROM edges
    WHERE from_pc4 = ?1 AND to_pc4 = ?2";

pub(crate) const SELECT_ORIGINS: &str = "SELECT DISTINCT from_pc4 FROM edges ORDER BY from_pc4";

pub(crate) const SELECT_ORIGIN_EXISTS: &str =
    "SELECT EXISTS (SELECT 1 FROM edges WHERE from_pc4 = ?1)";

pub(crate) const COUNT_EDGES: &str = "SELECT COUNT(*) FROM edges";

pub(crate) const COUNT_ORIGINS: &str = "SELECT COUNT(DISTINCT from_pc4) FROM edges";
