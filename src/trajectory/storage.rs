//! SQLite persistence for finished trajectories.

use super::TrajectoryRecord;
use crate::error::TrackError;
use crate::object::Point;
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Arc;

/// Sink for completed trajectories. Called from aggregator worker threads.
pub trait TrajectoryStore: Send + Sync {
    fn insert(&self, record: &TrajectoryRecord) -> Result<(), TrackError>;

    /// Rows with `start <= timestamp <= end` and the given object type,
    /// oldest first.
    fn query(
        &self,
        start: &str,
        end: &str,
        object_type: &str,
    ) -> Result<Vec<StoredTrajectory>, TrackError>;
}

/// One row of the `trajectories` table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTrajectory {
    pub id: i64,
    pub timestamp: String,
    pub object_id: u64,
    pub object_type: String,
    pub path: Vec<Point>,
}

impl StoredTrajectory {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, i64, String, String)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    }

    fn decode(
        (id, timestamp, object_id, object_type, path): (i64, String, i64, String, String),
    ) -> Result<Self, TrackError> {
        let path: Vec<Point> = serde_json::from_str(&path)
            .map_err(|e| TrackError::Persistence(format!("row {}: bad path: {}", id, e)))?;
        Ok(Self {
            id,
            timestamp,
            object_id: object_id as u64,
            object_type,
            path,
        })
    }
}

/// Storage backend shared by all aggregator workers.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TrackError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;",
        )?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, TrackError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), TrackError> {
        let conn = self.conn.lock();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS trajectories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                object_id INTEGER NOT NULL,
                object_type TEXT NOT NULL,
                path TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_trajectories_timestamp ON trajectories(timestamp)",
            [],
        )?;
        Ok(())
    }

    /// Every stored row, oldest first.
    pub fn fetch_all(&self) -> Result<Vec<StoredTrajectory>, TrackError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, object_id, object_type, path
             FROM trajectories ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], StoredTrajectory::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(StoredTrajectory::decode).collect()
    }

    pub fn count(&self) -> Result<usize, TrackError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM trajectories", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl TrajectoryStore for SqliteStore {
    fn insert(&self, record: &TrajectoryRecord) -> Result<(), TrackError> {
        let path_json = serde_json::to_string(&record.path)
            .map_err(|e| TrackError::Persistence(e.to_string()))?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO trajectories (timestamp, object_id, object_type, path)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.timestamp,
                record.object_id as i64,
                record.object_type,
                path_json
            ],
        )?;
        Ok(())
    }

    fn query(
        &self,
        start: &str,
        end: &str,
        object_type: &str,
    ) -> Result<Vec<StoredTrajectory>, TrackError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, object_id, object_type, path
             FROM trajectories
             WHERE timestamp BETWEEN ?1 AND ?2 AND object_type = ?3
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![start, end, object_type], StoredTrajectory::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(StoredTrajectory::decode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(object_id: u64, object_type: &str, timestamp: &str) -> TrajectoryRecord {
        TrajectoryRecord {
            object_id,
            object_type: object_type.to_string(),
            path: vec![Point::new(1, 2), Point::new(3, 4)],
            timestamp: timestamp.to_string(),
        }
    }

    #[test]
    fn test_insert_and_fetch_all() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&record(7, "person", "2024-05-01T10:00:00")).unwrap();
        store.insert(&record(8, "car", "2024-05-01T10:00:01")).unwrap();

        let rows = store.fetch_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].object_id, 7);
        assert_eq!(rows[0].object_type, "person");
        assert_eq!(rows[0].path, vec![Point::new(1, 2), Point::new(3, 4)]);
        assert!(rows[0].id < rows[1].id);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_path_stored_as_json_pairs() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&record(1, "truck", "2024-05-01T10:00:00")).unwrap();

        let conn = store.conn.lock();
        let path: String = conn
            .query_row("SELECT path FROM trajectories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(path, "[[1,2],[3,4]]");
    }

    #[test]
    fn test_query_filters_by_range_and_type() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&record(1, "person", "2024-05-01T09:59:59")).unwrap();
        store.insert(&record(2, "person", "2024-05-01T10:00:00")).unwrap();
        store.insert(&record(3, "car", "2024-05-01T10:30:00")).unwrap();
        store.insert(&record(4, "person", "2024-05-01T11:00:00")).unwrap();
        store.insert(&record(5, "person", "2024-05-01T11:00:01")).unwrap();

        let rows = store
            .query("2024-05-01T10:00:00", "2024-05-01T11:00:00", "person")
            .unwrap();

        let ids: Vec<u64> = rows.iter().map(|r| r.object_id).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn test_open_file_persists_across_handles() {
        let path = std::env::temp_dir().join(format!(
            "trajtrack-storage-{}.db",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&record(42, "car", "2024-05-01T10:00:00")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.fetch_all().unwrap()[0].object_id, 42);
        drop(store);
        let _ = std::fs::remove_file(&path);
    }
}
