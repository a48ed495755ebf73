use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::DetectionRecord;

/// Destination for finished detection records (allows mocking).
pub trait RecordStore: Send + Sync {
    fn insert(&self, record: &DetectionRecord) -> Result<(), DatabaseError>;

    fn get(&self, id: &Uuid) -> Result<Option<DetectionRecord>, DatabaseError>;

    /// Latest records for one owner, newest first.
    fn recent(&self, owner_id: &str, limit: u32) -> Result<Vec<DetectionRecord>, DatabaseError>;
}

/// SQLite-backed record store sharing one connection behind a mutex.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: Mutex::new(db::open_database(path)?),
        })
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: Mutex::new(db::open_memory_database()?),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    pub fn count(&self) -> Result<i64, DatabaseError> {
        self.with_conn(db::count_detections)
    }
}

impl RecordStore for SqliteRecordStore {
    fn insert(&self, record: &DetectionRecord) -> Result<(), DatabaseError> {
        self.with_conn(|conn| db::insert_detection(conn, record))
    }

    fn get(&self, id: &Uuid) -> Result<Option<DetectionRecord>, DatabaseError> {
        self.with_conn(|conn| db::get_detection(conn, id))
    }

    fn recent(&self, owner_id: &str, limit: u32) -> Result<Vec<DetectionRecord>, DatabaseError> {
        self.with_conn(|conn| db::list_recent_detections(conn, owner_id, limit))
    }
}

/// Store whose writes always fail.
#[cfg(test)]
pub(crate) struct FailingRecordStore;

#[cfg(test)]
impl RecordStore for FailingRecordStore {
    fn insert(&self, _record: &DetectionRecord) -> Result<(), DatabaseError> {
        Err(DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_READONLY),
            Some("attempt to write a readonly database".into()),
        )))
    }

    fn get(&self, _id: &Uuid) -> Result<Option<DetectionRecord>, DatabaseError> {
        Ok(None)
    }

    fn recent(&self, _owner_id: &str, _limit: u32) -> Result<Vec<DetectionRecord>, DatabaseError> {
        Ok(Vec::new())
    }
}
