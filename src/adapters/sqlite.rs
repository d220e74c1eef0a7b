//! SQLite sink.
//!
//! Rows go into a `registrations` table whose leading columns mirror the
//! sheet header. `save_key` is unique, so a retried save never produces a
//! second row.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};

use super::{PersistenceError, RecordSink};
use crate::domain::{RecordRow, TIMESTAMP_FORMAT};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS registrations (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    name              TEXT NOT NULL,
    household_members INTEGER NOT NULL,
    address           TEXT NOT NULL,
    phone             TEXT NOT NULL,
    timestamp         TEXT NOT NULL,
    completed_at      TEXT NOT NULL,
    save_key          TEXT NOT NULL UNIQUE
)";

/// Columns the table must start with, in order
const EXPECTED_COLUMNS: [&str; 5] = ["name", "household_members", "address", "phone", "timestamp"];

/// SQLite-backed record sink
pub struct SqliteSink {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSink {
    /// Open (or create) a database file
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    /// In-memory database (tests, dry runs)
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Number of stored registrations
    pub async fn count(&self) -> Result<u64, PersistenceError> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM registrations", [], |r| r.get(0))?;
            Ok(n as u64)
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, PersistenceError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, PersistenceError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| PersistenceError::Storage("database mutex poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| PersistenceError::Storage(format!("database task failed: {}", e)))?
    }
}

#[async_trait]
impl RecordSink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn ensure_header(&self) -> Result<(), PersistenceError> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;

            let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('registrations') ORDER BY cid")?;
            let columns: Vec<String> = stmt
                .query_map([], |r| r.get(0))?
                .collect::<Result<_, _>>()?;

            // columns[0] is the id
            let leading: Vec<&str> = columns.iter().skip(1).take(5).map(|s| s.as_str()).collect();
            if leading != EXPECTED_COLUMNS {
                return Err(PersistenceError::Storage(format!(
                    "registrations table has unexpected columns: {:?}",
                    columns
                )));
            }
            Ok(())
        })
        .await
    }

    async fn append(&self, row: &RecordRow) -> Result<(), PersistenceError> {
        self.ensure_header().await?;

        let row = row.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO registrations
                 (name, household_members, address, phone, timestamp, completed_at, save_key)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.record.name,
                    row.record.household_members,
                    row.record.address,
                    row.record.phone,
                    row.saved_at.format(TIMESTAMP_FORMAT).to_string(),
                    row.completed_at.to_rfc3339(),
                    row.save_key,
                ],
            )?;
            Ok(())
        })
        .await
    }
}
