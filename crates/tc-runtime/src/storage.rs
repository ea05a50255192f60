use std::path::Path;

use rusqlite::{Connection, params};
use tc_core::record::{Record, TIMESTAMP_FORMAT};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("insert of record #{index} (id {id}) failed: {source}")]
    Insert {
        index: usize,
        id: i64,
        #[source]
        source: rusqlite::Error,
    },
}

/// Persistent destination of captured records.
///
/// Owned by exactly one writer worker; never shared between threads.
pub trait RecordStore: Send {
    /// Insert the whole batch in one transaction.
    fn insert_batch(&mut self, batch: &[Record]) -> Result<(), StorageError>;

    fn close(self) -> Result<(), StorageError>
    where
        Self: Sized;
}

/// SQLite-backed store: one table of `(id INTEGER, text TEXT, timestamp TEXT)`.
pub struct SqliteStore {
    conn: Connection,
    insert_sql: String,
}

impl SqliteStore {
    /// Open (or create) the database file and make sure `table` exists.
    /// `table` must already be a validated identifier.
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, StorageError> {
        Self::init(Connection::open(path)?, table)
    }

    pub fn open_in_memory(table: &str) -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?, table)
    }

    fn init(conn: Connection, table: &str) -> Result<Self, StorageError> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (id INTEGER, text TEXT, timestamp TEXT)"
        ))?;
        Ok(Self {
            conn,
            insert_sql: format!("INSERT INTO {table} (id, text, timestamp) VALUES (?1, ?2, ?3)"),
        })
    }
}

impl RecordStore for SqliteStore {
    fn insert_batch(&mut self, batch: &[Record]) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&self.insert_sql)?;
            for (index, record) in batch.iter().enumerate() {
                let ts = record.timestamp.format(TIMESTAMP_FORMAT).to_string();
                stmt.execute(params![record.id, record.text, ts])
                    .map_err(|source| StorageError::Insert {
                        index,
                        id: record.id,
                        source,
                    })?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn close(self) -> Result<(), StorageError> {
        self.conn.close().map_err(|(_, e)| StorageError::Sqlite(e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
