use modmig_common::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Shared SQLite handle used by both the ledger and the migrations it reverts.
///
/// Sharing one connection keeps a migration's down statements and its ledger delete inside the
/// same transaction scope.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening database at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        // Connection-scoped only; the file's journal mode is left as the owner configured it.
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("database lock poisoned".into()))
    }

    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        debug!("executing: {sql}");
        let conn = self.connection()?;
        conn.execute_batch(sql)
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let conn = self.connection()?;
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to query sqlite_master: {e}")))?;
        Ok(count > 0)
    }
}
