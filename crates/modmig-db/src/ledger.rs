use modmig_common::{Error, MigrationId, ModuleSlug, Result};
use rusqlite::{OptionalExtension, Row, params};
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::Database;
use crate::schema::{DEFAULT_LEDGER_TABLE, is_valid_table_name, ledger_schema};

/// One applied migration as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub module: ModuleSlug,
    pub migration: MigrationId,
    pub batch: u32,
}

/// Durable record of which migrations are currently applied, per module.
///
/// Storage order is never part of the contract; callers impose their own ordering.
pub trait MigrationLedger: Send + Sync {
    fn find(&self, module: &ModuleSlug, migration: &MigrationId)
    -> Result<Option<MigrationRecord>>;

    fn find_by_batch(&self, module: &ModuleSlug, batch: u32) -> Result<Vec<MigrationRecord>>;

    /// Delete exactly one record. Fails with [`Error::NotFound`] when it is absent.
    fn remove(&self, module: &ModuleSlug, migration: &MigrationId) -> Result<()>;

    /// Record a migration as applied in `batch`.
    fn log(&self, module: &ModuleSlug, migration: &MigrationId, batch: u32) -> Result<()>;

    /// All records for a module, ordered by batch then migration id.
    fn records(&self, module: &ModuleSlug) -> Result<Vec<MigrationRecord>>;

    /// Highest batch number recorded for a module, 0 when nothing is applied.
    fn last_batch_number(&self, module: &ModuleSlug) -> Result<u32>;

    /// Open a transaction scope. Returns false when the store has no transaction support.
    fn begin(&self) -> Result<bool> {
        Ok(false)
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        Ok(())
    }
}

/// Ledger stored in a SQLite table with a `module` column.
pub struct SqliteLedger {
    db: Arc<Database>,
    table: String,
}

impl SqliteLedger {
    /// Attach to an existing ledger table. Issues no DDL.
    pub fn open(db: Arc<Database>, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !is_valid_table_name(&table) {
            return Err(Error::Config(format!("invalid ledger table name: {table}")));
        }

        Ok(Self { db, table })
    }

    /// Attach to `table`, creating it and its index when missing.
    pub fn new(db: Arc<Database>, table: impl Into<String>) -> Result<Self> {
        let ledger = Self::open(db, table)?;
        ledger.ensure_schema()?;
        Ok(ledger)
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(Arc::new(Database::in_memory()?), DEFAULT_LEDGER_TABLE)
    }

    pub fn ensure_schema(&self) -> Result<()> {
        info!("ensuring ledger table {}", self.table);
        self.db
            .execute_batch(&ledger_schema(&self.table))
            .map_err(|e| Error::Database(format!("ledger migration failed: {e}")))
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl MigrationLedger for SqliteLedger {
    fn find(
        &self,
        module: &ModuleSlug,
        migration: &MigrationId,
    ) -> Result<Option<MigrationRecord>> {
        let conn = self.db.connection()?;
        conn.query_row(
            &format!(
                "SELECT module, migration, batch FROM {} WHERE module = ?1 AND migration = ?2",
                self.table
            ),
            params![module.as_str(), migration.as_str()],
            row_to_record,
        )
        .optional()
        .map_err(|e| Error::Database(format!("failed to look up migration {migration}: {e}")))
    }

    fn find_by_batch(&self, module: &ModuleSlug, batch: u32) -> Result<Vec<MigrationRecord>> {
        let conn = self.db.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT module, migration, batch FROM {} WHERE module = ?1 AND batch = ?2",
                self.table
            ))
            .map_err(|e| Error::Database(format!("failed to prepare batch query: {e}")))?;

        let rows = stmt
            .query_map(params![module.as_str(), batch], row_to_record)
            .map_err(|e| Error::Database(format!("failed to execute batch query: {e}")))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(format!("failed to read batch row: {e}")))
    }

    fn remove(&self, module: &ModuleSlug, migration: &MigrationId) -> Result<()> {
        let conn = self.db.connection()?;
        let deleted = conn
            .execute(
                &format!(
                    "DELETE FROM {} WHERE module = ?1 AND migration = ?2",
                    self.table
                ),
                params![module.as_str(), migration.as_str()],
            )
            .map_err(|e| Error::Database(format!("failed to delete ledger record: {e}")))?;

        if deleted == 0 {
            return Err(Error::NotFound(format!(
                "ledger record [{module}] {migration}"
            )));
        }

        debug!("removed ledger record [{module}] {migration}");
        Ok(())
    }

    fn log(&self, module: &ModuleSlug, migration: &MigrationId, batch: u32) -> Result<()> {
        if batch == 0 {
            return Err(Error::Database("batch numbers start at 1".into()));
        }

        let conn = self.db.connection()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (module, migration, batch) VALUES (?1, ?2, ?3)",
                self.table
            ),
            params![module.as_str(), migration.as_str(), batch],
        )
        .map_err(|e| Error::Database(format!("failed to log migration {migration}: {e}")))?;

        Ok(())
    }

    fn records(&self, module: &ModuleSlug) -> Result<Vec<MigrationRecord>> {
        let conn = self.db.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT module, migration, batch FROM {}
                 WHERE module = ?1
                 ORDER BY batch ASC, migration ASC",
                self.table
            ))
            .map_err(|e| Error::Database(format!("failed to prepare ledger query: {e}")))?;

        let rows = stmt
            .query_map(params![module.as_str()], row_to_record)
            .map_err(|e| Error::Database(format!("failed to execute ledger query: {e}")))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(format!("failed to read ledger row: {e}")))
    }

    fn last_batch_number(&self, module: &ModuleSlug) -> Result<u32> {
        let conn = self.db.connection()?;
        let batch: Option<u32> = conn
            .query_row(
                &format!("SELECT MAX(batch) FROM {} WHERE module = ?1", self.table),
                params![module.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to read last batch: {e}")))?;

        Ok(batch.unwrap_or(0))
    }

    fn begin(&self) -> Result<bool> {
        self.db
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;
        Ok(true)
    }

    fn commit(&self) -> Result<()> {
        self.db
            .execute_batch("COMMIT")
            .map_err(|e| Error::Database(format!("failed to commit transaction: {e}")))
    }

    fn rollback(&self) -> Result<()> {
        self.db
            .execute_batch("ROLLBACK")
            .map_err(|e| Error::Database(format!("failed to roll back transaction: {e}")))
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<MigrationRecord> {
    Ok(MigrationRecord {
        module: ModuleSlug::new(row.get::<_, String>(0)?),
        migration: MigrationId::new(row.get::<_, String>(1)?),
        batch: row.get(2)?,
    })
}
