use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use modmig_config::{AppConfig, ConfigLoader};
use modmig_db::{Database, SqliteLedger};
use modmig_migrator::{
    ConfigModuleLocator, ExecutorOptions, FsMigrationLocator, RollbackOrchestrator, SqlFileLoader,
};
use tracing::{debug, info};

/// Loaded configuration and the wiring that turns it into rollback collaborators.
pub struct AppContext {
    loader: ConfigLoader,
    config: AppConfig,
}

impl AppContext {
    pub fn new(loader: ConfigLoader, config: AppConfig) -> Self {
        Self { loader, config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn module_locator(&self) -> ConfigModuleLocator {
        ConfigModuleLocator::from_config(&self.config, &self.loader)
    }

    pub fn database_path(&self, database: Option<&str>) -> Result<PathBuf> {
        Ok(self.loader.database_path(&self.config, database)?)
    }

    /// Build an orchestrator over the named connection.
    ///
    /// Returns `None` when the database file or its ledger table does not exist yet, so
    /// nothing was ever recorded. Neither is created here, and no DDL is issued.
    pub fn orchestrator(
        &self,
        database: Option<&str>,
        pretend: bool,
    ) -> Result<Option<RollbackOrchestrator>> {
        let path = self.database_path(database)?;
        if !path.is_file() {
            debug!("database {} does not exist", path.display());
            return Ok(None);
        }

        let db = Arc::new(Database::open(&path)?);
        if !db.table_exists(&self.config.ledger_table)? {
            debug!(
                "ledger table {} not found in {}",
                self.config.ledger_table,
                path.display()
            );
            return Ok(None);
        }

        let ledger = Arc::new(SqliteLedger::open(
            Arc::clone(&db),
            self.config.ledger_table.as_str(),
        )?);
        info!("using ledger {} in {}", ledger.table(), path.display());

        let orchestrator = RollbackOrchestrator::new(
            Arc::new(self.module_locator()),
            Arc::new(FsMigrationLocator::new()),
            ledger,
            Arc::new(SqlFileLoader::new(db)),
        )
        .with_options(ExecutorOptions {
            pretend,
            transactional: self.config.transactional,
        });

        Ok(Some(orchestrator))
    }
}
