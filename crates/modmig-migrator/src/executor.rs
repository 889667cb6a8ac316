use modmig_common::{Error, MigrationId, Result};
use modmig_db::{MigrationLedger, MigrationRecord};
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::locator::Module;
use crate::unit::{MigrationLoader, MigrationUnit};

#[derive(Debug, Clone, Copy)]
pub struct ExecutorOptions {
    /// Describe what would run instead of running it.
    pub pretend: bool,
    /// Run each revert and its ledger delete inside one ledger transaction.
    pub transactional: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            pretend: false,
            transactional: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    RolledBack { migration: MigrationId },
    Pretended {
        migration: MigrationId,
        statements: Vec<String>,
    },
}

impl MigrationOutcome {
    pub fn migration(&self) -> &MigrationId {
        match self {
            Self::RolledBack { migration } | Self::Pretended { migration, .. } => migration,
        }
    }
}

/// Reverts resolved records one at a time and retracts them from the ledger.
pub struct RollbackExecutor<'a> {
    ledger: &'a dyn MigrationLedger,
    loader: &'a dyn MigrationLoader,
    options: ExecutorOptions,
    cancel: CancelToken,
}

impl<'a> RollbackExecutor<'a> {
    pub fn new(
        ledger: &'a dyn MigrationLedger,
        loader: &'a dyn MigrationLoader,
        options: ExecutorOptions,
        cancel: CancelToken,
    ) -> Self {
        Self {
            ledger,
            loader,
            options,
            cancel,
        }
    }

    /// Process `records` in the given order (newest first), pushing one outcome per migration.
    ///
    /// Stops at the first failure. Records already processed stay rolled back; the failing
    /// record and everything after it keep their ledger entries.
    pub fn execute(
        &self,
        module: &Module,
        records: &[MigrationRecord],
        outcomes: &mut Vec<MigrationOutcome>,
    ) -> Result<()> {
        for record in records {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled {
                    module: module.slug.to_string(),
                    migration: record.migration.to_string(),
                });
            }

            let unit = self
                .loader
                .resolve(module, &record.migration)
                .map_err(|e| match e {
                    Error::UnresolvableUnit { .. } => e,
                    other => Error::UnresolvableUnit {
                        module: module.slug.to_string(),
                        migration: record.migration.to_string(),
                        reason: other.to_string(),
                    },
                })?;

            if self.options.pretend {
                let statements = unit.describe();
                info!(
                    "pretend [{}] {}: {} statement(s)",
                    module.slug,
                    record.migration,
                    statements.len()
                );
                outcomes.push(MigrationOutcome::Pretended {
                    migration: record.migration.clone(),
                    statements,
                });
                continue;
            }

            self.revert_one(module, record, unit.as_ref())?;
            info!("rolled back [{}] {}", module.slug, record.migration);
            outcomes.push(MigrationOutcome::RolledBack {
                migration: record.migration.clone(),
            });
        }

        Ok(())
    }

    fn revert_one(
        &self,
        module: &Module,
        record: &MigrationRecord,
        unit: &dyn MigrationUnit,
    ) -> Result<()> {
        let scoped = self.options.transactional && self.ledger.begin()?;

        let result = unit
            .revert()
            .map_err(|e| Error::MigrationRevert {
                module: module.slug.to_string(),
                migration: record.migration.to_string(),
                cause: e.to_string(),
            })
            .and_then(|()| self.ledger.remove(&module.slug, &record.migration));

        match result {
            Ok(()) if scoped => self.ledger.commit(),
            Ok(()) => Ok(()),
            Err(e) => {
                if scoped && let Err(rollback_err) = self.ledger.rollback() {
                    warn!(
                        "failed to roll back transaction for [{}] {}: {rollback_err}",
                        module.slug, record.migration
                    );
                }
                Err(e)
            }
        }
    }
}
