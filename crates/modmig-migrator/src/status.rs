use modmig_common::{MigrationId, Result};
use modmig_db::{MigrationLedger, MigrationRecord};
use std::collections::HashSet;

use crate::locator::{MigrationLocator, Module};

/// Applied and pending migrations of one module.
#[derive(Debug, Clone)]
pub struct ModuleStatus {
    pub module: Module,
    /// Ledger records that still have a file on disk, ordered by batch then id.
    pub applied: Vec<MigrationRecord>,
    /// Files on disk with no ledger record, oldest first.
    pub pending: Vec<MigrationId>,
    /// Ledger records whose file is gone.
    pub orphaned: Vec<MigrationRecord>,
    /// Highest recorded batch, `None` when nothing is applied.
    pub last_batch: Option<u32>,
}

pub fn module_status(
    module: &Module,
    migrations: &dyn MigrationLocator,
    ledger: &dyn MigrationLedger,
) -> Result<ModuleStatus> {
    let candidates = migrations.list_candidates(module)?;
    let on_disk: HashSet<&MigrationId> = candidates.iter().collect();

    let (applied, orphaned): (Vec<_>, Vec<_>) = ledger
        .records(&module.slug)?
        .into_iter()
        .partition(|record| on_disk.contains(&record.migration));

    let recorded: HashSet<&MigrationId> = applied.iter().map(|r| &r.migration).collect();
    let pending = candidates
        .iter()
        .filter(|id| !recorded.contains(id))
        .cloned()
        .collect();

    let last_batch = match ledger.last_batch_number(&module.slug)? {
        0 => None,
        batch => Some(batch),
    };

    Ok(ModuleStatus {
        module: module.clone(),
        applied,
        pending,
        orphaned,
        last_batch,
    })
}
