use modmig_common::{MigrationId, ModuleSlug, Result};
use modmig_db::{MigrationLedger, MigrationRecord};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// The latest applied batch of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedBatch {
    /// `None` when no candidate has a ledger record.
    pub batch: Option<u32>,
    /// Records to revert, newest first.
    pub records: Vec<MigrationRecord>,
    /// Ledger records at or above the target batch whose migration file is no longer on disk,
    /// newest batch first. They are reported, never reverted.
    pub orphaned: Vec<MigrationRecord>,
}

impl ResolvedBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Determines which ledger records make up a module's most recent batch.
pub struct BatchResolver<'a> {
    ledger: &'a dyn MigrationLedger,
}

impl<'a> BatchResolver<'a> {
    pub fn new(ledger: &'a dyn MigrationLedger) -> Self {
        Self { ledger }
    }

    /// Resolve the latest batch from `candidates`, given oldest first as found on disk.
    ///
    /// The batch is fixed by the newest candidate that has a ledger record. Every candidate
    /// recorded with that batch number is returned, newest first. Candidates without a record
    /// are skipped, and inconsistent batch numbering is taken as-is.
    ///
    /// Ledger records without a file are never part of the batch. Those in the target batch or
    /// a newer one are listed as orphaned, as is every file-less record when no candidate
    /// resolves.
    pub fn resolve(
        &self,
        module: &ModuleSlug,
        candidates: &[MigrationId],
    ) -> Result<ResolvedBatch> {
        let target = self.latest_batch(module, candidates)?;
        let orphaned = self.orphaned(module, target, candidates)?;

        let Some(target) = target else {
            debug!("no applied migrations found for {module}");
            return Ok(ResolvedBatch {
                orphaned,
                ..ResolvedBatch::default()
            });
        };

        let mut in_batch: HashMap<MigrationId, MigrationRecord> = self
            .ledger
            .find_by_batch(module, target)?
            .into_iter()
            .map(|record| (record.migration.clone(), record))
            .collect();
        let records: Vec<MigrationRecord> = candidates
            .iter()
            .rev()
            .filter_map(|migration| in_batch.remove(migration))
            .collect();

        debug!(
            "resolved batch {target} for {module}: {} migration(s), {} orphaned",
            records.len(),
            orphaned.len()
        );

        Ok(ResolvedBatch {
            batch: Some(target),
            records,
            orphaned,
        })
    }

    fn latest_batch(&self, module: &ModuleSlug, candidates: &[MigrationId]) -> Result<Option<u32>> {
        for migration in candidates.iter().rev() {
            if let Some(record) = self.ledger.find(module, migration)? {
                return Ok(Some(record.batch));
            }
        }
        Ok(None)
    }

    fn orphaned(
        &self,
        module: &ModuleSlug,
        target: Option<u32>,
        candidates: &[MigrationId],
    ) -> Result<Vec<MigrationRecord>> {
        let on_disk: HashSet<&MigrationId> = candidates.iter().collect();
        let mut orphaned: Vec<MigrationRecord> = self
            .ledger
            .records(module)?
            .into_iter()
            .filter(|record| !on_disk.contains(&record.migration))
            .filter(|record| target.is_none_or(|batch| record.batch >= batch))
            .collect();

        orphaned.sort_by(|a, b| {
            b.batch
                .cmp(&a.batch)
                .then_with(|| b.migration.cmp(&a.migration))
        });
        Ok(orphaned)
    }
}
