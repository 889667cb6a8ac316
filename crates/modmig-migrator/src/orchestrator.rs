use modmig_common::{Error, ModuleSlug, Result};
use modmig_db::{MigrationLedger, MigrationRecord};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::executor::{ExecutorOptions, MigrationOutcome, RollbackExecutor};
use crate::locator::{MigrationLocator, Module, ModuleLocator};
use crate::resolver::BatchResolver;
use crate::status::{ModuleStatus, module_status};
use crate::unit::MigrationLoader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackScope {
    Module(ModuleSlug),
    All,
}

impl From<Option<String>> for RollbackScope {
    fn from(slug: Option<String>) -> Self {
        match slug {
            Some(slug) => Self::Module(ModuleSlug::new(slug)),
            None => Self::All,
        }
    }
}

/// Result of rolling back one module.
#[derive(Debug)]
pub struct ModuleReport {
    pub module: ModuleSlug,
    /// Batch that was targeted, `None` when there was nothing to roll back.
    pub batch: Option<u32>,
    pub outcomes: Vec<MigrationOutcome>,
    pub orphaned: Vec<MigrationRecord>,
    /// The error that stopped this module's batch.
    pub error: Option<Error>,
}

impl ModuleReport {
    fn new(module: ModuleSlug) -> Self {
        Self {
            module,
            batch: None,
            outcomes: Vec::new(),
            orphaned: Vec::new(),
            error: None,
        }
    }

    pub fn nothing_to_rollback(&self) -> bool {
        self.batch.is_none() && self.error.is_none()
    }
}

#[derive(Debug, Default)]
pub struct RollbackReport {
    pub pretend: bool,
    /// Set when an interrupt stopped the run; modules after the last report were skipped.
    pub cancelled: bool,
    pub modules: Vec<ModuleReport>,
}

impl RollbackReport {
    /// The first error in module order; decides the command's exit status.
    pub fn first_error(&self) -> Option<(&ModuleSlug, &Error)> {
        self.modules
            .iter()
            .find_map(|m| m.error.as_ref().map(|e| (&m.module, e)))
    }

    pub fn rolled_back(&self) -> usize {
        self.modules
            .iter()
            .flat_map(|m| &m.outcomes)
            .filter(|o| matches!(o, MigrationOutcome::RolledBack { .. }))
            .count()
    }
}

/// Rolls back the latest batch of one module or of every registered module.
///
/// Modules are processed sequentially in registry order. A failure stops the rest of that
/// module's batch only; later modules still run. Cancellation stops everything.
pub struct RollbackOrchestrator {
    modules: Arc<dyn ModuleLocator>,
    migrations: Arc<dyn MigrationLocator>,
    ledger: Arc<dyn MigrationLedger>,
    loader: Arc<dyn MigrationLoader>,
    options: ExecutorOptions,
    cancel: CancelToken,
}

impl RollbackOrchestrator {
    pub fn new(
        modules: Arc<dyn ModuleLocator>,
        migrations: Arc<dyn MigrationLocator>,
        ledger: Arc<dyn MigrationLedger>,
        loader: Arc<dyn MigrationLoader>,
    ) -> Self {
        Self {
            modules,
            migrations,
            ledger,
            loader,
            options: ExecutorOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Roll back `scope`.
    ///
    /// Only a lookup failure for an unknown module or a broken registry is returned as `Err`;
    /// per-module failures are recorded in the report.
    pub fn run(&self, scope: &RollbackScope) -> Result<RollbackReport> {
        let mut report = RollbackReport {
            pretend: self.options.pretend,
            ..RollbackReport::default()
        };

        for module in self.select(scope)? {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let module_report = self.rollback_module(&module);
            report.cancelled = matches!(module_report.error, Some(Error::Cancelled { .. }));
            report.modules.push(module_report);

            if report.cancelled {
                break;
            }
        }

        if report.cancelled {
            warn!("rollback cancelled, skipping remaining modules");
        }

        Ok(report)
    }

    pub fn status(&self, scope: &RollbackScope) -> Result<Vec<ModuleStatus>> {
        self.select(scope)?
            .iter()
            .map(|module| module_status(module, self.migrations.as_ref(), self.ledger.as_ref()))
            .collect()
    }

    fn select(&self, scope: &RollbackScope) -> Result<Vec<Module>> {
        match scope {
            RollbackScope::All => self.modules.list_modules(),
            RollbackScope::Module(slug) => match self.modules.find(slug)? {
                Some(module) => Ok(vec![module]),
                None => Err(Error::UnknownModule(slug.to_string())),
            },
        }
    }

    fn rollback_module(&self, module: &Module) -> ModuleReport {
        let mut report = ModuleReport::new(module.slug.clone());
        if let Err(e) = self.rollback_module_into(module, &mut report) {
            warn!("rollback of module {} stopped: {e}", module.slug);
            report.error = Some(e);
        }
        report
    }

    fn rollback_module_into(&self, module: &Module, report: &mut ModuleReport) -> Result<()> {
        let candidates = self.migrations.list_candidates(module)?;
        let resolved =
            BatchResolver::new(self.ledger.as_ref()).resolve(&module.slug, &candidates)?;

        for orphan in &resolved.orphaned {
            warn!(
                "[{}] {} is recorded in batch {} but its migration file is missing; leaving it applied",
                module.slug, orphan.migration, orphan.batch
            );
        }
        report.batch = resolved.batch;
        report.orphaned = resolved.orphaned.clone();

        if resolved.is_empty() {
            info!("nothing to rollback for {}", module.slug);
            return Ok(());
        }

        info!(
            "rolling back batch {} of {} ({} migration(s))",
            resolved.batch.unwrap_or_default(),
            module.slug,
            resolved.records.len()
        );

        RollbackExecutor::new(
            self.ledger.as_ref(),
            self.loader.as_ref(),
            self.options,
            self.cancel.clone(),
        )
        .execute(module, &resolved.records, &mut report.outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::{RollbackOrchestrator, RollbackScope};
    use crate::cancel::CancelToken;
    use crate::locator::{ConfigModuleLocator, FsMigrationLocator, Module};
    use crate::sql::SqlFileLoader;
    use crate::unit::{MigrationLoader, MigrationUnit};
    use modmig_common::{Error, MigrationId, ModuleSlug};
    use modmig_db::{MigrationLedger, SqliteLedger};
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    fn write_migration(dir: &Path, id: &str, down: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join(format!("{id}.sql")),
            format!("-- Up\nSELECT 1;\n-- Down\n{down}\n"),
        )
        .unwrap();
    }

    fn orchestrator(root: &Path, slugs: &[&str]) -> (RollbackOrchestrator, Arc<SqliteLedger>) {
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        let modules = slugs
            .iter()
            .map(|s| Module::new(*s, root.join(s).join("migrations")))
            .collect();

        let orchestrator = RollbackOrchestrator::new(
            Arc::new(ConfigModuleLocator::new(modules)),
            Arc::new(FsMigrationLocator::new()),
            ledger.clone(),
            Arc::new(SqlFileLoader::new(Arc::clone(ledger.database()))),
        );
        (orchestrator, ledger)
    }

    #[test]
    fn unknown_module_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, _) = orchestrator(root.path(), &["billing"]);

        let err = orchestrator
            .run(&RollbackScope::Module("shipping".into()))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownModule(_)));
    }

    #[test]
    fn module_without_applied_migrations_is_a_noop() {
        let root = tempfile::tempdir().unwrap();
        write_migration(
            &root.path().join("billing/migrations"),
            "m1",
            "DROP TABLE IF EXISTS scratch;",
        );
        let (orchestrator, _) = orchestrator(root.path(), &["billing"]);

        let report = orchestrator.run(&RollbackScope::All).unwrap();
        assert_eq!(report.modules.len(), 1);
        assert!(report.modules[0].nothing_to_rollback());
        assert!(report.first_error().is_none());
    }

    #[test]
    fn failing_module_does_not_stop_later_modules() {
        let root = tempfile::tempdir().unwrap();
        write_migration(
            &root.path().join("billing/migrations"),
            "m1",
            "DROP TABLE missing_table;",
        );
        write_migration(
            &root.path().join("users/migrations"),
            "m1",
            "DROP TABLE IF EXISTS scratch;",
        );
        let (orchestrator, ledger) = orchestrator(root.path(), &["billing", "users"]);
        ledger.log(&"billing".into(), &"m1".into(), 1).unwrap();
        ledger.log(&"users".into(), &"m1".into(), 1).unwrap();

        let report = orchestrator.run(&RollbackScope::All).unwrap();

        let (module, err) = report.first_error().unwrap();
        assert_eq!(module.as_str(), "billing");
        assert!(matches!(err, Error::MigrationRevert { .. }));
        assert_eq!(report.rolled_back(), 1);
        assert!(ledger.find(&"billing".into(), &"m1".into()).unwrap().is_some());
        assert!(ledger.find(&"users".into(), &"m1".into()).unwrap().is_none());
    }

    fn seed_both(root: &Path) -> (RollbackOrchestrator, Arc<SqliteLedger>) {
        for slug in ["billing", "users"] {
            write_migration(
                &root.join(slug).join("migrations"),
                "m1",
                "DROP TABLE IF EXISTS scratch;",
            );
        }
        let (orchestrator, ledger) = orchestrator(root, &["billing", "users"]);
        for slug in ["billing", "users"] {
            ledger
                .log(&ModuleSlug::new(slug), &MigrationId::new("m1"), 1)
                .unwrap();
        }
        (orchestrator, ledger)
    }

    #[test]
    fn cancellation_before_start_touches_no_module() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, ledger) = seed_both(root.path());

        let cancel = CancelToken::new();
        cancel.cancel();
        let report = orchestrator
            .with_cancel(cancel)
            .run(&RollbackScope::All)
            .unwrap();

        assert!(report.cancelled);
        assert!(report.modules.is_empty());
        assert_eq!(ledger.records(&"billing".into()).unwrap().len(), 1);
        assert_eq!(ledger.records(&"users".into()).unwrap().len(), 1);
    }

    #[test]
    fn cancellation_stops_iterating_over_empty_modules() {
        let root = tempfile::tempdir().unwrap();
        for slug in ["audit", "billing", "users"] {
            write_migration(
                &root.path().join(slug).join("migrations"),
                "m1",
                "DROP TABLE IF EXISTS scratch;",
            );
        }
        let (orchestrator, _) = orchestrator(root.path(), &["audit", "billing", "users"]);

        let cancel = CancelToken::new();
        cancel.cancel();
        let report = orchestrator
            .with_cancel(cancel)
            .run(&RollbackScope::All)
            .unwrap();

        assert!(report.cancelled);
        assert!(report.modules.is_empty());
        assert!(report.first_error().is_none());
    }

    #[test]
    fn cancellation_inside_a_module_is_reported_on_that_module() {
        struct CancelOnLoad {
            inner: SqlFileLoader,
            cancel: CancelToken,
        }

        impl MigrationLoader for CancelOnLoad {
            fn resolve(
                &self,
                module: &Module,
                migration: &MigrationId,
            ) -> modmig_common::Result<Arc<dyn MigrationUnit>> {
                self.cancel.cancel();
                self.inner.resolve(module, migration)
            }
        }

        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("billing/migrations");
        write_migration(&dir, "m1", "DROP TABLE IF EXISTS scratch;");
        write_migration(&dir, "m2", "DROP TABLE IF EXISTS scratch;");
        write_migration(
            &root.path().join("users/migrations"),
            "m1",
            "DROP TABLE IF EXISTS scratch;",
        );

        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        for (slug, id) in [("billing", "m1"), ("billing", "m2"), ("users", "m1")] {
            ledger
                .log(&ModuleSlug::new(slug), &MigrationId::new(id), 1)
                .unwrap();
        }

        let cancel = CancelToken::new();
        let orchestrator = RollbackOrchestrator::new(
            Arc::new(ConfigModuleLocator::new(vec![
                Module::new("billing", root.path().join("billing/migrations")),
                Module::new("users", root.path().join("users/migrations")),
            ])),
            Arc::new(FsMigrationLocator::new()),
            ledger.clone(),
            Arc::new(CancelOnLoad {
                inner: SqlFileLoader::new(Arc::clone(ledger.database())),
                cancel: cancel.clone(),
            }),
        )
        .with_cancel(cancel);

        let report = orchestrator.run(&RollbackScope::All).unwrap();

        assert!(report.cancelled);
        assert_eq!(report.modules.len(), 1);
        assert_eq!(report.rolled_back(), 1);
        assert!(matches!(
            report.modules[0].error,
            Some(Error::Cancelled { ref migration, .. }) if migration == "m1"
        ));
        assert_eq!(ledger.records(&"users".into()).unwrap().len(), 1);
    }

    #[test]
    fn scope_from_optional_slug() {
        assert_eq!(RollbackScope::from(None::<String>), RollbackScope::All);
        assert_eq!(
            RollbackScope::from(Some("billing".to_string())),
            RollbackScope::Module("billing".into())
        );
    }
}
