//! Rollback of the most recently applied migration batch, per module or across all modules.
//!
//! The [`RollbackOrchestrator`] walks modules from a [`ModuleLocator`], asks the
//! [`BatchResolver`] which ledger records make up the latest batch, and hands them to the
//! [`RollbackExecutor`], which reverts them newest first and retracts each ledger record.

pub mod cancel;
pub mod executor;
pub mod guard;
pub mod locator;
pub mod orchestrator;
pub mod resolver;
pub mod sql;
pub mod status;
pub mod unit;

pub use cancel::CancelToken;
pub use executor::{ExecutorOptions, MigrationOutcome, RollbackExecutor};
pub use guard::{is_production, should_proceed};
pub use locator::{
    ConfigModuleLocator, FsMigrationLocator, MigrationLocator, Module, ModuleLocator,
};
pub use orchestrator::{ModuleReport, RollbackOrchestrator, RollbackReport, RollbackScope};
pub use resolver::{BatchResolver, ResolvedBatch};
pub use sql::{SqlFileLoader, SqlMigration};
pub use status::{ModuleStatus, module_status};
pub use unit::{MigrationLoader, MigrationUnit, UnitRegistry};
