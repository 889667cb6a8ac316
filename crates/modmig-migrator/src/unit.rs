use modmig_common::{Error, MigrationId, ModuleSlug, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::locator::Module;

/// Executable migration logic that can be undone.
pub trait MigrationUnit: Send + Sync {
    fn id(&self) -> &MigrationId;

    /// Undo the migration's effect on the schema.
    fn revert(&self) -> Result<()>;

    /// Statements `revert` would run, for pretend mode.
    fn describe(&self) -> Vec<String>;
}

/// Maps a migration identifier to its executable unit.
pub trait MigrationLoader: Send + Sync {
    /// Fails with [`Error::UnresolvableUnit`] when no code exists for the identifier.
    fn resolve(&self, module: &Module, migration: &MigrationId) -> Result<Arc<dyn MigrationUnit>>;
}

/// Explicit table of migration units, keyed by module and identifier.
#[derive(Default)]
pub struct UnitRegistry {
    units: HashMap<(ModuleSlug, MigrationId), Arc<dyn MigrationUnit>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: impl Into<ModuleSlug>, unit: Arc<dyn MigrationUnit>) {
        let module = module.into();
        info!("registered migration [{}] {}", module, unit.id());
        self.units.insert((module, unit.id().clone()), unit);
    }
}

impl MigrationLoader for UnitRegistry {
    fn resolve(&self, module: &Module, migration: &MigrationId) -> Result<Arc<dyn MigrationUnit>> {
        self.units
            .get(&(module.slug.clone(), migration.clone()))
            .cloned()
            .ok_or_else(|| Error::UnresolvableUnit {
                module: module.slug.to_string(),
                migration: migration.to_string(),
                reason: "no migration registered under this identifier".into(),
            })
    }
}
