use modmig_common::{MigrationId, ModuleSlug, Result};
use modmig_config::{AppConfig, ConfigLoader};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A registered module and the directory holding its migration files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub slug: ModuleSlug,
    pub migration_dir: PathBuf,
}

impl Module {
    pub fn new(slug: impl Into<ModuleSlug>, migration_dir: impl Into<PathBuf>) -> Self {
        Self {
            slug: slug.into(),
            migration_dir: migration_dir.into(),
        }
    }
}

/// Enumerates registered modules in registry order.
pub trait ModuleLocator: Send + Sync {
    fn list_modules(&self) -> Result<Vec<Module>>;

    fn find(&self, slug: &ModuleSlug) -> Result<Option<Module>> {
        Ok(self
            .list_modules()?
            .into_iter()
            .find(|module| &module.slug == slug))
    }
}

/// Lists the migration identifiers present for a module, oldest first.
pub trait MigrationLocator: Send + Sync {
    fn list_candidates(&self, module: &Module) -> Result<Vec<MigrationId>>;
}

/// Module registry built from configuration.
///
/// Explicitly configured modules come first, in file order. Modules discovered under
/// `modules_dir` follow, sorted by slug; a discovered directory never shadows an explicit entry.
pub struct ConfigModuleLocator {
    modules: Vec<Module>,
    modules_dir: Option<PathBuf>,
}

impl ConfigModuleLocator {
    pub fn new(modules: Vec<Module>) -> Self {
        Self {
            modules,
            modules_dir: None,
        }
    }

    pub fn with_modules_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.modules_dir = Some(dir.into());
        self
    }

    pub fn from_config(config: &AppConfig, loader: &ConfigLoader) -> Self {
        let modules = config
            .modules
            .iter()
            .map(|m| {
                let root = loader.resolve_path(&m.path);
                let migration_dir = match &m.migrations {
                    Some(dir) if dir.is_absolute() => dir.clone(),
                    Some(dir) => root.join(dir),
                    None => root.join("migrations"),
                };
                Module::new(m.slug.as_str(), migration_dir)
            })
            .collect();

        let locator = Self::new(modules);
        match &config.modules_dir {
            Some(dir) => locator.with_modules_dir(loader.resolve_path(dir)),
            None => locator,
        }
    }

    fn discover(&self, root: &Path, known: &HashSet<ModuleSlug>) -> Result<Vec<Module>> {
        let mut found = Vec::new();

        if !root.exists() {
            warn!("modules directory {} does not exist", root.display());
            return Ok(found);
        }

        for entry in std::fs::read_dir(root)? {
            let path = entry?.path();
            let migrations = path.join("migrations");
            if !migrations.is_dir() {
                continue;
            }

            let Some(slug) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let slug = ModuleSlug::new(slug);
            if known.contains(&slug) {
                continue;
            }

            debug!("discovered module {slug} at {}", path.display());
            found.push(Module {
                slug,
                migration_dir: migrations,
            });
        }

        found.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(found)
    }
}

impl ModuleLocator for ConfigModuleLocator {
    fn list_modules(&self) -> Result<Vec<Module>> {
        let mut modules = self.modules.clone();

        if let Some(root) = &self.modules_dir {
            let known: HashSet<ModuleSlug> = modules.iter().map(|m| m.slug.clone()).collect();
            modules.extend(self.discover(root, &known)?);
        }

        Ok(modules)
    }
}

/// Finds `*.sql` migration files in a module's migration directory.
///
/// The identifier is the file stem. Stems start with a sortable stamp, so lexical order is
/// application order.
#[derive(Debug, Clone, Default)]
pub struct FsMigrationLocator;

impl FsMigrationLocator {
    pub fn new() -> Self {
        Self
    }
}

impl MigrationLocator for FsMigrationLocator {
    fn list_candidates(&self, module: &Module) -> Result<Vec<MigrationId>> {
        let mut ids = Vec::new();

        if !module.migration_dir.exists() {
            debug!(
                "no migration directory for {} at {}",
                module.slug,
                module.migration_dir.display()
            );
            return Ok(ids);
        }

        for entry in std::fs::read_dir(&module.migration_dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }

            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(MigrationId::new(stem));
            }
        }

        ids.sort();
        Ok(ids)
    }
}
