//! Migrations written as plain SQL files.
//!
//! A file holds an `-- Up` section and a `-- Down` section:
//!
//! ```sql
//! -- Up
//! CREATE TABLE invoices (id INTEGER PRIMARY KEY);
//!
//! -- Down
//! DROP TABLE invoices;
//! ```
//!
//! Everything before the `-- Down` marker belongs to the up section. Other comment lines and
//! blank lines are dropped.

use modmig_common::{Error, MigrationId, Result};
use modmig_db::{Database, split_statements};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::locator::Module;
use crate::unit::{MigrationLoader, MigrationUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Up,
    Down,
}

/// A migration loaded from `<migration_dir>/<id>.sql`, reverted against a shared database.
pub struct SqlMigration {
    id: MigrationId,
    path: PathBuf,
    down_sql: String,
    db: Arc<Database>,
}

impl SqlMigration {
    pub fn from_file(id: MigrationId, path: &Path, db: Arc<Database>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let (_, down_sql) = parse_sections(&content);

        Ok(Self {
            id,
            path: path.to_path_buf(),
            down_sql,
            db,
        })
    }
}

impl MigrationUnit for SqlMigration {
    fn id(&self) -> &MigrationId {
        &self.id
    }

    fn revert(&self) -> Result<()> {
        debug!("reverting {} from {}", self.id, self.path.display());
        self.db.execute_batch(&self.down_sql)
    }

    fn describe(&self) -> Vec<String> {
        split_statements(&self.down_sql)
    }
}

/// Loads [`SqlMigration`]s from each module's migration directory.
pub struct SqlFileLoader {
    db: Arc<Database>,
}

impl SqlFileLoader {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl MigrationLoader for SqlFileLoader {
    fn resolve(&self, module: &Module, migration: &MigrationId) -> Result<Arc<dyn MigrationUnit>> {
        let unresolvable = |reason: String| Error::UnresolvableUnit {
            module: module.slug.to_string(),
            migration: migration.to_string(),
            reason,
        };

        let path = module.migration_dir.join(format!("{migration}.sql"));
        if !path.is_file() {
            return Err(unresolvable(format!("{} does not exist", path.display())));
        }

        let unit = SqlMigration::from_file(migration.clone(), &path, Arc::clone(&self.db))
            .map_err(|e| unresolvable(format!("failed to read {}: {e}", path.display())))?;

        if unit.down_sql.is_empty() {
            return Err(unresolvable(format!(
                "{} has no -- Down section",
                path.display()
            )));
        }

        Ok(Arc::new(unit))
    }
}

fn parse_sections(content: &str) -> (String, String) {
    let mut section = Section::Up;
    let mut up = Vec::new();
    let mut down = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(marker) = trimmed.strip_prefix("--") {
            match marker.trim().to_ascii_lowercase().as_str() {
                "up" => section = Section::Up,
                "down" => section = Section::Down,
                _ => {}
            }
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }

        match section {
            Section::Up => up.push(line),
            Section::Down => down.push(line),
        }
    }

    (
        up.join("\n").trim().to_string(),
        down.join("\n").trim().to_string(),
    )
}
