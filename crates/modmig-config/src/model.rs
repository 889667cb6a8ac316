use modmig_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment name, e.g. `local`, `staging`, `production`.
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_database_name")]
    pub default_database: String,

    #[serde(default)]
    pub databases: HashMap<String, DatabaseConfig>,

    /// Table holding the applied-migration ledger.
    #[serde(default = "default_ledger_table")]
    pub ledger_table: String,

    /// Wrap each revert and its ledger delete in one transaction.
    #[serde(default = "default_transactional")]
    pub transactional: bool,

    /// Registered modules, in registry order.
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,

    /// Optional root scanned for `<slug>/migrations` directories.
    #[serde(default)]
    pub modules_dir: Option<PathBuf>,

    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            default_database: default_database_name(),
            databases: HashMap::new(),
            ledger_table: default_ledger_table(),
            transactional: default_transactional(),
            modules: Vec::new(),
            modules_dir: None,
            data_dir: None,
            log_level: Some("info".to_string()),
        }
    }
}

impl AppConfig {
    /// Reject settings that would be unsafe to interpolate or ambiguous to resolve.
    pub fn validate(&self) -> Result<()> {
        if !is_sql_identifier(&self.ledger_table) {
            return Err(Error::Config(format!(
                "ledger_table '{}' must contain only letters, digits and underscores",
                self.ledger_table
            )));
        }

        let mut seen = HashSet::new();
        for module in &self.modules {
            if module.slug.trim().is_empty() {
                return Err(Error::Config("module slug cannot be empty".into()));
            }
            if !seen.insert(module.slug.as_str()) {
                return Err(Error::Config(format!(
                    "module '{}' is registered more than once",
                    module.slug
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file; relative paths resolve against the config directory.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub slug: String,

    /// Module root. Migrations live in `<path>/migrations` unless `migrations` is set.
    pub path: PathBuf,

    #[serde(default)]
    pub migrations: Option<PathBuf>,
}

fn default_environment() -> String {
    "local".to_string()
}

fn default_database_name() -> String {
    "default".to_string()
}

fn default_ledger_table() -> String {
    "module_migrations".to_string()
}

fn default_transactional() -> bool {
    true
}

fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
