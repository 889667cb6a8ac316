use std::path::{Path, PathBuf};

use modmig_common::{Error, Result};
use tracing::info;

use crate::model::AppConfig;

const DEFAULT_DATABASE_FILE: &str = "modmig.db";

pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Result<Self> {
        let config_dir = Self::default_config_dir();
        Ok(Self { config_dir })
    }

    pub fn default_config_dir() -> PathBuf {
        let home_config = dirs::home_dir().map(|h| h.join(".modmig"));
        let xdg_config = dirs::config_dir().map(|c| c.join("modmig"));

        match (xdg_config, home_config) {
            (Some(xdg), Some(home)) => {
                if xdg.exists() {
                    xdg
                } else if home.exists() {
                    home
                } else {
                    xdg
                }
            }
            (Some(xdg), None) => xdg,
            (None, Some(home)) => home,
            (None, None) => PathBuf::from(".modmig"),
        }
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn load(&self) -> Result<AppConfig> {
        let yaml_path = self.config_dir.join("config.yml");
        let toml_path = self.config_dir.join("config.toml");

        let config: AppConfig = if yaml_path.exists() {
            info!("loading config from {}", yaml_path.display());
            let contents = std::fs::read_to_string(&yaml_path)?;
            serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse YAML config: {e}")))?
        } else if toml_path.exists() {
            info!("loading config from {}", toml_path.display());
            let contents = std::fs::read_to_string(&toml_path)?;
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse TOML config: {e}")))?
        } else {
            info!("no config file found, using defaults");
            AppConfig::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Resolve a configured path against the config directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    pub fn data_dir(&self, config: &AppConfig) -> PathBuf {
        match &config.data_dir {
            Some(dir) => self.resolve_path(dir),
            None => self.config_dir.join("data"),
        }
    }

    /// Database file for the named connection, or the default connection when `name` is None.
    ///
    /// The default connection falls back to `<data_dir>/modmig.db` when it is not configured;
    /// any other unknown name is an error.
    pub fn database_path(&self, config: &AppConfig, name: Option<&str>) -> Result<PathBuf> {
        let name = name.unwrap_or(config.default_database.as_str());

        match config.databases.get(name) {
            Some(db) => Ok(self.resolve_path(&db.path)),
            None if name == config.default_database => {
                Ok(self.data_dir(config).join(DEFAULT_DATABASE_FILE))
            }
            None => Err(Error::Config(format!(
                "database connection '{name}' is not configured"
            ))),
        }
    }

    pub fn ensure_dirs(&self, config: &AppConfig) -> Result<()> {
        let dirs = [self.config_dir.clone(), self.data_dir(config)];

        for dir in &dirs {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }

        Ok(())
    }
}
