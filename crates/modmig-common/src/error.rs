use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    /// A ledger record that was expected to exist is missing.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unknown module: {0}")]
    UnknownModule(String),

    /// The migration identifier cannot be mapped to loadable migration code.
    #[error("cannot resolve migration [{module}] {migration}: {reason}")]
    UnresolvableUnit {
        module: String,
        migration: String,
        reason: String,
    },

    /// The migration's down operation failed; its ledger record was left in place.
    #[error("rollback of [{module}] {migration} failed: {cause}")]
    MigrationRevert {
        module: String,
        migration: String,
        cause: String,
    },

    #[error("rollback cancelled before [{module}] {migration}")]
    Cancelled { module: String, migration: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The migration identifier this error is about, if any.
    pub fn migration(&self) -> Option<&str> {
        match self {
            Self::UnresolvableUnit { migration, .. }
            | Self::MigrationRevert { migration, .. }
            | Self::Cancelled { migration, .. } => Some(migration),
            _ => None,
        }
    }
}
