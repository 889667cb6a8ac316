pub mod database;
pub mod ledger;
pub mod schema;
pub mod statements;

pub use database::Database;
pub use ledger::{MigrationLedger, MigrationRecord, SqliteLedger};
pub use schema::DEFAULT_LEDGER_TABLE;
pub use statements::split_statements;
