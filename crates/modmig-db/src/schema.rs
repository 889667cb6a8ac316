//! Ledger table definition.
//!
//! One row per applied migration, scoped by module slug. The composite key keeps migration ids
//! unique within a module.

pub const DEFAULT_LEDGER_TABLE: &str = "module_migrations";

/// DDL for a ledger table named `table`. Callers must pass a name accepted by
/// [`is_valid_table_name`].
pub fn ledger_schema(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            module TEXT NOT NULL,
            migration TEXT NOT NULL,
            batch INTEGER NOT NULL CHECK (batch > 0),
            PRIMARY KEY (module, migration)
        );

        CREATE INDEX IF NOT EXISTS idx_{table}_batch
            ON {table}(module, batch);"
    )
}

pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::{is_valid_table_name, ledger_schema};

    #[test]
    fn table_names_are_plain_identifiers() {
        assert!(is_valid_table_name("module_migrations"));
        assert!(is_valid_table_name("_ledger2"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("2ledger"));
        assert!(!is_valid_table_name("ledger; DROP TABLE x"));
        assert!(!is_valid_table_name("main.ledger"));
    }

    #[test]
    fn schema_names_index_after_table() {
        let sql = ledger_schema("ledger");
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS ledger"));
        assert!(sql.contains("idx_ledger_batch"));
    }
}
