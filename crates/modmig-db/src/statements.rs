//! Statement splitting for SQL scripts, using SQLite's own tokenizer.

use rusqlite::ffi;
use std::ffi::CString;

/// Split `sql` into the statements SQLite would run, each trimmed and keeping its `;`.
///
/// A `;` only ends a statement when SQLite considers the text so far complete, so semicolons
/// inside string literals, quoted identifiers, comments and trigger bodies stay in place.
/// Trailing text without a terminator is returned as a final statement.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut pending = String::new();

    for piece in sql.split_inclusive(';') {
        pending.push_str(piece);
        if !is_complete(&pending) {
            continue;
        }

        let statement = pending.trim();
        if statement != ";" {
            statements.push(statement.to_string());
        }
        pending.clear();
    }

    let rest = pending.trim();
    if !rest.is_empty() {
        statements.push(rest.to_string());
    }

    statements
}

fn is_complete(sql: &str) -> bool {
    let Ok(sql) = CString::new(sql) else {
        return false;
    };
    // SAFETY: `sql` is a NUL-terminated buffer that outlives the call, and sqlite3_complete
    // only reads it.
    unsafe { ffi::sqlite3_complete(sql.as_ptr()) != 0 }
}
