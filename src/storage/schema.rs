//! Database schema definitions
//!
//! Every scope uses the same table shape under its own name. The value column
//! carries no type so SQLite keeps integers, reals and text as written.

/// Table of the ephemeral scope
pub const MODULE_TABLE: &str = "module_variables";

/// Table of a principal's durable scope
pub const PLAYER_TABLE: &str = "player_variables";

/// Table of the global durable scope
pub const PERSISTENT_TABLE: &str = "persistent_variables";

/// SQL to create a scope table
pub fn create_table(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    type INTEGER NOT NULL,
    varname TEXT NOT NULL,
    tag TEXT NOT NULL DEFAULT '',
    value BLOB NOT NULL,
    timestamp INTEGER NOT NULL,
    PRIMARY KEY (type, varname, tag)
)
"#
    )
}

/// SQL to create a scope table's indexes
pub fn create_indexes(table: &str) -> Vec<String> {
    vec![
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_varname ON {table}(varname)"),
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_timestamp ON {table}(timestamp)"),
    ]
}

/// All schema creation statements for a table
pub fn all_schema_statements(table: &str) -> Vec<String> {
    let mut stmts = vec![create_table(table)];
    stmts.extend(create_indexes(table));
    stmts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        for _ in 0..2 {
            for stmt in all_schema_statements(PLAYER_TABLE) {
                conn.execute(&stmt, []).unwrap();
            }
        }
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [PLAYER_TABLE],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_value_column_keeps_text_digits() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute(&create_table(MODULE_TABLE), []).unwrap();
        conn.execute(
            "INSERT INTO module_variables (type, varname, tag, value, timestamp) VALUES (4, 'code', '', '0042', 1)",
            [],
        )
        .unwrap();
        let kind: String = conn
            .query_row("SELECT typeof(value) FROM module_variables", [], |row| row.get(0))
            .unwrap();
        assert_eq!(kind, "text");
    }
}
