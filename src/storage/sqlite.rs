//! SQLite storage implementation
//!
//! A `ScopeTable` is one scope table on one connection. It executes the
//! statements built by `QueryBuilder` and speaks raw SQLite values; decoding
//! into runtime values happens a layer up.

use super::schema;
use crate::query::{Accumulate, PatternFilter, QueryBuilder, Statement};
use crate::var_type::VarType;
use crate::Result;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::path::Path;

/// A stored record before decoding
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub var_type: VarType,
    pub name: String,
    pub tag: String,
    pub value: SqlValue,
    pub timestamp: i64,
}

/// A point lookup result
#[derive(Debug, Clone, PartialEq)]
pub struct StoredValue {
    pub value: SqlValue,
    pub timestamp: i64,
}

/// One scope table bound to a connection
pub struct ScopeTable {
    conn: Connection,
    query: QueryBuilder,
}

impl ScopeTable {
    /// Open a database file (creates if doesn't exist). The schema is not
    /// created until `ensure_schema` runs.
    pub fn open(path: &Path, table: &'static str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            query: QueryBuilder::new(table),
        })
    }

    /// Open an in-memory database
    pub fn open_in_memory(table: &'static str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            query: QueryBuilder::new(table),
        })
    }

    pub fn table(&self) -> &'static str {
        self.query.table()
    }

    /// Create the table and its indexes if missing
    pub fn ensure_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements(self.query.table()) {
            self.conn.execute(&stmt, [])?;
        }
        Ok(())
    }

    fn execute(&self, stmt: &Statement) -> Result<usize> {
        Ok(self.conn.execute(&stmt.sql, params_from_iter(stmt.params.iter()))?)
    }

    fn query_value(&self, stmt: &Statement) -> Result<Option<SqlValue>> {
        Ok(self
            .conn
            .query_row(&stmt.sql, params_from_iter(stmt.params.iter()), |row| row.get(0))
            .optional()?)
    }

    // ========== Point Operations ==========

    pub fn select_point(&self, var_type: VarType, name: &str, tag: &str) -> Result<Option<StoredValue>> {
        let stmt = self.query.select_point(var_type, name, tag);
        Ok(self
            .conn
            .query_row(&stmt.sql, params_from_iter(stmt.params.iter()), |row| {
                Ok(StoredValue {
                    value: row.get(0)?,
                    timestamp: row.get(1)?,
                })
            })
            .optional()?)
    }

    pub fn upsert(&self, var_type: VarType, name: &str, tag: &str, value: SqlValue, timestamp: i64) -> Result<()> {
        self.execute(&self.query.upsert(var_type, name, tag, value, timestamp))?;
        Ok(())
    }

    /// Reassign a record's tag; returns rows changed (0 or 1)
    pub fn retag(&self, var_type: VarType, name: &str, tag: &str, new_tag: &str, timestamp: i64) -> Result<usize> {
        self.execute(&self.query.retag(var_type, name, tag, new_tag, timestamp))
    }

    /// Delete the triple, returning the removed value if there was one
    pub fn delete_point(&self, var_type: VarType, name: &str, tag: &str) -> Result<Option<SqlValue>> {
        self.query_value(&self.query.delete_point(var_type, name, tag))
    }

    /// Fold `delta` into the record and return the stored result
    pub fn accumulate(
        &self,
        var_type: VarType,
        name: &str,
        tag: &str,
        delta: SqlValue,
        timestamp: i64,
        op: Accumulate,
    ) -> Result<SqlValue> {
        let stmt = self.query.accumulate(var_type, name, tag, delta, timestamp, op);
        Ok(self
            .conn
            .query_row(&stmt.sql, params_from_iter(stmt.params.iter()), |row| row.get(0))?)
    }

    // ========== Pattern Operations ==========

    pub fn delete_pattern(&self, filter: &PatternFilter) -> Result<usize> {
        self.execute(&self.query.delete_pattern(filter))
    }

    pub fn select_pattern(&self, filter: &PatternFilter) -> Result<Vec<RawRecord>> {
        let stmt = self.query.select_pattern(filter);
        let mut prepared = self.conn.prepare(&stmt.sql)?;
        let rows = prepared
            .query_map(params_from_iter(stmt.params.iter()), read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(into_record).collect()
    }

    /// Whether an entry held outside the table (an attribute local) passes the
    /// filter's type mask and name glob, using SQLite's own `GLOB`
    pub fn matches_entry(&self, filter: &PatternFilter, var_type: VarType, name: &str) -> Result<bool> {
        let stmt = QueryBuilder::entry_match(filter, var_type, name);
        Ok(self
            .conn
            .query_row(&stmt.sql, params_from_iter(stmt.params.iter()), |row| row.get(0))?)
    }

    pub fn count_pattern(&self, filter: &PatternFilter) -> Result<usize> {
        let stmt = self.query.count_pattern(filter);
        let count: i64 = self
            .conn
            .query_row(&stmt.sql, params_from_iter(stmt.params.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Record count per stored type, for statistics
    pub fn type_counts(&self) -> Result<Vec<(VarType, usize)>> {
        let mut counts = Vec::new();
        for var_type in VarType::all() {
            let n = self.count_pattern(&PatternFilter::new().types(*var_type))?;
            if n > 0 {
                counts.push((*var_type, n));
            }
        }
        Ok(counts)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    // ========== Bulk Operations ==========

    /// Upsert every record inside one transaction. Nothing is written if any
    /// record fails.
    pub fn upsert_batch(&mut self, records: &[RawRecord]) -> Result<usize> {
        let query = self.query;
        let tx = self.conn.transaction()?;
        for record in records {
            let stmt = query.upsert(
                record.var_type,
                &record.name,
                &record.tag,
                record.value.clone(),
                record.timestamp,
            );
            tx.execute(&stmt.sql, params_from_iter(stmt.params.iter()))?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Delete the exact triples of `records` inside one transaction
    pub fn delete_batch(&mut self, records: &[RawRecord]) -> Result<usize> {
        let query = self.query;
        let tx = self.conn.transaction()?;
        let mut removed = 0;
        for record in records {
            let stmt = query.delete_point(record.var_type, &record.name, &record.tag);
            let gone: Option<SqlValue> = tx
                .query_row(&stmt.sql, params_from_iter(stmt.params.iter()), |row| row.get(0))
                .optional()?;
            if gone.is_some() {
                removed += 1;
            }
        }
        tx.commit()?;
        Ok(removed)
    }
}

type Row = (i64, String, String, SqlValue, i64);

fn read_row(row: &rusqlite::Row) -> rusqlite::Result<Row> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

/// Unknown type discriminators surface as `Error::InvalidType`
fn into_record((bits, name, tag, value, timestamp): Row) -> Result<RawRecord> {
    Ok(RawRecord {
        var_type: VarType::from_bits(bits)?,
        name,
        tag,
        value,
        timestamp,
    })
}
