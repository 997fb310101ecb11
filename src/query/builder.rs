//! Statement shapes for one scope table
//!
//! Seven shapes cover every accessor:
//! 1. point select
//! 2. point upsert
//! 3. tag reassignment
//! 4. point delete (returning the removed value)
//! 5. pattern delete
//! 6. pattern select
//! 7. increment / append
//!
//! Builders only produce SQL text and parameters; nothing here touches a
//! connection, so every shape is testable on its own.

use super::filter::{PatternFilter, WhereClause};
use crate::var_type::VarType;
use rusqlite::types::Value as SqlValue;

/// Columns returned by pattern selects, in order
pub const RECORD_COLUMNS: &str = "type, varname, tag, value, timestamp";

/// A parameterized statement ready to execute
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    fn new(sql: String, params: Vec<SqlValue>) -> Self {
        Self { sql, params }
    }
}

/// How an accumulating upsert combines the stored value with the delta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulate {
    /// Integer `value + delta`, saturating at the `i64` bounds. SQLite would
    /// otherwise promote an overflowing sum to REAL.
    AddInt,
    /// Float `value + delta`, clamped to the finite `f64` range
    AddFloat,
    /// `value || delta`
    Concat,
}

impl Accumulate {
    fn expression(&self) -> &'static str {
        match self {
            Accumulate::AddInt => {
                "CASE \
                 WHEN excluded.value > 0 AND value > 9223372036854775807 - excluded.value \
                 THEN 9223372036854775807 \
                 WHEN excluded.value < 0 AND value < (-9223372036854775807 - 1) - excluded.value \
                 THEN (-9223372036854775807 - 1) \
                 ELSE value + excluded.value END"
            }
            Accumulate::AddFloat => {
                "max(min(value + excluded.value, 1.7976931348623157e308), -1.7976931348623157e308)"
            }
            Accumulate::Concat => "value || excluded.value",
        }
    }
}

/// Builds statements against a single table
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    table: &'static str,
}

impl QueryBuilder {
    pub fn new(table: &'static str) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Exact triple lookup, at most one row of `(value, timestamp)`
    pub fn select_point(&self, var_type: VarType, name: &str, tag: &str) -> Statement {
        let (clause, params) = WhereClause::exact(var_type, name, tag).render(1);
        Statement::new(format!("SELECT value, timestamp FROM {}{}", self.table, clause), params)
    }

    /// Insert or overwrite the record for the triple
    pub fn upsert(&self, var_type: VarType, name: &str, tag: &str, value: SqlValue, timestamp: i64) -> Statement {
        let sql = format!(
            "INSERT INTO {} (type, varname, tag, value, timestamp) VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(type, varname, tag) DO UPDATE SET \
             value = excluded.value, tag = excluded.tag, timestamp = excluded.timestamp",
            self.table
        );
        Statement::new(sql, record_params(var_type, name, tag, value, timestamp))
    }

    /// Move the record at `(type, name, tag)` to `new_tag`.
    ///
    /// A record already living under `new_tag` is replaced so the composite
    /// key stays unique.
    pub fn retag(&self, var_type: VarType, name: &str, tag: &str, new_tag: &str, timestamp: i64) -> Statement {
        let (clause, mut where_params) = WhereClause::exact(var_type, name, tag).render(3);
        let mut params = vec![SqlValue::Text(new_tag.to_string()), SqlValue::Integer(timestamp)];
        params.append(&mut where_params);
        Statement::new(
            format!("UPDATE OR REPLACE {} SET tag = ?1, timestamp = ?2{}", self.table, clause),
            params,
        )
    }

    /// Delete the exact triple, returning the removed value
    pub fn delete_point(&self, var_type: VarType, name: &str, tag: &str) -> Statement {
        let (clause, params) = WhereClause::exact(var_type, name, tag).render(1);
        Statement::new(format!("DELETE FROM {}{} RETURNING value", self.table, clause), params)
    }

    /// Delete everything the filter matches. An unfiltered pattern deletes
    /// the whole table.
    pub fn delete_pattern(&self, filter: &PatternFilter) -> Statement {
        let (clause, params) = WhereClause::from_filter(filter).render(1);
        Statement::new(format!("DELETE FROM {}{}", self.table, clause), params)
    }

    /// Full records the filter matches, oldest first
    pub fn select_pattern(&self, filter: &PatternFilter) -> Statement {
        let (clause, params) = WhereClause::from_filter(filter).render(1);
        Statement::new(
            format!(
                "SELECT {} FROM {}{} ORDER BY timestamp, type, varname, tag",
                RECORD_COLUMNS, self.table, clause
            ),
            params,
        )
    }

    pub fn count_pattern(&self, filter: &PatternFilter) -> Statement {
        let (clause, params) = WhereClause::from_filter(filter).render(1);
        Statement::new(format!("SELECT COUNT(*) FROM {}{}", self.table, clause), params)
    }

    /// Upsert that folds `delta` into the stored value and returns the result.
    /// An absent record is seeded with `delta` itself.
    pub fn accumulate(
        &self,
        var_type: VarType,
        name: &str,
        tag: &str,
        delta: SqlValue,
        timestamp: i64,
        op: Accumulate,
    ) -> Statement {
        let sql = format!(
            "INSERT INTO {} (type, varname, tag, value, timestamp) VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(type, varname, tag) DO UPDATE SET \
             value = {}, timestamp = excluded.timestamp RETURNING value",
            self.table,
            op.expression()
        );
        Statement::new(sql, record_params(var_type, name, tag, delta, timestamp))
    }

    /// Test one in-memory entry against the filter's type mask and name glob,
    /// with the same SQL `GLOB` the table queries use. Tag and time do not
    /// apply to entries.
    pub fn entry_match(filter: &PatternFilter, var_type: VarType, name: &str) -> Statement {
        let scoped = PatternFilter::new().types(filter.types).name(filter.name.clone());
        let (clause, mut where_params) = WhereClause::from_filter(&scoped).render(3);
        let mut params = vec![SqlValue::Integer(var_type.bit()), SqlValue::Text(name.to_string())];
        params.append(&mut where_params);
        Statement::new(
            format!(
                "SELECT EXISTS (SELECT 1 FROM (SELECT ?1 AS type, ?2 AS varname){})",
                clause
            ),
            params,
        )
    }
}

fn record_params(var_type: VarType, name: &str, tag: &str, value: SqlValue, timestamp: i64) -> Vec<SqlValue> {
    vec![
        SqlValue::Integer(var_type.bit()),
        SqlValue::Text(name.to_string()),
        SqlValue::Text(tag.to_string()),
        value,
        SqlValue::Integer(timestamp),
    ]
}
