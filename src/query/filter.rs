//! Pattern filters and the predicate list they lower to
//!
//! A `PatternFilter` is a transient `(types, name, tag, time)` tuple. It is
//! lowered to a list of `Predicate`s which `WhereClause` joins with AND.
//! Nothing here is cached: every query is rebuilt from the filter.

use crate::var_type::{TypeMask, VarType};
use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};

/// Bulk selection over a scope
///
/// - `types`: `ALL` omits the predicate, `NONE` matches nothing
/// - `name`, `tag`: case-sensitive globs; empty means "any"
/// - `time`: negative selects records written before `|time|`, positive after
///   `time`, zero disables the predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternFilter {
    pub types: TypeMask,
    pub name: String,
    pub tag: String,
    pub time: i64,
}

impl Default for PatternFilter {
    fn default() -> Self {
        Self {
            types: TypeMask::ALL,
            name: String::new(),
            tag: String::new(),
            time: 0,
        }
    }
}

impl PatternFilter {
    /// A filter matching everything
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types(mut self, types: impl Into<TypeMask>) -> Self {
        self.types = types.into();
        self
    }

    pub fn name(mut self, pattern: impl Into<String>) -> Self {
        self.name = pattern.into();
        self
    }

    pub fn tag(mut self, pattern: impl Into<String>) -> Self {
        self.tag = pattern.into();
        self
    }

    /// Only records written strictly before `timestamp`
    pub fn before(mut self, timestamp: i64) -> Self {
        self.time = -timestamp.abs();
        self
    }

    /// Only records written strictly after `timestamp`
    pub fn after(mut self, timestamp: i64) -> Self {
        self.time = timestamp.abs();
        self
    }

    /// Raw signed time threshold
    pub fn time(mut self, time: i64) -> Self {
        self.time = time;
        self
    }

    /// True when no predicate applies, i.e. the filter selects the whole scope
    pub fn is_unfiltered(&self) -> bool {
        self.types.is_all() && self.name.is_empty() && self.tag.is_empty() && self.time == 0
    }

    /// Lower to predicates. Empty globs and a zero time are dropped.
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();

        if self.types.is_none() {
            predicates.push(Predicate::Never);
        } else if !self.types.is_all() {
            predicates.push(Predicate::TypeIn(self.types));
        }
        if !self.name.is_empty() {
            predicates.push(Predicate::NameGlob(self.name.clone()));
        }
        if !self.tag.is_empty() {
            predicates.push(Predicate::TagGlob(self.tag.clone()));
        }
        if self.time < 0 {
            predicates.push(Predicate::Before(self.time.abs()));
        } else if self.time > 0 {
            predicates.push(Predicate::After(self.time));
        }

        predicates
    }
}

/// A single condition of a WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    TypeIs(VarType),
    TypeIn(TypeMask),
    NameIs(String),
    TagIs(String),
    NameGlob(String),
    TagGlob(String),
    Before(i64),
    After(i64),
    /// Matches no row
    Never,
}

impl Predicate {
    fn render(&self, index: usize) -> (String, Option<SqlValue>) {
        match self {
            Predicate::TypeIs(t) => (format!("type = ?{}", index), Some(SqlValue::Integer(t.bit()))),
            Predicate::TypeIn(mask) => (format!("(type & ?{}) != 0", index), Some(SqlValue::Integer(mask.bits()))),
            Predicate::NameIs(name) => (format!("varname = ?{}", index), Some(SqlValue::Text(name.clone()))),
            Predicate::TagIs(tag) => (format!("tag = ?{}", index), Some(SqlValue::Text(tag.clone()))),
            Predicate::NameGlob(p) => (format!("varname GLOB ?{}", index), Some(SqlValue::Text(p.clone()))),
            Predicate::TagGlob(p) => (format!("tag GLOB ?{}", index), Some(SqlValue::Text(p.clone()))),
            Predicate::Before(t) => (format!("timestamp < ?{}", index), Some(SqlValue::Integer(*t))),
            Predicate::After(t) => (format!("timestamp > ?{}", index), Some(SqlValue::Integer(*t))),
            Predicate::Never => ("0".to_string(), None),
        }
    }
}

/// AND-joined predicate list with positional parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    predicates: Vec<Predicate>,
}

impl WhereClause {
    /// Exact `(type, varname, tag)` match
    pub fn exact(var_type: VarType, name: &str, tag: &str) -> Self {
        Self {
            predicates: vec![
                Predicate::TypeIs(var_type),
                Predicate::NameIs(name.to_string()),
                Predicate::TagIs(tag.to_string()),
            ],
        }
    }

    pub fn from_filter(filter: &PatternFilter) -> Self {
        Self {
            predicates: filter.predicates(),
        }
    }

    /// Render as ` WHERE ...` (or nothing) with parameters numbered from
    /// `first_index`
    pub fn render(&self, first_index: usize) -> (String, Vec<SqlValue>) {
        if self.predicates.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut params = Vec::new();
        let mut parts = Vec::with_capacity(self.predicates.len());
        for predicate in &self.predicates {
            let (sql, param) = predicate.render(first_index + params.len());
            parts.push(sql);
            if let Some(param) = param {
                params.push(param);
            }
        }

        (format!(" WHERE {}", parts.join(" AND ")), params)
    }
}
