//! Query Builder - statement shapes over a scope table
//!
//! Filters lower to predicate lists which are AND-joined; statement shapes
//! wrap the clause. See `builder` for the seven shapes.

pub mod builder;
pub mod filter;

pub use builder::{Accumulate, QueryBuilder, Statement, RECORD_COLUMNS};
pub use filter::{PatternFilter, Predicate, WhereClause};
