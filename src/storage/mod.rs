//! Storage Layer - SQLite-backed scope tables
//!
//! One table per scope kind, each on its own connection:
//! - module_variables(type, varname, tag, value, timestamp): ephemeral, in memory
//! - player_variables(...): one database file per principal
//! - persistent_variables(...): the global database file

pub mod schema;
pub mod sqlite;

pub use sqlite::{RawRecord, ScopeTable, StoredValue};
