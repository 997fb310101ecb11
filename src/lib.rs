//! # varstore - Typed Variable Persistence
//!
//! Typed, tagged, timestamped variables kept in SQLite across three scopes.
//!
//! varstore provides:
//! - Ephemeral, per-principal and global scopes, each its own table
//! - Accessors for int, float, string, object, vector, location, json and
//!   serialized entity values, with zero values for anything never set
//! - Glob/type/time pattern queries and deletes
//! - Atomic increment and append
//! - Bulk copy and move between the host attribute store and scopes

pub mod var_type;
pub mod value;
pub mod world;
pub mod attributes;
pub mod clock;
pub mod codec;
pub mod query;
pub mod storage;
pub mod scope;
pub mod store;
pub mod migrate;
pub mod output;
pub mod config;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use var_type::{TypeMask, VarType};
pub use value::{Location, ObjectId, Snapshot, SpawnTarget, Value, Vector3};
pub use query::PatternFilter;
pub use scope::{Backing, Scope, ScopeKind};
pub use store::{ScopeStats, VarRecord, VarStore};
pub use migrate::{MigrationReport, Transfer};

/// Result type alias for varstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for varstore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Cannot decode {var_type} value: {reason}")]
    Codec { var_type: VarType, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Config error: {0}")]
    Config(String),
}
