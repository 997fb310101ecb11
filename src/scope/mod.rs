//! Scopes - where a variable lives
//!
//! A handle is classified into one of three scope kinds, each backed by its
//! own table on its own connection. The registry owns those connections and
//! the per-instance "schema initialized" state.

pub mod registry;
pub mod resolver;

pub use registry::{Backing, ScopeRegistry};
pub use resolver::ScopeResolver;

use crate::storage::schema;
use crate::value::ObjectId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of storage scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// Process lifetime, one instance
    Ephemeral,
    /// One durable instance per principal
    Principal,
    /// One durable instance for the whole world
    Global,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Ephemeral => "ephemeral",
            ScopeKind::Principal => "principal",
            ScopeKind::Global => "global",
        }
    }

    /// Backing table name
    pub fn table(&self) -> &'static str {
        match self {
            ScopeKind::Ephemeral => schema::MODULE_TABLE,
            ScopeKind::Principal => schema::PLAYER_TABLE,
            ScopeKind::Global => schema::PERSISTENT_TABLE,
        }
    }
}

impl FromStr for ScopeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ephemeral" | "module" => Ok(ScopeKind::Ephemeral),
            "principal" | "player" | "pc" => Ok(ScopeKind::Principal),
            "global" | "persistent" | "campaign" => Ok(ScopeKind::Global),
            _ => Err(Error::Config(format!("Unknown scope kind: {}", s))),
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A concrete scope instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Ephemeral,
    Principal(ObjectId),
    Global,
}

impl Scope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::Ephemeral => ScopeKind::Ephemeral,
            Scope::Principal(_) => ScopeKind::Principal,
            Scope::Global => ScopeKind::Global,
        }
    }

    pub fn table(&self) -> &'static str {
        self.kind().table()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Principal(id) => write!(f, "principal {}", id),
            other => write!(f, "{}", other.kind()),
        }
    }
}
