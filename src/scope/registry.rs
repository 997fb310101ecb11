//! Scope registry - connections and schema state per scope instance
//!
//! Each instance is opened on first access and its schema ensured exactly
//! once; the `initialized` flag lives on the instance's slot, not in global
//! state. Releasing a principal drops both the connection and the flag.
//!
//! A principal slot remembers the save key it was opened for. Handles can be
//! reused by the host, so a slot whose key no longer matches is reopened.

use super::Scope;
use crate::config::ensure_db_dir;
use crate::storage::ScopeTable;
use crate::world::World;
use crate::Result;
use regex::Regex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static UNSAFE_FILE_CHARS: OnceLock<Regex> = OnceLock::new();

/// Where durable scopes keep their databases
#[derive(Debug, Clone, PartialEq)]
pub enum Backing {
    /// Everything in memory; durable scopes only last as long as the registry
    Memory,
    /// Global database file plus one file per principal in a directory
    Files { global: PathBuf, principals: PathBuf },
}

struct ScopeSlot {
    table: ScopeTable,
    initialized: bool,
    /// Save key of a principal slot
    key: Option<String>,
}

/// Owner of every scope instance's connection
pub struct ScopeRegistry {
    backing: Backing,
    slots: HashMap<Scope, ScopeSlot>,
}

impl ScopeRegistry {
    pub fn new(backing: Backing) -> Self {
        Self {
            backing,
            slots: HashMap::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Backing::Memory)
    }

    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    /// The scope's table with its schema ensured, opening it if needed.
    ///
    /// Returns `None` when a principal has no durable save to open.
    pub fn table(&mut self, scope: Scope, world: &dyn World) -> Result<Option<&mut ScopeTable>> {
        let key = match scope {
            Scope::Principal(id) => world.principal_key(id),
            _ => None,
        };
        if self.slots.get(&scope).is_some_and(|slot| slot.key != key) {
            tracing::debug!("Save key of {} changed, reopening", scope);
            self.slots.remove(&scope);
        }

        let slot = match self.slots.entry(scope) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let Some(table) = open_table(&self.backing, scope, key.as_deref())? else {
                    tracing::debug!("No durable save for {}", scope);
                    return Ok(None);
                };
                entry.insert(ScopeSlot {
                    table,
                    initialized: false,
                    key,
                })
            }
        };

        if !slot.initialized {
            slot.table.ensure_schema()?;
            slot.initialized = true;
            tracing::debug!("Initialized {} table for {}", slot.table.table(), scope);
        }

        Ok(Some(&mut slot.table))
    }

    pub fn is_initialized(&self, scope: Scope) -> bool {
        self.slots.get(&scope).map(|s| s.initialized).unwrap_or(false)
    }

    /// Close a scope instance's connection and forget its schema state
    pub fn release(&mut self, scope: Scope) -> bool {
        self.slots.remove(&scope).is_some()
    }

    /// Close every principal slot whose handle no longer names the save it
    /// was opened for, including principals that disconnected
    pub fn prune(&mut self, world: &dyn World) -> usize {
        let before = self.slots.len();
        self.slots.retain(|scope, slot| match scope {
            Scope::Principal(id) => world.principal_key(*id) == slot.key,
            _ => true,
        });
        let pruned = before - self.slots.len();
        if pruned > 0 {
            tracing::debug!("Released {} stale principal scopes", pruned);
        }
        pruned
    }

    /// Currently open scope instances
    pub fn open_scopes(&self) -> Vec<Scope> {
        self.slots.keys().copied().collect()
    }
}

fn open_table(backing: &Backing, scope: Scope, key: Option<&str>) -> Result<Option<ScopeTable>> {
    let table = scope.table();
    let opened = match (scope, backing) {
        (Scope::Ephemeral, _) | (Scope::Global, Backing::Memory) => ScopeTable::open_in_memory(table)?,
        (Scope::Principal(_), Backing::Memory) => {
            if key.is_none() {
                return Ok(None);
            }
            ScopeTable::open_in_memory(table)?
        }
        (Scope::Global, Backing::Files { global, .. }) => {
            ensure_db_dir(global)?;
            ScopeTable::open(global, table)?
        }
        (Scope::Principal(_), Backing::Files { principals, .. }) => {
            let Some(key) = key else {
                return Ok(None);
            };
            std::fs::create_dir_all(principals)?;
            ScopeTable::open(&principal_path(principals, key), table)?
        }
    };
    Ok(Some(opened))
}

/// Database file of a principal; the key is reduced to file-safe characters
pub fn principal_path(dir: &Path, key: &str) -> PathBuf {
    let re = UNSAFE_FILE_CHARS.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("valid regex"));
    let stem = re.replace_all(key, "_");
    dir.join(format!("{}.sqlite3", stem))
}
