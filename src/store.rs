//! Variable store - the typed accessor surface
//!
//! Every accessor takes an optional handle which is classified into a scope
//! (see [`ScopeResolver`]). An unrecognized handle never fails: reads return
//! the type's zero value and writes do nothing.
//!
//! Only two things surface as errors: the backing store failing, and a stored
//! value not matching its declared type.

use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::config::VarStoreConfig;
use crate::query::{Accumulate, PatternFilter};
use crate::scope::{Backing, Scope, ScopeRegistry, ScopeResolver};
use crate::storage::ScopeTable;
use crate::value::{Location, ObjectId, Snapshot, SpawnTarget, Value, Vector3};
use crate::var_type::VarType;
use crate::world::World;
use crate::Result;
use serde::Serialize;
use std::path::Path;

/// A decoded variable record
#[derive(Debug, Clone, PartialEq)]
pub struct VarRecord {
    pub var_type: VarType,
    pub name: String,
    pub tag: String,
    pub value: Value,
    pub timestamp: i64,
}

/// Row counts for one scope instance
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScopeStats {
    pub total: usize,
    pub by_type: Vec<(VarType, usize)>,
}

impl std::fmt::Display for ScopeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Variables: {}", self.total)?;
        for (var_type, count) in &self.by_type {
            writeln!(f, "  {}: {}", var_type, count)?;
        }
        Ok(())
    }
}

/// Typed variable store over the three scopes
pub struct VarStore<W: World> {
    pub(crate) world: W,
    pub(crate) registry: ScopeRegistry,
    pub(crate) clock: Box<dyn Clock>,
}

impl<W: World> VarStore<W> {
    pub fn new(world: W, backing: Backing) -> Self {
        Self {
            world,
            registry: ScopeRegistry::new(backing),
            clock: Box::new(SystemClock),
        }
    }

    /// Every scope in memory (for testing)
    pub fn in_memory(world: W) -> Self {
        Self::new(world, Backing::Memory)
    }

    /// Durable scopes under the configured data directory, relative to `base`
    pub fn open(world: W, config: &VarStoreConfig, base: &Path) -> Self {
        Self::new(world, config.backing(base))
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    /// The scope a handle resolves to, without touching storage
    pub fn scope_of(&self, handle: Option<ObjectId>) -> Option<Scope> {
        ScopeResolver::classify(&self.world, handle)
    }

    /// Close a principal's durable scope, e.g. when the player leaves
    pub fn release_principal(&mut self, id: ObjectId) -> bool {
        self.registry.release(Scope::Principal(id))
    }

    /// Close the durable scopes of principals that disconnected or whose
    /// handle now names a different save
    pub fn release_disconnected(&mut self) -> usize {
        self.registry.prune(&self.world)
    }

    /// Resolve a handle to its table, ensuring the schema
    pub(crate) fn table_for<'a>(
        registry: &'a mut ScopeRegistry,
        world: &W,
        handle: Option<ObjectId>,
    ) -> Result<Option<&'a mut ScopeTable>> {
        let Some(scope) = ScopeResolver::classify(world, handle) else {
            tracing::debug!("Ignoring unrecognized handle {:?}", handle);
            return Ok(None);
        };
        registry.table(scope, world)
    }

    // ========== Generic Operations ==========

    /// Write a value under `(type of value, name, tag)`
    pub fn set_value(&mut self, handle: Option<ObjectId>, name: &str, value: &Value, tag: &str) -> Result<()> {
        let Some(table) = Self::table_for(&mut self.registry, &self.world, handle)? else {
            return Ok(());
        };
        let encoded = codec::encode(value, &self.world)?;
        table.upsert(value.var_type(), name, tag, encoded, self.clock.now())
    }

    /// Read a full record, `None` if absent or the handle is unrecognized
    pub fn get_record(
        &mut self,
        handle: Option<ObjectId>,
        var_type: VarType,
        name: &str,
        tag: &str,
    ) -> Result<Option<VarRecord>> {
        let Some(table) = Self::table_for(&mut self.registry, &self.world, handle)? else {
            return Ok(None);
        };
        let Some(stored) = table.select_point(var_type, name, tag)? else {
            return Ok(None);
        };
        Ok(Some(VarRecord {
            var_type,
            name: name.to_string(),
            tag: tag.to_string(),
            value: codec::decode(var_type, stored.value, &self.world)?,
            timestamp: stored.timestamp,
        }))
    }

    /// Read a value; `None` if absent or the handle is unrecognized
    pub fn get_value(
        &mut self,
        handle: Option<ObjectId>,
        var_type: VarType,
        name: &str,
        tag: &str,
    ) -> Result<Option<Value>> {
        Ok(self.get_record(handle, var_type, name, tag)?.map(|r| r.value))
    }

    fn get_or_zero(&mut self, handle: Option<ObjectId>, var_type: VarType, name: &str, tag: &str) -> Result<Value> {
        Ok(self
            .get_value(handle, var_type, name, tag)?
            .unwrap_or_else(|| Value::zero(var_type)))
    }

    /// Delete a record, returning the removed value or the type's zero value
    pub fn delete_value(&mut self, handle: Option<ObjectId>, var_type: VarType, name: &str, tag: &str) -> Result<Value> {
        let Some(table) = Self::table_for(&mut self.registry, &self.world, handle)? else {
            return Ok(Value::zero(var_type));
        };
        let removed = table.delete_point(var_type, name, tag)?;
        codec::decode_or_zero(var_type, removed, &self.world)
    }

    fn accumulate(
        &mut self,
        handle: Option<ObjectId>,
        var_type: VarType,
        name: &str,
        delta: Value,
        tag: &str,
        op: Accumulate,
    ) -> Result<Value> {
        let Some(table) = Self::table_for(&mut self.registry, &self.world, handle)? else {
            return Ok(Value::zero(var_type));
        };
        let encoded = codec::encode(&delta, &self.world)?;
        let stored = table.accumulate(var_type, name, tag, encoded, self.clock.now(), op)?;
        codec::decode(var_type, stored, &self.world)
    }

    // ========== Typed Accessors ==========

    pub fn set_int(&mut self, handle: Option<ObjectId>, name: &str, value: i64, tag: &str) -> Result<()> {
        self.set_value(handle, name, &Value::Int(value), tag)
    }

    pub fn get_int(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<i64> {
        Ok(self.get_or_zero(handle, VarType::Int, name, tag)?.as_int().unwrap_or(0))
    }

    pub fn delete_int(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<i64> {
        Ok(self.delete_value(handle, VarType::Int, name, tag)?.as_int().unwrap_or(0))
    }

    pub fn set_float(&mut self, handle: Option<ObjectId>, name: &str, value: f64, tag: &str) -> Result<()> {
        self.set_value(handle, name, &Value::Float(value), tag)
    }

    pub fn get_float(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<f64> {
        Ok(self.get_or_zero(handle, VarType::Float, name, tag)?.as_float().unwrap_or(0.0))
    }

    pub fn delete_float(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<f64> {
        Ok(self.delete_value(handle, VarType::Float, name, tag)?.as_float().unwrap_or(0.0))
    }

    pub fn set_string(&mut self, handle: Option<ObjectId>, name: &str, value: &str, tag: &str) -> Result<()> {
        self.set_value(handle, name, &Value::String(value.to_string()), tag)
    }

    pub fn get_string(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<String> {
        match self.get_or_zero(handle, VarType::String, name, tag)? {
            Value::String(s) => Ok(s),
            _ => Ok(String::new()),
        }
    }

    pub fn delete_string(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<String> {
        match self.delete_value(handle, VarType::String, name, tag)? {
            Value::String(s) => Ok(s),
            _ => Ok(String::new()),
        }
    }

    pub fn set_object(&mut self, handle: Option<ObjectId>, name: &str, value: ObjectId, tag: &str) -> Result<()> {
        self.set_value(handle, name, &Value::Object(value), tag)
    }

    /// Re-resolves the stored reference; `ObjectId::INVALID` if the entity is gone
    pub fn get_object(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<ObjectId> {
        Ok(self
            .get_or_zero(handle, VarType::Object, name, tag)?
            .as_object()
            .unwrap_or(ObjectId::INVALID))
    }

    pub fn delete_object(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<ObjectId> {
        Ok(self
            .delete_value(handle, VarType::Object, name, tag)?
            .as_object()
            .unwrap_or(ObjectId::INVALID))
    }

    pub fn set_vector(&mut self, handle: Option<ObjectId>, name: &str, value: Vector3, tag: &str) -> Result<()> {
        self.set_value(handle, name, &Value::Vector(value), tag)
    }

    pub fn get_vector(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<Vector3> {
        Ok(self
            .get_or_zero(handle, VarType::Vector, name, tag)?
            .as_vector()
            .unwrap_or(Vector3::ZERO))
    }

    pub fn delete_vector(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<Vector3> {
        Ok(self
            .delete_value(handle, VarType::Vector, name, tag)?
            .as_vector()
            .unwrap_or(Vector3::ZERO))
    }

    pub fn set_location(&mut self, handle: Option<ObjectId>, name: &str, value: Location, tag: &str) -> Result<()> {
        self.set_value(handle, name, &Value::Location(value), tag)
    }

    pub fn get_location(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<Location> {
        Ok(self
            .get_or_zero(handle, VarType::Location, name, tag)?
            .as_location()
            .unwrap_or_else(Location::invalid))
    }

    pub fn delete_location(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<Location> {
        Ok(self
            .delete_value(handle, VarType::Location, name, tag)?
            .as_location()
            .unwrap_or_else(Location::invalid))
    }

    pub fn set_json(&mut self, handle: Option<ObjectId>, name: &str, value: &serde_json::Value, tag: &str) -> Result<()> {
        self.set_value(handle, name, &Value::Json(value.clone()), tag)
    }

    pub fn get_json(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<serde_json::Value> {
        match self.get_or_zero(handle, VarType::Json, name, tag)? {
            Value::Json(doc) => Ok(doc),
            _ => Ok(serde_json::Value::Null),
        }
    }

    pub fn delete_json(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<serde_json::Value> {
        match self.delete_value(handle, VarType::Json, name, tag)? {
            Value::Json(doc) => Ok(doc),
            _ => Ok(serde_json::Value::Null),
        }
    }

    /// Store a full snapshot of `entity`. Entities the host cannot snapshot
    /// are not stored.
    pub fn set_serialized(&mut self, handle: Option<ObjectId>, name: &str, entity: ObjectId, tag: &str) -> Result<()> {
        let Some(snapshot) = self.world.snapshot(entity) else {
            tracing::debug!("Entity {} cannot be serialized; {} not stored", entity, name);
            return Ok(());
        };
        self.set_value(handle, name, &Value::Serialized(snapshot), tag)
    }

    /// The stored snapshot without instantiating it
    pub fn get_snapshot(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<Snapshot> {
        Ok(self
            .get_or_zero(handle, VarType::Serialized, name, tag)?
            .into_snapshot()
            .unwrap_or_default())
    }

    /// Instantiate the stored snapshot at `target`, returning the new entity.
    ///
    /// This is the only accessor that creates simulation state.
    pub fn get_serialized(
        &mut self,
        handle: Option<ObjectId>,
        name: &str,
        tag: &str,
        target: SpawnTarget,
    ) -> Result<ObjectId> {
        let snapshot = self.get_snapshot(handle, name, tag)?;
        if snapshot.is_empty() {
            return Ok(ObjectId::INVALID);
        }
        Ok(self.world.instantiate(&snapshot, target))
    }

    pub fn delete_serialized(&mut self, handle: Option<ObjectId>, name: &str, tag: &str) -> Result<Snapshot> {
        Ok(self
            .delete_value(handle, VarType::Serialized, name, tag)?
            .into_snapshot()
            .unwrap_or_default())
    }

    // ========== Increment / Append ==========
    //
    // An absent record is seeded with the delta, so "never set" behaves like
    // zero or the empty string. The two are not distinguished.

    pub fn increment_int(&mut self, handle: Option<ObjectId>, name: &str, delta: i64, tag: &str) -> Result<i64> {
        let v = self.accumulate(handle, VarType::Int, name, Value::Int(delta), tag, Accumulate::AddInt)?;
        Ok(v.as_int().unwrap_or(0))
    }

    pub fn decrement_int(&mut self, handle: Option<ObjectId>, name: &str, delta: i64, tag: &str) -> Result<i64> {
        self.increment_int(handle, name, delta.saturating_neg(), tag)
    }

    pub fn increment_float(&mut self, handle: Option<ObjectId>, name: &str, delta: f64, tag: &str) -> Result<f64> {
        let v = self.accumulate(handle, VarType::Float, name, Value::Float(delta), tag, Accumulate::AddFloat)?;
        Ok(v.as_float().unwrap_or(0.0))
    }

    pub fn decrement_float(&mut self, handle: Option<ObjectId>, name: &str, delta: f64, tag: &str) -> Result<f64> {
        self.increment_float(handle, name, -delta, tag)
    }

    pub fn append_string(&mut self, handle: Option<ObjectId>, name: &str, suffix: &str, tag: &str) -> Result<String> {
        let v = self.accumulate(
            handle,
            VarType::String,
            name,
            Value::String(suffix.to_string()),
            tag,
            Accumulate::Concat,
        )?;
        match v {
            Value::String(s) => Ok(s),
            _ => Ok(String::new()),
        }
    }

    // ========== Tags ==========

    /// Move the record at `(var_type, name, tag)` under `new_tag`.
    /// Returns the number of records moved (0 or 1).
    pub fn set_tag(
        &mut self,
        handle: Option<ObjectId>,
        var_type: VarType,
        name: &str,
        tag: &str,
        new_tag: &str,
    ) -> Result<usize> {
        let Some(table) = Self::table_for(&mut self.registry, &self.world, handle)? else {
            return Ok(0);
        };
        table.retag(var_type, name, tag, new_tag, self.clock.now())
    }

    // ========== Scope-wide Operations ==========

    /// Delete every variable in the handle's scope
    pub fn delete_all(&mut self, handle: Option<ObjectId>) -> Result<usize> {
        let Some(table) = Self::table_for(&mut self.registry, &self.world, handle)? else {
            return Ok(0);
        };
        table.delete_pattern(&PatternFilter::new())
    }

    /// Delete every variable matching the filter.
    ///
    /// An unfiltered pattern deletes the whole scope. This is allowed, but
    /// logged loudly.
    pub fn delete_by_pattern(&mut self, handle: Option<ObjectId>, filter: &PatternFilter) -> Result<usize> {
        let Some(table) = Self::table_for(&mut self.registry, &self.world, handle)? else {
            return Ok(0);
        };
        warn_on_hazard("Pattern delete", table.table(), filter, true);
        let removed = table.delete_pattern(filter)?;
        tracing::debug!("Deleted {} variables from {}", removed, table.table());
        Ok(removed)
    }

    /// Every record matching the filter, oldest first
    pub fn get_by_pattern(&mut self, handle: Option<ObjectId>, filter: &PatternFilter) -> Result<Vec<VarRecord>> {
        let Some(table) = Self::table_for(&mut self.registry, &self.world, handle)? else {
            return Ok(Vec::new());
        };
        if filter.types.is_none() {
            tracing::warn!("Type mask NONE selects nothing from {}", table.table());
        }
        let raw = table.select_pattern(filter)?;
        raw.into_iter()
            .map(|r| {
                Ok(VarRecord {
                    value: codec::decode(r.var_type, r.value, &self.world)?,
                    var_type: r.var_type,
                    name: r.name,
                    tag: r.tag,
                    timestamp: r.timestamp,
                })
            })
            .collect()
    }

    pub fn count_by_pattern(&mut self, handle: Option<ObjectId>, filter: &PatternFilter) -> Result<usize> {
        let Some(table) = Self::table_for(&mut self.registry, &self.world, handle)? else {
            return Ok(0);
        };
        table.count_pattern(filter)
    }

    /// Row counts for the handle's scope
    pub fn stats(&mut self, handle: Option<ObjectId>) -> Result<ScopeStats> {
        let Some(table) = Self::table_for(&mut self.registry, &self.world, handle)? else {
            return Ok(ScopeStats::default());
        };
        let by_type = table.type_counts()?;
        Ok(ScopeStats {
            total: by_type.iter().map(|(_, n)| n).sum(),
            by_type,
        })
    }
}

/// Loud diagnostics for bulk filters that select everything or nothing.
/// `removes` is set when the matched records are deleted from `source`.
pub(crate) fn warn_on_hazard(operation: &str, source: &str, filter: &PatternFilter, removes: bool) {
    if filter.is_unfiltered() {
        if removes {
            tracing::warn!(
                "{} on {} has no predicates: every variable in the scope will be removed",
                operation,
                source
            );
        }
    } else if filter.types.is_none() {
        tracing::warn!("{} on {} uses type mask NONE and matches nothing", operation, source);
    }
}
