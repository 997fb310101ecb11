//! World - the host simulation as seen by the variable store
//!
//! The store never owns entities. It asks the host to:
//! 1. Tell connected principals (players) apart from other handles
//! 2. Name a principal's durable save
//! 3. Turn entities and areas into stable references and back
//! 4. Snapshot an entity and instantiate a snapshot somewhere
//!
//! `MemoryWorld` is a self-contained implementation used by tests and the CLI.

use crate::value::{Location, ObjectId, Snapshot, SpawnTarget};
use std::collections::HashMap;

/// Host simulation interface
pub trait World {
    /// Whether the handle is a currently connected principal
    fn is_principal(&self, id: ObjectId) -> bool;

    /// Stable key naming the principal's durable save (file stem)
    fn principal_key(&self, id: ObjectId) -> Option<String>;

    /// Stable reference string for a live entity
    fn reference_of(&self, id: ObjectId) -> Option<String>;

    /// Re-resolve a stable reference; `ObjectId::INVALID` if the entity is gone
    fn resolve_reference(&self, reference: &str) -> ObjectId;

    /// Stable tag of an area
    fn area_tag(&self, area: ObjectId) -> Option<String>;

    /// Area carrying the tag; `ObjectId::INVALID` if none
    fn area_by_tag(&self, tag: &str) -> ObjectId;

    /// Full structural snapshot of an entity
    fn snapshot(&self, id: ObjectId) -> Option<Snapshot>;

    /// Create a fresh entity from a snapshot; `ObjectId::INVALID` on failure
    fn instantiate(&mut self, snapshot: &Snapshot, target: SpawnTarget) -> ObjectId;
}

/// What an in-memory entity is
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    /// A connected player; `key` names the durable save
    Principal { key: String },
    /// An area, addressed by tag
    Area { tag: String },
    /// Anything else, described by a blueprint document
    Thing { blueprint: serde_json::Value },
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: ObjectId,
    pub reference: String,
    pub kind: EntityKind,
    pub location: Option<Location>,
    pub container: Option<ObjectId>,
}

/// In-memory world with monotonically allocated ids and references
#[derive(Debug)]
pub struct MemoryWorld {
    entities: HashMap<ObjectId, Entity>,
    by_reference: HashMap<String, ObjectId>,
    next_id: u32,
}

impl Default for MemoryWorld {
    fn default() -> Self {
        Self {
            entities: HashMap::new(),
            by_reference: HashMap::new(),
            next_id: 1,
        }
    }
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, kind: EntityKind, location: Option<Location>, container: Option<ObjectId>) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        let reference = format!("ref-{:08x}", id.0);
        self.by_reference.insert(reference.clone(), id);
        self.entities.insert(
            id,
            Entity {
                id,
                reference,
                kind,
                location,
                container,
            },
        );
        id
    }

    /// Connect a principal whose durable save is named `key`
    pub fn connect_principal(&mut self, key: impl Into<String>) -> ObjectId {
        self.insert(EntityKind::Principal { key: key.into() }, None, None)
    }

    pub fn add_area(&mut self, tag: impl Into<String>) -> ObjectId {
        self.insert(EntityKind::Area { tag: tag.into() }, None, None)
    }

    /// Create a plain entity at a location
    pub fn spawn(&mut self, blueprint: serde_json::Value, location: Option<Location>) -> ObjectId {
        self.insert(EntityKind::Thing { blueprint }, location, None)
    }

    /// Remove an entity; its reference stops resolving
    pub fn destroy(&mut self, id: ObjectId) -> bool {
        match self.entities.remove(&id) {
            Some(entity) => {
                self.by_reference.remove(&entity.reference);
                true
            }
            None => false,
        }
    }

    pub fn entity(&self, id: ObjectId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl World for MemoryWorld {
    fn is_principal(&self, id: ObjectId) -> bool {
        matches!(
            self.entities.get(&id).map(|e| &e.kind),
            Some(EntityKind::Principal { .. })
        )
    }

    fn principal_key(&self, id: ObjectId) -> Option<String> {
        match self.entities.get(&id).map(|e| &e.kind) {
            Some(EntityKind::Principal { key }) => Some(key.clone()),
            _ => None,
        }
    }

    fn reference_of(&self, id: ObjectId) -> Option<String> {
        self.entities.get(&id).map(|e| e.reference.clone())
    }

    fn resolve_reference(&self, reference: &str) -> ObjectId {
        self.by_reference
            .get(reference)
            .copied()
            .unwrap_or(ObjectId::INVALID)
    }

    fn area_tag(&self, area: ObjectId) -> Option<String> {
        match self.entities.get(&area).map(|e| &e.kind) {
            Some(EntityKind::Area { tag }) => Some(tag.clone()),
            _ => None,
        }
    }

    fn area_by_tag(&self, tag: &str) -> ObjectId {
        self.entities
            .values()
            .filter(|e| matches!(&e.kind, EntityKind::Area { tag: t } if t == tag))
            .map(|e| e.id)
            .min()
            .unwrap_or(ObjectId::INVALID)
    }

    fn snapshot(&self, id: ObjectId) -> Option<Snapshot> {
        match self.entities.get(&id).map(|e| &e.kind) {
            Some(EntityKind::Thing { blueprint }) => Some(Snapshot(serde_json::json!({
                "blueprint": blueprint,
            }))),
            _ => None,
        }
    }

    fn instantiate(&mut self, snapshot: &Snapshot, target: SpawnTarget) -> ObjectId {
        let Some(blueprint) = snapshot.0.get("blueprint").cloned() else {
            return ObjectId::INVALID;
        };

        match target {
            SpawnTarget::At(location) => {
                if !self.entities.contains_key(&location.area) {
                    return ObjectId::INVALID;
                }
                self.insert(EntityKind::Thing { blueprint }, Some(location), None)
            }
            SpawnTarget::Inside(container) => {
                if !self.entities.contains_key(&container) {
                    return ObjectId::INVALID;
                }
                self.insert(EntityKind::Thing { blueprint }, None, Some(container))
            }
        }
    }
}
