//! Attribute store - the host's primitive per-entity typed locals
//!
//! Locals are keyed by `(handle, kind, name)`. There is no tag and no
//! timestamp; those only exist in the relational scopes.

use crate::value::{Location, ObjectId, Value};
use std::collections::BTreeMap;

/// Kinds the host attribute store can hold.
///
/// `Other` stands for host kinds the variable store has no mapping for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeKind {
    Int,
    Float,
    String,
    Object,
    Location,
    Json,
    Other(u32),
}

/// A value held by the attribute store
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Int(i64),
    Float(f64),
    String(String),
    Object(ObjectId),
    Location(Location),
    Json(serde_json::Value),
    /// Host specific payload the variable store cannot interpret
    Opaque { kind: u32, raw: String },
}

impl Attribute {
    pub fn kind(&self) -> AttributeKind {
        match self {
            Attribute::Int(_) => AttributeKind::Int,
            Attribute::Float(_) => AttributeKind::Float,
            Attribute::String(_) => AttributeKind::String,
            Attribute::Object(_) => AttributeKind::Object,
            Attribute::Location(_) => AttributeKind::Location,
            Attribute::Json(_) => AttributeKind::Json,
            Attribute::Opaque { kind, .. } => AttributeKind::Other(*kind),
        }
    }

    /// Convert to a variable value; `None` for opaque host kinds
    pub fn into_value(self) -> Option<Value> {
        match self {
            Attribute::Int(v) => Some(Value::Int(v)),
            Attribute::Float(v) => Some(Value::Float(v)),
            Attribute::String(v) => Some(Value::String(v)),
            Attribute::Object(v) => Some(Value::Object(v)),
            Attribute::Location(v) => Some(Value::Location(v)),
            Attribute::Json(v) => Some(Value::Json(v)),
            Attribute::Opaque { .. } => None,
        }
    }

    /// Convert from a variable value; `None` for types the host cannot store
    pub fn from_value(value: Value) -> Option<Attribute> {
        match value {
            Value::Int(v) => Some(Attribute::Int(v)),
            Value::Float(v) => Some(Attribute::Float(v)),
            Value::String(v) => Some(Attribute::String(v)),
            Value::Object(v) => Some(Attribute::Object(v)),
            Value::Location(v) => Some(Attribute::Location(v)),
            Value::Json(v) => Some(Attribute::Json(v)),
            Value::Vector(_) | Value::Serialized(_) => None,
        }
    }
}

/// One enumerated local
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeEntry {
    pub name: String,
    pub kind: AttributeKind,
}

/// Host attribute store interface
pub trait AttributeStore {
    fn get(&self, handle: ObjectId, kind: AttributeKind, name: &str) -> Option<Attribute>;

    fn set(&mut self, handle: ObjectId, name: &str, value: Attribute);

    fn delete(&mut self, handle: ObjectId, kind: AttributeKind, name: &str);

    /// Every local on the handle, in a stable order
    fn entries(&self, handle: ObjectId) -> Vec<AttributeEntry>;
}

/// Attribute store backed by ordered maps
#[derive(Debug, Default)]
pub struct MemoryAttributes {
    locals: BTreeMap<(ObjectId, AttributeKind, String), Attribute>,
}

impl MemoryAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of locals on a handle
    pub fn count(&self, handle: ObjectId) -> usize {
        self.locals.keys().filter(|(h, _, _)| *h == handle).count()
    }
}

impl AttributeStore for MemoryAttributes {
    fn get(&self, handle: ObjectId, kind: AttributeKind, name: &str) -> Option<Attribute> {
        self.locals.get(&(handle, kind, name.to_string())).cloned()
    }

    fn set(&mut self, handle: ObjectId, name: &str, value: Attribute) {
        self.locals.insert((handle, value.kind(), name.to_string()), value);
    }

    fn delete(&mut self, handle: ObjectId, kind: AttributeKind, name: &str) {
        self.locals.remove(&(handle, kind, name.to_string()));
    }

    fn entries(&self, handle: ObjectId) -> Vec<AttributeEntry> {
        self.locals
            .keys()
            .filter(|(h, _, _)| *h == handle)
            .map(|(_, kind, name)| AttributeEntry {
                name: name.clone(),
                kind: *kind,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_partitions_names() {
        let mut attrs = MemoryAttributes::new();
        let h = ObjectId(7);
        attrs.set(h, "gold", Attribute::Int(10));
        attrs.set(h, "gold", Attribute::String("ten".into()));

        assert_eq!(attrs.count(h), 2);
        assert_eq!(attrs.get(h, AttributeKind::Int, "gold"), Some(Attribute::Int(10)));

        attrs.delete(h, AttributeKind::Int, "gold");
        assert_eq!(attrs.get(h, AttributeKind::Int, "gold"), None);
        assert_eq!(attrs.entries(h).len(), 1);
    }

    #[test]
    fn test_value_conversion() {
        assert_eq!(Attribute::Int(3).into_value(), Some(Value::Int(3)));
        assert_eq!(Attribute::Opaque { kind: 12, raw: "x".into() }.into_value(), None);
        assert!(Attribute::from_value(Value::Vector(Default::default())).is_none());
    }
}
