//! Runtime values - the tagged union every accessor speaks
//!
//! `Value` is the runtime side of the codec boundary. The on-disk side is a
//! loosely typed SQLite value and only exists inside `codec` and `storage`.

use crate::var_type::VarType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle of a simulation entity.
///
/// Ids are unstable across save/reload; persist a stable reference instead
/// (see [`crate::world::World::reference_of`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// The "no entity" sentinel
    pub const INVALID: ObjectId = ObjectId(0x7F00_0000);
    /// Reserved handle naming the global durable scope
    pub const GLOBAL: ObjectId = ObjectId(0x7F00_0001);
    /// Reserved handle naming the ephemeral scope; same as passing no handle
    pub const MODULE: ObjectId = ObjectId(0x7F00_0002);

    pub fn is_valid(&self) -> bool {
        *self != ObjectId::INVALID
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::INVALID
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A position or direction in world space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A point inside an area, with a facing in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub area: ObjectId,
    pub position: Vector3,
    pub facing: f64,
}

impl Location {
    pub fn new(area: ObjectId, position: Vector3, facing: f64) -> Self {
        Self { area, position, facing }
    }

    /// A location in no area
    pub fn invalid() -> Self {
        Self {
            area: ObjectId::INVALID,
            position: Vector3::ZERO,
            facing: 0.0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.area.is_valid()
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::invalid()
    }
}

/// Full structural snapshot of an entity, as produced by the host.
///
/// Unlike an object reference, a snapshot can be instantiated again after the
/// original entity is gone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(pub serde_json::Value);

impl Snapshot {
    pub fn empty() -> Self {
        Snapshot(serde_json::Value::Null)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }
}

/// Where a deserialized entity is created
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpawnTarget {
    /// On the ground at a location
    At(Location),
    /// Inside a container or inventory
    Inside(ObjectId),
}

/// A typed variable value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    String(String),
    Object(ObjectId),
    Vector(Vector3),
    Location(Location),
    Json(serde_json::Value),
    Serialized(Snapshot),
}

impl Value {
    /// The registry type of this value
    pub fn var_type(&self) -> VarType {
        match self {
            Value::Int(_) => VarType::Int,
            Value::Float(_) => VarType::Float,
            Value::String(_) => VarType::String,
            Value::Object(_) => VarType::Object,
            Value::Vector(_) => VarType::Vector,
            Value::Location(_) => VarType::Location,
            Value::Json(_) => VarType::Json,
            Value::Serialized(_) => VarType::Serialized,
        }
    }

    /// The canonical zero value returned for absent records
    pub fn zero(var_type: VarType) -> Value {
        match var_type {
            VarType::Int => Value::Int(0),
            VarType::Float => Value::Float(0.0),
            VarType::String => Value::String(String::new()),
            VarType::Object => Value::Object(ObjectId::INVALID),
            VarType::Vector => Value::Vector(Vector3::ZERO),
            VarType::Location => Value::Location(Location::invalid()),
            VarType::Json => Value::Json(serde_json::Value::Null),
            VarType::Serialized => Value::Serialized(Snapshot::empty()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<Vector3> {
        match self {
            Value::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_location(&self) -> Option<Location> {
        match self {
            Value::Location(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_snapshot(self) -> Option<Snapshot> {
        match self {
            Value::Serialized(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Object(v) => write!(f, "object {}", v),
            Value::Vector(v) => write!(f, "{}", v),
            Value::Location(v) => write!(f, "{} @ {} facing {}", v.area, v.position, v.facing),
            Value::Json(v) => write!(f, "{}", v),
            Value::Serialized(v) => write!(f, "snapshot {}", v.0),
        }
    }
}
