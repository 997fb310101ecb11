//! Value Codec - runtime values to on-disk encodings and back
//!
//! | type       | stored as                                            |
//! |------------|------------------------------------------------------|
//! | int        | INTEGER                                              |
//! | float      | REAL                                                 |
//! | string     | TEXT                                                 |
//! | object     | TEXT stable reference                                |
//! | vector     | TEXT `{"x":..,"y":..,"z":..}`                        |
//! | location   | TEXT `{"area":"<tag>","position":{..},"facing":..}`  |
//! | json       | TEXT document                                        |
//! | serialized | TEXT entity snapshot                                 |
//!
//! Live handles never reach the disk: objects go through stable references
//! and locations through area tags, both re-resolved on decode.

use crate::value::{Location, ObjectId, Snapshot, Value, Vector3};
use crate::var_type::VarType;
use crate::world::World;
use crate::{Error, Result};
use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};

/// On-disk shape of a location
#[derive(Debug, Serialize, Deserialize)]
struct StoredLocation {
    area: String,
    position: Vector3,
    facing: f64,
}

/// Encode a runtime value for the `value` column
///
/// Non-finite floats, including vector and location components, are
/// rejected with `Error::Codec`.
pub fn encode(value: &Value, world: &dyn World) -> Result<SqlValue> {
    ensure_finite(value)?;
    let encoded = match value {
        Value::Int(v) => SqlValue::Integer(*v),
        Value::Float(v) => SqlValue::Real(*v),
        Value::String(v) => SqlValue::Text(v.clone()),
        Value::Object(id) => SqlValue::Text(world.reference_of(*id).unwrap_or_default()),
        Value::Vector(v) => SqlValue::Text(serde_json::to_string(v)?),
        Value::Location(loc) => {
            let stored = StoredLocation {
                area: world.area_tag(loc.area).unwrap_or_default(),
                position: loc.position,
                facing: loc.facing,
            };
            SqlValue::Text(serde_json::to_string(&stored)?)
        }
        Value::Json(doc) => SqlValue::Text(serde_json::to_string(doc)?),
        Value::Serialized(snapshot) => SqlValue::Text(serde_json::to_string(snapshot)?),
    };
    Ok(encoded)
}

fn ensure_finite(value: &Value) -> Result<()> {
    let finite = match value {
        Value::Float(v) => v.is_finite(),
        Value::Vector(v) => v.x.is_finite() && v.y.is_finite() && v.z.is_finite(),
        Value::Location(loc) => {
            let p = loc.position;
            p.x.is_finite() && p.y.is_finite() && p.z.is_finite() && loc.facing.is_finite()
        }
        _ => true,
    };
    if finite {
        Ok(())
    } else {
        Err(Error::Codec {
            var_type: value.var_type(),
            reason: "non-finite float".to_string(),
        })
    }
}

/// Decode a stored value declared as `var_type`.
///
/// A stored value that does not have the declared shape is an error; it is
/// never masked as a zero value.
pub fn decode(var_type: VarType, stored: SqlValue, world: &dyn World) -> Result<Value> {
    let value = match (var_type, stored) {
        (VarType::Int, SqlValue::Integer(v)) => Value::Int(v),
        (VarType::Float, SqlValue::Real(v)) => Value::Float(v),
        (VarType::Float, SqlValue::Integer(v)) => Value::Float(v as f64),
        (VarType::String, SqlValue::Text(v)) => Value::String(v),
        (VarType::Object, SqlValue::Text(reference)) => {
            if reference.is_empty() {
                Value::Object(ObjectId::INVALID)
            } else {
                Value::Object(world.resolve_reference(&reference))
            }
        }
        (VarType::Vector, SqlValue::Text(text)) => Value::Vector(parse_document(var_type, &text)?),
        (VarType::Location, SqlValue::Text(text)) => {
            let stored: StoredLocation = parse_document(var_type, &text)?;
            let area = if stored.area.is_empty() {
                ObjectId::INVALID
            } else {
                world.area_by_tag(&stored.area)
            };
            if area.is_valid() {
                Value::Location(Location::new(area, stored.position, stored.facing))
            } else {
                Value::Location(Location::invalid())
            }
        }
        (VarType::Json, SqlValue::Text(text)) => Value::Json(parse_document(var_type, &text)?),
        (VarType::Serialized, SqlValue::Text(text)) => {
            Value::Serialized(Snapshot(parse_document(var_type, &text)?))
        }
        (var_type, other) => {
            return Err(Error::Codec {
                var_type,
                reason: format!("unexpected stored {}", storage_class(&other)),
            })
        }
    };
    Ok(value)
}

/// Decode an optional row, falling back to the type's zero value
pub fn decode_or_zero(var_type: VarType, stored: Option<SqlValue>, world: &dyn World) -> Result<Value> {
    match stored {
        Some(stored) => decode(var_type, stored, world),
        None => Ok(Value::zero(var_type)),
    }
}

fn parse_document<T: serde::de::DeserializeOwned>(var_type: VarType, text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| Error::Codec {
        var_type,
        reason: e.to_string(),
    })
}

/// SQLite storage class name of a value
pub fn storage_class(value: &SqlValue) -> &'static str {
    match value {
        SqlValue::Null => "null",
        SqlValue::Integer(_) => "integer",
        SqlValue::Real(_) => "real",
        SqlValue::Text(_) => "text",
        SqlValue::Blob(_) => "blob",
    }
}

/// Render a stored value without a world to resolve it against
pub fn render_raw(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "null".to_string(),
        SqlValue::Integer(v) => v.to_string(),
        SqlValue::Real(v) => v.to_string(),
        SqlValue::Text(v) => v.clone(),
        SqlValue::Blob(v) => format!("<{} bytes>", v.len()),
    }
}

/// Raw stored value as a JSON value, for machine-readable output
pub fn raw_to_json(var_type: VarType, value: &SqlValue) -> serde_json::Value {
    match (var_type, value) {
        (_, SqlValue::Integer(v)) => serde_json::json!(v),
        (_, SqlValue::Real(v)) => serde_json::json!(v),
        (VarType::Vector | VarType::Location | VarType::Json | VarType::Serialized, SqlValue::Text(text)) => {
            serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.clone()))
        }
        (_, SqlValue::Text(text)) => serde_json::Value::String(text.clone()),
        (_, other) => serde_json::Value::String(render_raw(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::MemoryWorld;

    fn round_trip(value: &Value, world: &MemoryWorld) -> Value {
        let stored = encode(value, world).unwrap();
        decode(value.var_type(), stored, world).unwrap()
    }

    #[test]
    fn test_scalars_pass_through() {
        let world = MemoryWorld::new();
        assert_eq!(encode(&Value::Int(42), &world).unwrap(), SqlValue::Integer(42));
        assert_eq!(encode(&Value::Float(1.5), &world).unwrap(), SqlValue::Real(1.5));
        assert_eq!(round_trip(&Value::String("hi".into()), &world), Value::String("hi".into()));
    }

    #[test]
    fn test_vector_and_location_round_trip() {
        let mut world = MemoryWorld::new();
        let area = world.add_area("market");

        let vector = Value::Vector(Vector3::new(1.0, -2.5, 3.25));
        assert_eq!(round_trip(&vector, &world), vector);

        let location = Value::Location(Location::new(area, Vector3::new(10.0, 20.0, 0.5), 270.0));
        assert_eq!(round_trip(&location, &world), location);

        match encode(&location, &world).unwrap() {
            SqlValue::Text(text) => assert!(text.contains("\"area\":\"market\"")),
            other => panic!("unexpected encoding {:?}", other),
        }
    }

    #[test]
    fn test_location_in_missing_area_is_invalid() {
        let mut world = MemoryWorld::new();
        let area = world.add_area("ruins");
        let stored = encode(&Value::Location(Location::new(area, Vector3::new(1.0, 1.0, 1.0), 0.0)), &world).unwrap();

        world.destroy(area);
        let decoded = decode(VarType::Location, stored, &world).unwrap();
        assert_eq!(decoded, Value::Location(Location::invalid()));
    }

    #[test]
    fn test_object_reference_to_destroyed_entity() {
        let mut world = MemoryWorld::new();
        let npc = world.spawn(serde_json::json!({"resref": "guard"}), None);

        let value = Value::Object(npc);
        assert_eq!(round_trip(&value, &world), value);

        let stored = encode(&value, &world).unwrap();
        world.destroy(npc);
        assert_eq!(decode(VarType::Object, stored, &world).unwrap(), Value::Object(ObjectId::INVALID));
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let world = MemoryWorld::new();
        let err = decode(VarType::Vector, SqlValue::Text("{\"x\":1}".into()), &world).unwrap_err();
        assert!(matches!(err, Error::Codec { var_type: VarType::Vector, .. }));

        assert!(decode(VarType::Int, SqlValue::Text("7".into()), &world).is_err());
        assert!(decode(VarType::Json, SqlValue::Text("{not json".into()), &world).is_err());
    }

    #[test]
    fn test_absent_decodes_to_zero() {
        let world = MemoryWorld::new();
        for t in VarType::all() {
            assert_eq!(decode_or_zero(*t, None, &world).unwrap(), Value::zero(*t));
        }
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        let world = MemoryWorld::new();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = encode(&Value::Float(bad), &world).unwrap_err();
            assert!(matches!(err, Error::Codec { var_type: VarType::Float, .. }));
        }

        let vector = Value::Vector(Vector3::new(0.0, f64::NAN, 0.0));
        assert!(matches!(
            encode(&vector, &world).unwrap_err(),
            Error::Codec { var_type: VarType::Vector, .. }
        ));
        assert!(encode(&Value::Float(-0.0), &world).is_ok());
    }
}
