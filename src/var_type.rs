//! Type Registry - the closed set of value kinds a variable can hold
//!
//! Every kind is a distinct power-of-two bit so callers can build masks:
//! - `Int`, `Float`, `String`: native scalars
//! - `Object`: a stable reference to a simulation entity
//! - `Vector`, `Location`: positional values
//! - `Json`: a structured document
//! - `Serialized`: a full snapshot of an entity
//!
//! The bit is the `type` column of every scope table.

use crate::attributes::AttributeKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::str::FromStr;

/// A single variable type. Never a sentinel; see [`TypeMask`] for sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    Int,
    Float,
    String,
    Object,
    Vector,
    Location,
    Json,
    Serialized,
}

impl VarType {
    /// The bit stored in the `type` column
    pub const fn bit(self) -> i64 {
        match self {
            VarType::Int => 1,
            VarType::Float => 2,
            VarType::String => 4,
            VarType::Object => 8,
            VarType::Vector => 16,
            VarType::Location => 32,
            VarType::Json => 64,
            VarType::Serialized => 128,
        }
    }

    /// Parse a stored discriminator. Exactly one known bit must be set.
    pub fn from_bits(bits: i64) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.bit() == bits)
            .ok_or_else(|| Error::InvalidType(format!("unknown type discriminator: {}", bits)))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VarType::Int => "int",
            VarType::Float => "float",
            VarType::String => "string",
            VarType::Object => "object",
            VarType::Vector => "vector",
            VarType::Location => "location",
            VarType::Json => "json",
            VarType::Serialized => "serialized",
        }
    }

    /// Get all variable types, in bit order
    pub fn all() -> &'static [VarType] {
        &[
            VarType::Int,
            VarType::Float,
            VarType::String,
            VarType::Object,
            VarType::Vector,
            VarType::Location,
            VarType::Json,
            VarType::Serialized,
        ]
    }

    /// Map a host attribute kind onto the registry.
    ///
    /// Kinds with no registry counterpart yield `None` and are skipped by
    /// bulk export from the attribute store.
    pub fn from_attribute_kind(kind: AttributeKind) -> Option<VarType> {
        match kind {
            AttributeKind::Int => Some(VarType::Int),
            AttributeKind::Float => Some(VarType::Float),
            AttributeKind::String => Some(VarType::String),
            AttributeKind::Object => Some(VarType::Object),
            AttributeKind::Location => Some(VarType::Location),
            AttributeKind::Json => Some(VarType::Json),
            AttributeKind::Other(_) => None,
        }
    }

    /// The attribute kind able to hold this type, if the host store has one
    pub fn attribute_kind(&self) -> Option<AttributeKind> {
        match self {
            VarType::Int => Some(AttributeKind::Int),
            VarType::Float => Some(AttributeKind::Float),
            VarType::String => Some(AttributeKind::String),
            VarType::Object => Some(AttributeKind::Object),
            VarType::Location => Some(AttributeKind::Location),
            VarType::Json => Some(AttributeKind::Json),
            VarType::Vector | VarType::Serialized => None,
        }
    }
}

impl FromStr for VarType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "int" | "integer" | "i" => Ok(VarType::Int),
            "float" | "f" | "real" => Ok(VarType::Float),
            "string" | "str" | "s" | "text" => Ok(VarType::String),
            "object" | "entity" | "obj" | "o" => Ok(VarType::Object),
            "vector" | "vec" | "v" => Ok(VarType::Vector),
            "location" | "loc" | "l" => Ok(VarType::Location),
            "json" | "document" | "doc" | "j" => Ok(VarType::Json),
            "serialized" | "snapshot" => Ok(VarType::Serialized),
            _ => Err(Error::InvalidType(format!("Unknown variable type: {}", s))),
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A set of variable types, composable with `|`, `&` and `!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeMask(i64);

impl TypeMask {
    /// Matches nothing
    pub const NONE: TypeMask = TypeMask(0);
    /// Matches every type; the filter is omitted entirely
    pub const ALL: TypeMask = TypeMask(255);

    pub const fn bits(self) -> i64 {
        self.0
    }

    /// Build a mask from raw bits, dropping anything outside `ALL`
    pub const fn from_bits_truncate(bits: i64) -> Self {
        TypeMask(bits & Self::ALL.0)
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn is_all(self) -> bool {
        self.0 == Self::ALL.0
    }

    pub fn contains(self, var_type: VarType) -> bool {
        self.0 & var_type.bit() != 0
    }

    /// Types in this mask, in bit order
    pub fn types(self) -> impl Iterator<Item = VarType> {
        VarType::all().iter().copied().filter(move |t| self.contains(*t))
    }

    /// Parse a comma separated list such as `int,float`; `all` and `none` are accepted
    pub fn parse_list(list: &str) -> Result<Self> {
        let mut mask = TypeMask::NONE;
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            mask = match item.to_lowercase().as_str() {
                "all" | "*" => mask | TypeMask::ALL,
                "none" => mask,
                _ => mask | TypeMask::from(item.parse::<VarType>()?),
            };
        }
        Ok(mask)
    }
}

impl Default for TypeMask {
    fn default() -> Self {
        TypeMask::ALL
    }
}

impl From<VarType> for TypeMask {
    fn from(var_type: VarType) -> Self {
        TypeMask(var_type.bit())
    }
}

impl BitOr for TypeMask {
    type Output = TypeMask;

    fn bitor(self, rhs: TypeMask) -> TypeMask {
        TypeMask(self.0 | rhs.0)
    }
}

impl BitOr<VarType> for TypeMask {
    type Output = TypeMask;

    fn bitor(self, rhs: VarType) -> TypeMask {
        TypeMask(self.0 | rhs.bit())
    }
}

impl BitOr for VarType {
    type Output = TypeMask;

    fn bitor(self, rhs: VarType) -> TypeMask {
        TypeMask(self.bit() | rhs.bit())
    }
}

impl BitAnd for TypeMask {
    type Output = TypeMask;

    fn bitand(self, rhs: TypeMask) -> TypeMask {
        TypeMask(self.0 & rhs.0)
    }
}

impl Not for TypeMask {
    type Output = TypeMask;

    fn not(self) -> TypeMask {
        TypeMask(!self.0 & TypeMask::ALL.0)
    }
}

impl fmt::Display for TypeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return write!(f, "all");
        }
        if self.is_none() {
            return write!(f, "none");
        }
        let names: Vec<&str> = self.types().map(|t| t.as_str()).collect();
        write!(f, "{}", names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_are_distinct_powers_of_two() {
        let mut seen = 0i64;
        for t in VarType::all() {
            assert_eq!(t.bit().count_ones(), 1);
            assert_eq!(seen & t.bit(), 0);
            seen |= t.bit();
        }
        assert_eq!(seen, TypeMask::ALL.bits());
    }

    #[test]
    fn test_from_bits() {
        assert_eq!(VarType::from_bits(4).unwrap(), VarType::String);
        assert_eq!(VarType::from_bits(128).unwrap(), VarType::Serialized);
        assert!(VarType::from_bits(0).is_err());
        assert!(VarType::from_bits(3).is_err());
        assert!(VarType::from_bits(256).is_err());
    }

    #[test]
    fn test_mask_algebra() {
        let numeric = VarType::Int | VarType::Float;
        assert!(numeric.contains(VarType::Int));
        assert!(numeric.contains(VarType::Float));
        assert!(!numeric.contains(VarType::String));

        let rest = !numeric;
        assert!(!rest.contains(VarType::Int));
        assert!(rest.contains(VarType::Json));
        assert_eq!(numeric | rest, TypeMask::ALL);
        assert_eq!(numeric & rest, TypeMask::NONE);
        assert_eq!(!TypeMask::ALL, TypeMask::NONE);
    }

    #[test]
    fn test_parse_list() {
        let mask = TypeMask::parse_list("int, float").unwrap();
        assert_eq!(mask, VarType::Int | VarType::Float);
        assert!(TypeMask::parse_list("all").unwrap().is_all());
        assert!(TypeMask::parse_list("").unwrap().is_none());
        assert!(TypeMask::parse_list("int,bogus").is_err());
        assert_eq!(mask.to_string(), "int,float");
    }

    #[test]
    fn test_attribute_kind_mapping() {
        assert_eq!(VarType::from_attribute_kind(AttributeKind::Json), Some(VarType::Json));
        assert_eq!(VarType::from_attribute_kind(AttributeKind::Other(9)), None);
        assert_eq!(VarType::Vector.attribute_kind(), None);
        assert_eq!(VarType::Location.attribute_kind(), Some(AttributeKind::Location));
    }
}
