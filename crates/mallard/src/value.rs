//! The dynamic value universe shims, mappings, and adapted instances
//! traffic in.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::mapping::Mapping;
use crate::reflect::Reflective;
use crate::synth::AdaptedInner;

/// Shared handle to a reflective host object.
pub type ObjectHandle = Arc<RwLock<dyn Reflective>>;

/// Shared handle to a string-keyed mapping.
pub type MapHandle = Arc<RwLock<dyn Mapping>>;

/// Shared handle to an adapted instance.
pub type AdaptedHandle = Arc<AdaptedInner>;

/// Hashable runtime-type key, used by the converter registry and for
/// exact-type matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKey {
    /// Boolean
    Bool,
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// String
    Str,
    /// String-keyed mapping
    Map,
    /// Reflective host object, keyed by its concrete type
    Object(TypeId),
    /// Adapted instance, keyed by its contract type
    Contract(TypeId),
}

/// A dynamically typed value.
///
/// Cloning is shallow: object, mapping, and adapted handles share the
/// underlying cell.
#[derive(Clone)]
pub enum Value {
    /// Absence of a value
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// Immutable string
    Str(Arc<str>),
    /// Reflective host object
    Object(ObjectHandle),
    /// String-keyed mapping
    Map(MapHandle),
    /// Contract-adapted instance
    Adapted(AdaptedHandle),
}

impl Value {
    /// Wrap a reflective host in a shared handle.
    pub fn object<T: Reflective>(host: T) -> Value {
        let handle: ObjectHandle = Arc::new(RwLock::new(host));
        Value::Object(handle)
    }

    /// Wrap a mapping in a shared handle.
    pub fn mapping<M: Mapping>(map: M) -> Value {
        let handle: MapHandle = Arc::new(RwLock::new(map));
        Value::Map(handle)
    }

    /// True for `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float payload, if any.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// String payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Host-object handle, if any.
    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            Value::Object(h) => Some(h),
            _ => None,
        }
    }

    /// Mapping handle, if any.
    pub fn as_mapping(&self) -> Option<&MapHandle> {
        match self {
            Value::Map(h) => Some(h),
            _ => None,
        }
    }

    /// Adapted-instance handle, if any.
    pub fn as_adapted(&self) -> Option<&AdaptedHandle> {
        match self {
            Value::Adapted(a) => Some(a),
            _ => None,
        }
    }

    /// Runtime type key, `None` for `Null`.
    pub fn type_key(&self) -> Option<TypeKey> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(TypeKey::Bool),
            Value::Int(_) => Some(TypeKey::Int),
            Value::Float(_) => Some(TypeKey::Float),
            Value::Str(_) => Some(TypeKey::Str),
            Value::Object(h) => Some(TypeKey::Object(h.read().as_any().type_id())),
            Value::Map(_) => Some(TypeKey::Map),
            Value::Adapted(a) => Some(TypeKey::Contract(a.contract_id())),
        }
    }

    /// Human-readable runtime type name for error messages.
    pub fn type_label(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::Object(h) => h.read().surface().name.to_string(),
            Value::Map(_) => "mapping".to_string(),
            Value::Adapted(a) => a.contract_name().to_string(),
        }
    }
}

impl PartialEq for Value {
    /// Primitives compare by value, strings by content, handles by
    /// pointer identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (Value::Adapted(a), Value::Adapted(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Object(h) => write!(f, "Object({})", h.read().surface().name),
            Value::Map(h) => write!(f, "Map(len={})", h.read().len()),
            Value::Adapted(a) => write!(f, "Adapted({})", a.contract_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ValueMap;

    #[test]
    fn test_primitive_accessors() {
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(42i64).as_int(), Some(42));
        assert_eq!(Value::from(1.5f64).as_float(), Some(1.5));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert!(Value::Null.is_null());
        assert_eq!(Value::from(42i64).as_str(), None);
    }

    #[test]
    fn test_primitive_equality_by_value() {
        assert_eq!(Value::from("dog"), Value::from("dog"));
        assert_eq!(Value::Int(3), Value::Int(3));
        assert_ne!(Value::Int(3), Value::Float(3.0));
    }

    #[test]
    fn test_handle_equality_by_identity() {
        let a = Value::mapping(ValueMap::case_sensitive());
        let b = a.clone();
        let c = Value::mapping(ValueMap::case_sensitive());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_type_keys() {
        assert_eq!(Value::Null.type_key(), None);
        assert_eq!(Value::from(1i64).type_key(), Some(TypeKey::Int));
        assert_eq!(
            Value::mapping(ValueMap::case_sensitive()).type_key(),
            Some(TypeKey::Map)
        );
    }

    #[test]
    fn test_type_labels() {
        assert_eq!(Value::Null.type_label(), "null");
        assert_eq!(Value::from(2.0f64).type_label(), "float");
        assert_eq!(
            Value::mapping(ValueMap::case_sensitive()).type_label(),
            "mapping"
        );
    }
}
