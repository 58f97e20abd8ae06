//! Declared types for schema members and the modes used to resolve
//! member names.

use std::any::TypeId;
use std::fmt;

use crate::contract::{Contract, ContractSpec};
use crate::reflect::{Describe, TypeSurface};
use crate::value::{TypeKey, Value};

/// Member-name resolution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMode {
    /// Exact member names, arguments taken positionally as given
    Strict,
    /// Case-insensitive member names, best-effort argument reordering
    Fuzzy,
}

impl MatchMode {
    /// True for [`MatchMode::Fuzzy`].
    pub fn is_fuzzy(self) -> bool {
        matches!(self, MatchMode::Fuzzy)
    }
}

/// Identity of a contract type, linking back to its static declaration.
#[derive(Clone, Copy)]
pub struct ContractKey {
    id: TypeId,
    spec: fn() -> &'static ContractSpec,
}

impl ContractKey {
    /// Key for contract `C`.
    pub fn of<C: Contract>() -> Self {
        ContractKey {
            id: TypeId::of::<C>(),
            spec: C::contract_spec,
        }
    }

    /// The contract's `TypeId`.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The contract's static declaration.
    pub fn spec(&self) -> &'static ContractSpec {
        (self.spec)()
    }

    /// The contract's declared name.
    pub fn name(&self) -> &'static str {
        self.spec().name()
    }
}

impl PartialEq for ContractKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ContractKey {}

impl std::hash::Hash for ContractKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractKey({})", self.name())
    }
}

/// Declared type of a schema member.
///
/// Structured variants carry links back to their static declarations so
/// feasibility checks can walk type graphs without live instances.
#[derive(Clone, Copy)]
pub enum TypeExpr {
    /// Boolean primitive
    Bool,
    /// 64-bit integer primitive
    Int,
    /// 64-bit float primitive
    Float,
    /// String primitive
    Str,
    /// String-keyed mapping
    Map,
    /// No value; method return only
    Unit,
    /// Any runtime type
    Any,
    /// A concrete reflective host type
    Object {
        /// Concrete `TypeId` of the host type
        id: TypeId,
        /// Link to the host type's registered surface
        surface: fn() -> &'static TypeSurface,
    },
    /// A contract type
    Contract(ContractKey),
}

impl TypeExpr {
    /// Declared type naming the host type `T`.
    pub fn object<T: Describe>() -> TypeExpr {
        TypeExpr::Object {
            id: TypeId::of::<T>(),
            surface: T::type_surface,
        }
    }

    /// Declared type naming the contract `C`.
    pub fn contract<C: Contract>() -> TypeExpr {
        TypeExpr::Contract(ContractKey::of::<C>())
    }

    /// The zero value reads degrade to: false, 0, 0.0, the empty string,
    /// and `Null` for everything without primitive structure.
    pub fn zero_value(&self) -> Value {
        match self {
            TypeExpr::Bool => Value::Bool(false),
            TypeExpr::Int => Value::Int(0),
            TypeExpr::Float => Value::Float(0.0),
            TypeExpr::Str => Value::from(""),
            _ => Value::Null,
        }
    }

    /// True for the four primitive kinds, which carry no adaptable
    /// structure.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeExpr::Bool | TypeExpr::Int | TypeExpr::Float | TypeExpr::Str
        )
    }

    /// Exact runtime satisfaction: `value` already inhabits this type.
    ///
    /// `Null` satisfies every non-primitive type and no primitive one.
    /// Host objects match by concrete type, adapted instances by their
    /// contract.
    pub fn satisfied_by(&self, value: &Value) -> bool {
        match self {
            TypeExpr::Any => true,
            _ if value.is_null() => !self.is_primitive(),
            TypeExpr::Bool => matches!(value, Value::Bool(_)),
            TypeExpr::Int => matches!(value, Value::Int(_)),
            TypeExpr::Float => matches!(value, Value::Float(_)),
            TypeExpr::Str => matches!(value, Value::Str(_)),
            TypeExpr::Map => matches!(value, Value::Map(_)),
            TypeExpr::Unit => false,
            TypeExpr::Object { id, .. } => value
                .as_object()
                .map_or(false, |h| h.read().as_any().type_id() == *id),
            TypeExpr::Contract(key) => value
                .as_adapted()
                .map_or(false, |a| a.contract_id() == key.id()),
        }
    }

    /// Converter-registry key for this declared type, `None` for `Any`
    /// and `Unit`.
    pub fn runtime_key(&self) -> Option<TypeKey> {
        match self {
            TypeExpr::Bool => Some(TypeKey::Bool),
            TypeExpr::Int => Some(TypeKey::Int),
            TypeExpr::Float => Some(TypeKey::Float),
            TypeExpr::Str => Some(TypeKey::Str),
            TypeExpr::Map => Some(TypeKey::Map),
            TypeExpr::Object { id, .. } => Some(TypeKey::Object(*id)),
            TypeExpr::Contract(key) => Some(TypeKey::Contract(key.id())),
            TypeExpr::Unit | TypeExpr::Any => None,
        }
    }

    /// Display name for messages.
    pub fn label(&self) -> &'static str {
        match self {
            TypeExpr::Bool => "bool",
            TypeExpr::Int => "int",
            TypeExpr::Float => "float",
            TypeExpr::Str => "string",
            TypeExpr::Map => "mapping",
            TypeExpr::Unit => "unit",
            TypeExpr::Any => "any",
            TypeExpr::Object { surface, .. } => surface().name,
            TypeExpr::Contract(key) => key.name(),
        }
    }
}

impl PartialEq for TypeExpr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeExpr::Bool, TypeExpr::Bool)
            | (TypeExpr::Int, TypeExpr::Int)
            | (TypeExpr::Float, TypeExpr::Float)
            | (TypeExpr::Str, TypeExpr::Str)
            | (TypeExpr::Map, TypeExpr::Map)
            | (TypeExpr::Unit, TypeExpr::Unit)
            | (TypeExpr::Any, TypeExpr::Any) => true,
            (TypeExpr::Object { id: a, .. }, TypeExpr::Object { id: b, .. }) => a == b,
            (TypeExpr::Contract(a), TypeExpr::Contract(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TypeExpr {}

impl fmt::Debug for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
