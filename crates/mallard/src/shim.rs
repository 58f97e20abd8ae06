//! The delegation layer between an adapted instance and its source.
//!
//! Every property read, property write, and method call on an adapted
//! instance lands here. A shim owns the source value, the flattened
//! contract descriptor it was adapted under, a memo of nested adapted
//! instances (so repeated reads of a structured member return the same
//! instance), and a negative cache of members that turned out not to be
//! shimmable.
//!
//! Reads degrade: a missing, mistyped, or unconvertible raw value comes
//! back as the member type's zero value (or `Null` for structured
//! members) instead of an error. Writes and calls fail hard.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::compat;
use crate::contract::{ContractDescriptor, MemberDecl, MemberKind};
use crate::engine::Engine;
use crate::error::{AdaptError, AdaptResult};
use crate::mapping::lookup_key;
use crate::reflect::MethodSpec;
use crate::types::{MatchMode, TypeExpr};
use crate::value::{MapHandle, ObjectHandle, Value};

/// Shim binding one source value to one contract descriptor.
pub(crate) struct Shim {
    engine: Engine,
    source: Value,
    descriptor: Arc<ContractDescriptor>,
    mode: MatchMode,
    // nested adapted instances, keyed by contract member name
    memo: RwLock<FxHashMap<String, Value>>,
    // members that failed nested adaptation once; they read as Null
    unshimmable: RwLock<FxHashSet<String>>,
}

impl Shim {
    pub(crate) fn new(engine: Engine, source: Value, descriptor: Arc<ContractDescriptor>) -> Self {
        Shim {
            engine,
            source,
            mode: descriptor.mode(),
            descriptor,
            memo: RwLock::new(FxHashMap::default()),
            unshimmable: RwLock::new(FxHashSet::default()),
        }
    }

    pub(crate) fn descriptor(&self) -> &Arc<ContractDescriptor> {
        &self.descriptor
    }

    pub(crate) fn mode(&self) -> MatchMode {
        self.mode
    }

    pub(crate) fn source(&self) -> &Value {
        &self.source
    }

    /// Read a contract property.
    pub(crate) fn get(&self, name: &str) -> AdaptResult<Value> {
        let member = self.property_member(name)?;
        if !member.readable {
            return Err(AdaptError::WriteOnlyProperty {
                source: self.descriptor.name().to_string(),
                property: member.name.to_string(),
            });
        }
        self.get_member(member)
    }

    /// Write a contract property.
    pub(crate) fn set(&self, name: &str, value: Value) -> AdaptResult<()> {
        let member = self.property_member(name)?;
        if !member.writable {
            return Err(AdaptError::ReadOnlyProperty {
                source: self.descriptor.name().to_string(),
                property: member.name.to_string(),
            });
        }
        let value = if value.is_null() {
            member.value_type.zero_value()
        } else {
            value
        };
        self.set_member(member, value, false)
    }

    /// Call a contract method on the source.
    pub(crate) fn call_through(&self, name: &str, args: Vec<Value>) -> AdaptResult<Value> {
        let member = self.method_member(name)?;
        let handle = match &self.source {
            Value::Object(handle) => handle,
            // mappings and adapted instances have no callable members
            _ => {
                return Err(AdaptError::MethodNotFound {
                    source: self.source.type_label(),
                    method: member.name.to_string(),
                })
            }
        };
        let (method, qualified) = {
            let host = handle.read();
            let members = self.engine.metadata().members_for(&*host);
            let surface_name = members.surface().name;
            match members.resolve_method(member.name, self.mode) {
                Some(found) => (found, format!("{}.{}", surface_name, found.name)),
                None => {
                    return Err(AdaptError::MethodNotFound {
                        source: surface_name.to_string(),
                        method: member.name.to_string(),
                    })
                }
            }
        };
        let args = match self.mode {
            MatchMode::Strict => args,
            MatchMode::Fuzzy => arrange_arguments(method, &qualified, args)?,
        };
        let mut host = handle.write();
        (method.invoke)(&mut *host, args)
    }

    /// Read through a resolved member, bypassing the contract's
    /// direction flags. Backing-store access enters here.
    pub(crate) fn get_member(&self, member: &MemberDecl) -> AdaptResult<Value> {
        if let Value::Adapted(inner) = &self.source {
            return inner.backing_get(member.name, self.mode);
        }
        if let Some(hit) = self.memo.read().get(member.name) {
            return Ok(hit.clone());
        }
        let raw = self.read_source(member)?;
        self.shape_read(member, raw)
    }

    /// Write through a resolved member, bypassing the contract's
    /// direction flags. `create_slot` lets backing writes add mapping
    /// keys that were never present.
    pub(crate) fn set_member(
        &self,
        member: &MemberDecl,
        value: Value,
        create_slot: bool,
    ) -> AdaptResult<()> {
        match &self.source {
            Value::Object(handle) => self.write_host(handle, member, value)?,
            Value::Map(handle) => self.write_mapping(handle, member, value, create_slot)?,
            Value::Adapted(inner) => inner.backing_set(member.name, self.mode, value)?,
            _ => {
                return Err(AdaptError::PropertyNotFound {
                    source: self.source.type_label(),
                    property: member.name.to_string(),
                })
            }
        }
        // a written member re-resolves on its next read
        self.memo.write().remove(member.name);
        self.unshimmable.write().remove(member.name);
        Ok(())
    }

    fn property_member(&self, name: &str) -> AdaptResult<&MemberDecl> {
        match self.descriptor.member(name) {
            Some(member) if member.kind == MemberKind::Property => Ok(member),
            _ => Err(AdaptError::PropertyNotFound {
                source: self.source.type_label(),
                property: name.to_string(),
            }),
        }
    }

    fn method_member(&self, name: &str) -> AdaptResult<&MemberDecl> {
        match self.descriptor.member(name) {
            Some(member) if member.kind == MemberKind::Method => Ok(member),
            _ => Err(AdaptError::MethodNotFound {
                source: self.source.type_label(),
                method: name.to_string(),
            }),
        }
    }

    fn read_source(&self, member: &MemberDecl) -> AdaptResult<Value> {
        match &self.source {
            Value::Object(handle) => self.read_host(handle, member),
            Value::Map(handle) => self.read_mapping(handle, member),
            _ => Err(AdaptError::PropertyNotFound {
                source: self.source.type_label(),
                property: member.name.to_string(),
            }),
        }
    }

    fn read_host(&self, handle: &ObjectHandle, member: &MemberDecl) -> AdaptResult<Value> {
        let host = handle.read();
        let members = self.engine.metadata().members_for(&*host);
        let surface_name = members.surface().name;
        let Some(prop) = members.resolve_property(member.name, self.mode) else {
            return Err(AdaptError::PropertyNotFound {
                source: surface_name.to_string(),
                property: member.name.to_string(),
            });
        };
        match prop.getter.as_ref() {
            Some(getter) => Ok(getter(&*host)),
            None => Err(AdaptError::WriteOnlyProperty {
                source: surface_name.to_string(),
                property: member.name.to_string(),
            }),
        }
    }

    fn read_mapping(&self, handle: &MapHandle, member: &MemberDecl) -> AdaptResult<Value> {
        let map = handle.read();
        match lookup_key(&*map, member.name, self.mode) {
            Some(key) => Ok(map.get(&key).unwrap_or(Value::Null)),
            None => Err(AdaptError::PropertyNotFound {
                source: "mapping".to_string(),
                property: member.name.to_string(),
            }),
        }
    }

    /// Fit a raw source value to the member's declared type.
    ///
    /// Null becomes the zero value, satisfying values pass through,
    /// converters bridge mismatched primitives, and structured members
    /// get a memoized nested adapted instance when the raw value can
    /// carry one. Nothing in here hard-fails.
    fn shape_read(&self, member: &MemberDecl, raw: Value) -> AdaptResult<Value> {
        if raw.is_null() {
            return Ok(member.value_type.zero_value());
        }
        if member.value_type.satisfied_by(&raw) {
            return Ok(raw);
        }
        if let (Some(from), Some(to)) = (raw.type_key(), member.value_type.runtime_key()) {
            if let Some(convert) = self.engine.converters().find(from, to) {
                return Ok(convert(&raw));
            }
        }
        if member.value_type.is_primitive() {
            return Ok(member.value_type.zero_value());
        }
        if self.unshimmable.read().contains(member.name) {
            return Ok(Value::Null);
        }
        let TypeExpr::Contract(key) = member.value_type else {
            self.mark_unshimmable(member);
            return Ok(Value::Null);
        };
        let adaptable = match self.engine.descriptors().describe(key, self.mode) {
            Ok(nested) => compat::can_adapt(&self.engine, &raw, &nested, self.mode),
            Err(_) => false,
        };
        if !adaptable {
            self.mark_unshimmable(member);
            return Ok(Value::Null);
        }
        let factory = match self.engine.factory_for(key, self.mode) {
            Ok(factory) => factory,
            Err(_) => {
                self.mark_unshimmable(member);
                return Ok(Value::Null);
            }
        };
        let adapted = Value::Adapted(factory.instantiate(&self.engine, raw));
        let mut memo = self.memo.write();
        // first writer wins so concurrent readers observe one instance
        let kept = memo.entry(member.name.to_string()).or_insert(adapted);
        Ok(kept.clone())
    }

    fn mark_unshimmable(&self, member: &MemberDecl) {
        self.unshimmable.write().insert(member.name.to_string());
    }

    fn write_host(
        &self,
        handle: &ObjectHandle,
        member: &MemberDecl,
        value: Value,
    ) -> AdaptResult<()> {
        // resolve under a read lock; conversion runs with no lock held
        let (prop, surface_name) = {
            let host = handle.read();
            let members = self.engine.metadata().members_for(&*host);
            let surface_name = members.surface().name;
            match members.resolve_property(member.name, self.mode) {
                Some(prop) => (prop, surface_name),
                None => {
                    return Err(AdaptError::PropertyNotFound {
                        source: surface_name.to_string(),
                        property: member.name.to_string(),
                    })
                }
            }
        };
        let Some(setter) = prop.setter.as_ref() else {
            return Err(AdaptError::ReadOnlyProperty {
                source: surface_name.to_string(),
                property: member.name.to_string(),
            });
        };
        let value = self.shape_write(prop.value_type, member, value)?;
        let mut host = handle.write();
        setter(&mut *host, value);
        Ok(())
    }

    /// Fit a written value to the source property's declared type.
    /// Unlike reads, an impossible fit is a hard failure.
    fn shape_write(
        &self,
        declared: TypeExpr,
        member: &MemberDecl,
        value: Value,
    ) -> AdaptResult<Value> {
        if value.is_null() || declared.satisfied_by(&value) {
            return Ok(value);
        }
        if let (Some(from), Some(to)) = (value.type_key(), declared.runtime_key()) {
            if let Some(convert) = self.engine.converters().find(from, to) {
                return Ok(convert(&value));
            }
        }
        Err(AdaptError::NoConverter {
            from: value.type_label(),
            to: declared.label().to_string(),
            property: member.name.to_string(),
        })
    }

    fn write_mapping(
        &self,
        handle: &MapHandle,
        member: &MemberDecl,
        value: Value,
        create_slot: bool,
    ) -> AdaptResult<()> {
        let mut map = handle.write();
        match lookup_key(&*map, member.name, self.mode) {
            Some(key) => {
                map.insert(&key, value);
                Ok(())
            }
            None if create_slot => {
                map.insert(member.name, value);
                Ok(())
            }
            None => Err(AdaptError::PropertyNotFound {
                source: "mapping".to_string(),
                property: member.name.to_string(),
            }),
        }
    }
}

impl fmt::Debug for Shim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shim")
            .field("contract", &self.descriptor.name())
            .field("mode", &self.mode)
            .field("source", &self.source)
            .finish()
    }
}

/// Whether the arguments already line up with the declared parameters.
fn in_declared_order(method: &MethodSpec, args: &[Value]) -> bool {
    method
        .params
        .iter()
        .zip(args)
        .all(|(param, arg)| param.satisfied_by(arg))
}

/// Fuzzy-mode argument arrangement.
///
/// Arity must match exactly. Arguments already in declared order pass
/// through. Otherwise reordering requires pairwise-distinct parameter
/// types; each parameter takes the first unused argument of exactly its
/// runtime type, with no conversion, and an unmatched parameter
/// receives `Null`.
fn arrange_arguments(
    method: &MethodSpec,
    qualified: &str,
    args: Vec<Value>,
) -> AdaptResult<Vec<Value>> {
    if args.len() != method.params.len() {
        return Err(AdaptError::ParameterCountMismatch {
            provided: args.len(),
            required: method.params.len(),
            qualified: qualified.to_string(),
        });
    }
    if in_declared_order(method, &args) {
        return Ok(args);
    }
    for (i, first) in method.params.iter().enumerate() {
        for second in method.params.iter().skip(i + 1) {
            if first == second {
                return Err(AdaptError::UnresolveableParameterOrder {
                    qualified: qualified.to_string(),
                });
            }
        }
    }
    let mut used = vec![false; args.len()];
    let mut arranged = Vec::with_capacity(method.params.len());
    for param in &method.params {
        let slot = args
            .iter()
            .enumerate()
            .find(|(i, arg)| !used[*i] && !arg.is_null() && param.satisfied_by(arg))
            .map(|(i, _)| i);
        match slot {
            Some(i) => {
                used[i] = true;
                arranged.push(args[i].clone());
            }
            None => arranged.push(Value::Null),
        }
    }
    Ok(arranged)
}
