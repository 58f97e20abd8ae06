//! Recursive adaptation feasibility.
//!
//! Answers "could this source be adapted to this contract" without
//! building anything. Host sources are judged by their declared schema,
//! mappings by their current values, adapted instances by contract
//! cover. Recursion carries a visited set and answers yes on revisit,
//! so cyclic type graphs and self-referencing mappings terminate.

use std::any::TypeId;

use rustc_hash::FxHashSet;

use crate::contract::{ContractDescriptor, MemberDecl, MemberKind};
use crate::engine::Engine;
use crate::mapping::{lookup_key, map_identity};
use crate::reflect::{MethodSpec, TypeSurface};
use crate::types::{MatchMode, TypeExpr};
use crate::value::{MapHandle, Value};

/// Whether `source` can be adapted to `descriptor`'s contract.
///
/// Primitives and `Null` are never adaptable.
pub(crate) fn can_adapt(
    engine: &Engine,
    source: &Value,
    descriptor: &ContractDescriptor,
    mode: MatchMode,
) -> bool {
    Feasibility::new(engine, mode).source_ok(source, descriptor)
}

#[derive(PartialEq, Eq, Hash)]
enum Visit {
    // (source type or inner contract, target contract)
    Type(TypeId, TypeId),
    // (mapping pointer identity, target contract)
    Map(usize, TypeId),
}

struct Feasibility<'a> {
    engine: &'a Engine,
    mode: MatchMode,
    visited: FxHashSet<Visit>,
}

impl<'a> Feasibility<'a> {
    fn new(engine: &'a Engine, mode: MatchMode) -> Self {
        Feasibility {
            engine,
            mode,
            visited: FxHashSet::default(),
        }
    }

    fn source_ok(&mut self, source: &Value, descriptor: &ContractDescriptor) -> bool {
        match source {
            Value::Object(handle) => {
                let surface = handle.read().surface();
                self.host_ok(surface, descriptor)
            }
            Value::Map(handle) => self.mapping_ok(handle, descriptor),
            Value::Adapted(inner) => self.cover_ok(inner.descriptor(), descriptor),
            _ => false,
        }
    }

    /// Declared-schema check: every contract member must resolve on the
    /// host surface with compatible direction and type.
    fn host_ok(&mut self, surface: &'static TypeSurface, descriptor: &ContractDescriptor) -> bool {
        if !self
            .visited
            .insert(Visit::Type(surface.id, descriptor.key().id()))
        {
            return true;
        }
        let members = self.engine.metadata().members_of_surface(surface);
        for member in descriptor.members() {
            match member.kind {
                MemberKind::Property => {
                    let Some(prop) = members.resolve_property(member.name, self.mode) else {
                        return false;
                    };
                    if member.readable && !prop.readable() {
                        return false;
                    }
                    if member.writable && !prop.writable() {
                        return false;
                    }
                    let source_type = prop.value_type;
                    if !self.property_type_ok(source_type, member) {
                        return false;
                    }
                }
                MemberKind::Method => {
                    let Some(method) = members.resolve_method(member.name, self.mode) else {
                        return false;
                    };
                    if !method_signature_ok(method, member, self.mode) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Value-level check: every contract property key must resolve and
    /// hold a usable value. Methods are never satisfiable by mappings.
    fn mapping_ok(&mut self, handle: &MapHandle, descriptor: &ContractDescriptor) -> bool {
        if !self
            .visited
            .insert(Visit::Map(map_identity(handle), descriptor.key().id()))
        {
            return true;
        }
        for member in descriptor.members() {
            if member.kind == MemberKind::Method {
                return false;
            }
            let value = {
                let map = handle.read();
                match lookup_key(&*map, member.name, self.mode) {
                    Some(key) => map.get(&key),
                    None => return false,
                }
            };
            let Some(value) = value else {
                return false;
            };
            if !self.value_ok(&value, member) {
                return false;
            }
        }
        true
    }

    /// Contract-cover check for re-ducking: every outer member must
    /// resolve in the inner contract with the same shape. Backing access
    /// bypasses direction flags, so only kind and type matter; methods
    /// have no backing slot and never cover.
    fn cover_ok(&mut self, inner: &ContractDescriptor, outer: &ContractDescriptor) -> bool {
        if !self
            .visited
            .insert(Visit::Type(inner.key().id(), outer.key().id()))
        {
            return true;
        }
        for member in outer.members() {
            if member.kind == MemberKind::Method {
                return false;
            }
            let Some(covering) = inner.member_with_mode(member.name, self.mode) else {
                return false;
            };
            if covering.kind != MemberKind::Property {
                return false;
            }
            let matches = match member.value_type {
                TypeExpr::Any => true,
                ref expected => covering.value_type == *expected,
            };
            if !matches {
                return false;
            }
        }
        true
    }

    /// Declared property type against the contract member: identical,
    /// converter-reachable in every direction the member uses, or (for
    /// contract-typed members) recursively adaptable.
    fn property_type_ok(&mut self, source: TypeExpr, member: &MemberDecl) -> bool {
        if source == member.value_type {
            return true;
        }
        if matches!(source, TypeExpr::Any) || matches!(member.value_type, TypeExpr::Any) {
            return true;
        }
        if self.converters_cover(source, member) {
            return true;
        }
        if let TypeExpr::Contract(key) = member.value_type {
            let Ok(nested) = self.engine.descriptors().describe(key, self.mode) else {
                return false;
            };
            return match source {
                TypeExpr::Object { surface, .. } => self.host_ok(surface(), &nested),
                TypeExpr::Contract(inner_key) => {
                    match self.engine.descriptors().describe(inner_key, self.mode) {
                        Ok(inner) => self.cover_ok(&inner, &nested),
                        Err(_) => false,
                    }
                }
                // values behind Map declarations are judged at read time
                TypeExpr::Map => true,
                _ => false,
            };
        }
        false
    }

    fn converters_cover(&self, source: TypeExpr, member: &MemberDecl) -> bool {
        let (Some(source_key), Some(member_key)) =
            (source.runtime_key(), member.value_type.runtime_key())
        else {
            return false;
        };
        let read_ok = !member.readable || self.engine.converters().has(source_key, member_key);
        let write_ok = !member.writable || self.engine.converters().has(member_key, source_key);
        read_ok && write_ok
    }

    /// Mapping value against the contract member: `Null` always fits
    /// (reads degrade to zero), otherwise satisfying, convertible, or
    /// recursively adaptable.
    fn value_ok(&mut self, value: &Value, member: &MemberDecl) -> bool {
        if value.is_null() {
            return true;
        }
        if member.value_type.satisfied_by(value) {
            return true;
        }
        if let (Some(from), Some(to)) = (value.type_key(), member.value_type.runtime_key()) {
            if self.engine.converters().has(from, to) {
                return true;
            }
        }
        if let TypeExpr::Contract(key) = member.value_type {
            let Ok(nested) = self.engine.descriptors().describe(key, self.mode) else {
                return false;
            };
            return self.source_ok(value, &nested);
        }
        false
    }
}

/// Method signatures must agree on arity; parameter types must match
/// positionally in strict mode, as a multiset in fuzzy mode.
fn method_signature_ok(source: &MethodSpec, member: &MemberDecl, mode: MatchMode) -> bool {
    if source.params.len() != member.params.len() {
        return false;
    }
    match mode {
        MatchMode::Strict => source
            .params
            .iter()
            .zip(member.params.iter())
            .all(|(s, m)| s == m),
        MatchMode::Fuzzy => {
            let mut used = vec![false; source.params.len()];
            for wanted in &member.params {
                let slot =
                    (0..source.params.len()).find(|&i| !used[i] && source.params[i] == *wanted);
                match slot {
                    Some(i) => used[i] = true,
                    None => return false,
                }
            }
            true
        }
    }
}
