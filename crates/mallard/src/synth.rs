//! Adapted-instance synthesis.
//!
//! A factory is built once per (contract, mode) pair and validated at
//! that point; instances are cheap handles after that. No code is
//! generated anywhere: an adapted instance is a shim bound to a
//! flattened contract descriptor.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;

use crate::contract::{Contract, ContractDescriptor, DescriptorCache, MemberDecl, MemberKind};
use crate::engine::Engine;
use crate::error::{AdaptError, AdaptResult};
use crate::shim::Shim;
use crate::types::{ContractKey, MatchMode};
use crate::value::{AdaptedHandle, Value};

/// Validated instance recipe for one (contract, mode) pair.
pub struct InstanceFactory {
    descriptor: Arc<ContractDescriptor>,
}

impl InstanceFactory {
    fn build(descriptor: Arc<ContractDescriptor>) -> AdaptResult<Self> {
        if descriptor.members().is_empty() {
            return Err(AdaptError::InvalidContract {
                contract: descriptor.name().to_string(),
                reason: "contract declares no members".to_string(),
            });
        }
        Ok(InstanceFactory { descriptor })
    }

    /// The flattened descriptor instances are bound to.
    pub fn descriptor(&self) -> &ContractDescriptor {
        &self.descriptor
    }

    /// Bind a fresh adapted instance over `source`.
    pub fn instantiate(&self, engine: &Engine, source: Value) -> AdaptedHandle {
        Arc::new(AdaptedInner {
            shim: Shim::new(engine.clone(), source, self.descriptor.clone()),
        })
    }
}

impl fmt::Debug for InstanceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceFactory")
            .field("contract", &self.descriptor.name())
            .field("mode", &self.descriptor.mode())
            .finish()
    }
}

/// Per-engine cache of instance factories.
///
/// Synthesis (descriptor flattening plus validation) runs at most once
/// per (contract, mode); every later adaptation reuses the factory.
pub struct SynthesisCache {
    entries: DashMap<(TypeId, MatchMode), Arc<InstanceFactory>>,
}

impl SynthesisCache {
    /// Empty cache.
    pub fn new() -> Self {
        SynthesisCache {
            entries: DashMap::new(),
        }
    }

    pub(crate) fn factory(
        &self,
        descriptors: &DescriptorCache,
        key: ContractKey,
        mode: MatchMode,
    ) -> AdaptResult<Arc<InstanceFactory>> {
        if let Some(found) = self.entries.get(&(key.id(), mode)) {
            return Ok(found.value().clone());
        }
        let descriptor = descriptors.describe(key, mode)?;
        let factory = Arc::new(InstanceFactory::build(descriptor)?);
        Ok(self
            .entries
            .entry((key.id(), mode))
            .or_insert(factory)
            .value()
            .clone())
    }
}

impl Default for SynthesisCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Erased adapted instance: the dynamic ABI every contract shares.
///
/// Alongside `get`/`set`/`call`, an adapted instance exposes its backing
/// store. A backing slot exists for every property the instance's own
/// contract declares, under the member's plain name; backing access
/// ignores the contract's readable/writable flags and reaches the
/// instance's storage directly. Re-adapting an adapted instance routes
/// all member traffic through these slots.
pub struct AdaptedInner {
    shim: Shim,
}

impl AdaptedInner {
    /// Read a contract property.
    pub fn get(&self, name: &str) -> AdaptResult<Value> {
        self.shim.get(name)
    }

    /// Write a contract property.
    pub fn set(&self, name: &str, value: Value) -> AdaptResult<()> {
        self.shim.set(name, value)
    }

    /// Call a contract method.
    pub fn call(&self, name: &str, args: Vec<Value>) -> AdaptResult<Value> {
        self.shim.call_through(name, args)
    }

    /// The flattened contract this instance was adapted under.
    pub fn descriptor(&self) -> &ContractDescriptor {
        self.shim.descriptor()
    }

    /// `TypeId` of the contract type.
    pub fn contract_id(&self) -> TypeId {
        self.shim.descriptor().key().id()
    }

    /// Name of the contract type.
    pub fn contract_name(&self) -> &'static str {
        self.shim.descriptor().name()
    }

    /// Resolution mode the instance operates under.
    pub fn mode(&self) -> MatchMode {
        self.shim.mode()
    }

    /// The adapted source value.
    pub fn source(&self) -> &Value {
        self.shim.source()
    }

    /// Read a backing slot. `mode` is the caller's resolution mode; slot
    /// names outside this instance's contract raise
    /// [`AdaptError::BackingFieldNotFound`]. A slot whose storage key
    /// was never written reads as the member's zero value.
    pub fn backing_get(&self, name: &str, mode: MatchMode) -> AdaptResult<Value> {
        let member = self.backing_member(name, mode)?;
        match self.shim.get_member(member) {
            Err(AdaptError::PropertyNotFound { .. }) => Ok(member.value_type.zero_value()),
            other => other,
        }
    }

    /// Write a backing slot, creating missing mapping keys.
    pub fn backing_set(&self, name: &str, mode: MatchMode, value: Value) -> AdaptResult<()> {
        let member = self.backing_member(name, mode)?;
        self.shim.set_member(member, value, true)
    }

    fn backing_member(&self, name: &str, mode: MatchMode) -> AdaptResult<&MemberDecl> {
        match self.shim.descriptor().member_with_mode(name, mode) {
            Some(member) if member.kind == MemberKind::Property => Ok(member),
            _ => Err(AdaptError::BackingFieldNotFound {
                contract: self.contract_name().to_string(),
                property: name.to_string(),
            }),
        }
    }
}

impl fmt::Debug for AdaptedInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptedInner")
            .field("contract", &self.contract_name())
            .field("mode", &self.mode())
            .finish()
    }
}

/// Typed view over an adapted instance.
///
/// Carries the contract as a phantom so call sites stay honest about
/// which contract an instance satisfies; all member traffic still runs
/// through the erased handle.
pub struct Adapted<C: Contract> {
    handle: AdaptedHandle,
    _contract: PhantomData<fn(C)>,
}

impl<C: Contract> Adapted<C> {
    pub(crate) fn from_handle(handle: AdaptedHandle) -> Self {
        Adapted {
            handle,
            _contract: PhantomData,
        }
    }

    /// Recover a typed view from a value holding an instance of `C`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let handle = value.as_adapted()?;
        if handle.contract_id() != TypeId::of::<C>() {
            return None;
        }
        Some(Self::from_handle(handle.clone()))
    }

    /// Read a contract property.
    pub fn get(&self, name: &str) -> AdaptResult<Value> {
        self.handle.get(name)
    }

    /// Write a contract property.
    pub fn set(&self, name: &str, value: Value) -> AdaptResult<()> {
        self.handle.set(name, value)
    }

    /// Call a contract method.
    pub fn call(&self, name: &str, args: Vec<Value>) -> AdaptResult<Value> {
        self.handle.call(name, args)
    }

    /// The erased instance handle.
    pub fn handle(&self) -> &AdaptedHandle {
        &self.handle
    }

    /// Wrap the instance as a [`Value`] so it can flow through other
    /// sources and adaptations.
    pub fn into_value(self) -> Value {
        Value::Adapted(self.handle)
    }
}

impl<C: Contract> Clone for Adapted<C> {
    fn clone(&self) -> Self {
        Adapted {
            handle: self.handle.clone(),
            _contract: PhantomData,
        }
    }
}

impl<C: Contract> fmt::Debug for Adapted<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapted")
            .field("contract", &self.handle.contract_name())
            .field("mode", &self.handle.mode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractSpec;
    use crate::mapping::{Mapping, ValueMap};
    use once_cell::sync::Lazy;

    struct Hollow;

    impl Contract for Hollow {
        fn contract_spec() -> &'static ContractSpec {
            static SPEC: Lazy<ContractSpec> =
                Lazy::new(|| ContractSpec::build::<Hollow>("Hollow").finish());
            &SPEC
        }
    }

    struct Tagged;

    impl Contract for Tagged {
        fn contract_spec() -> &'static ContractSpec {
            static SPEC: Lazy<ContractSpec> = Lazy::new(|| {
                ContractSpec::build::<Tagged>("Tagged")
                    .property("Tag", crate::types::TypeExpr::Str)
                    .finish()
            });
            &SPEC
        }
    }

    #[test]
    fn test_empty_contract_cannot_synthesize() {
        let engine = Engine::new();
        let err = engine
            .factory_for(ContractKey::of::<Hollow>(), MatchMode::Strict)
            .unwrap_err();
        assert!(matches!(err, AdaptError::InvalidContract { .. }));
    }

    #[test]
    fn test_factories_are_cached_per_contract_and_mode() {
        let engine = Engine::new();
        let key = ContractKey::of::<Tagged>();
        let a = engine.factory_for(key, MatchMode::Strict).unwrap();
        let b = engine.factory_for(key, MatchMode::Strict).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let fuzzy = engine.factory_for(key, MatchMode::Fuzzy).unwrap();
        assert!(!Arc::ptr_eq(&a, &fuzzy));
    }

    #[test]
    fn test_typed_view_recovery_checks_the_contract() {
        let engine = Engine::new();
        let mut map = ValueMap::case_sensitive();
        map.insert("Tag", Value::from("x"));
        let adapted = engine
            .adapt_as::<Tagged>(&Value::mapping(map))
            .unwrap();
        let value = adapted.into_value();
        assert!(Adapted::<Tagged>::from_value(&value).is_some());
        assert!(Adapted::<Hollow>::from_value(&value).is_none());
        assert!(Adapted::<Tagged>::from_value(&Value::Int(3)).is_none());
    }

    #[test]
    fn test_backing_slot_outside_contract_is_refused() {
        let engine = Engine::new();
        let mut map = ValueMap::case_sensitive();
        map.insert("Tag", Value::from("x"));
        let adapted = engine
            .adapt_as::<Tagged>(&Value::mapping(map))
            .unwrap();
        let err = adapted
            .handle()
            .backing_get("Missing", MatchMode::Strict)
            .unwrap_err();
        assert!(matches!(err, AdaptError::BackingFieldNotFound { .. }));
    }
}
