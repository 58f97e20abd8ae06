//! The adaptation engine: a shared cache family plus entry points.
//!
//! Caches are engine state, not process state. Cloning an engine is
//! cheap and shares its caches; independent engines (as tests build)
//! share nothing. A process-wide default engine backs the crate-level
//! convenience functions.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::compat;
use crate::contract::{Contract, DescriptorCache};
use crate::convert::ConverterRegistry;
use crate::error::{AdaptError, AdaptResult};
use crate::mapping;
use crate::reflect::MetadataCache;
use crate::synth::{Adapted, InstanceFactory, SynthesisCache};
use crate::types::{ContractKey, MatchMode};
use crate::value::{MapHandle, Value};

static GLOBAL: Lazy<Engine> = Lazy::new(Engine::new);

/// Adaptation engine.
///
/// Bundles the metadata cache, descriptor cache, converter registry,
/// and factory cache. `Clone` shares all four.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    metadata: MetadataCache,
    descriptors: DescriptorCache,
    converters: ConverterRegistry,
    factories: SynthesisCache,
}

impl Engine {
    /// Engine with the built-in primitive converter lattice.
    pub fn new() -> Self {
        Self::with_converters(ConverterRegistry::with_defaults())
    }

    /// Engine over an injected converter registry.
    pub fn with_converters(converters: ConverterRegistry) -> Self {
        Engine {
            inner: Arc::new(EngineInner {
                metadata: MetadataCache::new(),
                descriptors: DescriptorCache::new(),
                converters,
                factories: SynthesisCache::new(),
            }),
        }
    }

    /// The process-wide default engine behind the crate-level
    /// convenience functions.
    pub fn global() -> &'static Engine {
        &GLOBAL
    }

    /// The engine's converter registry, open for registration.
    pub fn converters(&self) -> &ConverterRegistry {
        &self.inner.converters
    }

    pub(crate) fn metadata(&self) -> &MetadataCache {
        &self.inner.metadata
    }

    pub(crate) fn descriptors(&self) -> &DescriptorCache {
        &self.inner.descriptors
    }

    pub(crate) fn factory_for(
        &self,
        key: ContractKey,
        mode: MatchMode,
    ) -> AdaptResult<Arc<InstanceFactory>> {
        self.inner
            .factories
            .factory(&self.inner.descriptors, key, mode)
    }

    /// Adapt `source` to contract `C` with strict member resolution.
    pub fn adapt_as<C: Contract>(&self, source: &Value) -> AdaptResult<Adapted<C>> {
        self.adapt_with(source, MatchMode::Strict)
    }

    /// Adapt `source` to contract `C` with fuzzy member resolution:
    /// case-insensitive names and method-argument reordering.
    pub fn fuzzy_adapt_as<C: Contract>(&self, source: &Value) -> AdaptResult<Adapted<C>> {
        self.adapt_with(source, MatchMode::Fuzzy)
    }

    /// Whether `source` could adapt to `C` strictly.
    pub fn can_adapt_as<C: Contract>(&self, source: &Value) -> bool {
        self.feasible::<C>(source, MatchMode::Strict)
    }

    /// Whether `source` could adapt to `C` fuzzily.
    pub fn can_fuzzy_adapt_as<C: Contract>(&self, source: &Value) -> bool {
        self.feasible::<C>(source, MatchMode::Fuzzy)
    }

    /// Adapt a mapping to `C`.
    ///
    /// Fuzzy adaptation of a case-sensitive mapping first builds a
    /// recursive case-insensitive copy; the adapted instance then reads
    /// and writes the copy, not the original.
    pub fn adapt_mapping<C: Contract>(
        &self,
        handle: &MapHandle,
        mode: MatchMode,
    ) -> AdaptResult<Adapted<C>> {
        self.adapt_mapping_with::<C>(handle, mode, false)
    }

    /// Adapt a mapping to `C`, first inserting the zero value of every
    /// missing contract property key and skipping the feasibility gate.
    /// For a property-only contract this always synthesizes.
    pub fn force_adapt_mapping<C: Contract>(
        &self,
        handle: &MapHandle,
        mode: MatchMode,
    ) -> AdaptResult<Adapted<C>> {
        self.adapt_mapping_with::<C>(handle, mode, true)
    }

    fn feasible<C: Contract>(&self, source: &Value, mode: MatchMode) -> bool {
        let Ok(descriptor) = self.descriptors().describe(ContractKey::of::<C>(), mode) else {
            return false;
        };
        compat::can_adapt(self, source, &descriptor, mode)
    }

    fn adapt_with<C: Contract>(&self, source: &Value, mode: MatchMode) -> AdaptResult<Adapted<C>> {
        if let Value::Map(handle) = source {
            return self.adapt_mapping_with::<C>(handle, mode, false);
        }
        let key = ContractKey::of::<C>();
        // contract problems (ambiguity, emptiness) precede source problems
        let factory = self.factory_for(key, mode)?;
        if !compat::can_adapt(self, source, factory.descriptor(), mode) {
            return Err(AdaptError::NotAdaptable {
                source: source.type_label(),
                contract: key.name().to_string(),
            });
        }
        Ok(Adapted::from_handle(
            factory.instantiate(self, source.clone()),
        ))
    }

    fn adapt_mapping_with<C: Contract>(
        &self,
        handle: &MapHandle,
        mode: MatchMode,
        force: bool,
    ) -> AdaptResult<Adapted<C>> {
        let key = ContractKey::of::<C>();
        let factory = self.factory_for(key, mode)?;
        let handle = if mode.is_fuzzy() && !mapping::is_case_insensitive(handle) {
            mapping::to_case_insensitive(handle)
        } else {
            handle.clone()
        };
        if force {
            mapping::force_fill(&handle, factory.descriptor());
        }
        let source = Value::Map(handle);
        if !force && !compat::can_adapt(self, &source, factory.descriptor(), mode) {
            return Err(AdaptError::NotAdaptable {
                source: source.type_label(),
                contract: key.name().to_string(),
            });
        }
        Ok(Adapted::from_handle(factory.instantiate(self, source)))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
