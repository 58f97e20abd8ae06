//! Mallard — runtime structural adaptation for dynamic values.
//!
//! Mallard adapts arbitrary sources to **contracts**: named, typed member
//! sets declared independently of any source type. A source can be:
//! - a **reflective host**: any type registering a member surface,
//! - a **string-keyed mapping**: a dictionary-like bag of values,
//! - an **already-adapted instance**: re-adaptation routes through the
//!   inner instance's backing store.
//!
//! Adapted instances delegate every property read, property write, and
//! method call onto the source through a shim, with strict or fuzzy
//! (case-insensitive, argument-reordering) member resolution and
//! implicit conversion through a converter registry. Reads degrade to
//! zero values when the source disappoints; writes and calls fail hard.
//! No code is generated at runtime: contracts are descriptor tables and
//! sources expose closure-based member tables.
//!
//! # Example
//!
//! ```rust,ignore
//! use mallard::{Contract, ContractSpec, TypeExpr, Value, ValueMap};
//! use once_cell::sync::Lazy;
//!
//! struct Person;
//!
//! impl Contract for Person {
//!     fn contract_spec() -> &'static ContractSpec {
//!         static SPEC: Lazy<ContractSpec> = Lazy::new(|| {
//!             ContractSpec::build::<Person>("Person")
//!                 .property("Name", TypeExpr::Str)
//!                 .property("Age", TypeExpr::Int)
//!                 .finish()
//!         });
//!         &SPEC
//!     }
//! }
//!
//! let mut row = ValueMap::case_sensitive();
//! row.insert("name", Value::from("Ada"));
//! row.insert("age", Value::Int(36));
//!
//! // fuzzy resolution bridges the casing difference
//! let person = mallard::fuzzy_adapt_as::<Person>(&Value::mapping(row)).unwrap();
//! assert_eq!(person.get("Name").unwrap(), Value::from("Ada"));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Contract declarations, flattened descriptors, and their cache
pub mod contract;

/// Converter registry and the built-in primitive converters
pub mod convert;

/// Engine: cache bundle, entry points, process-wide default
pub mod engine;

/// Adaptation and shim errors
pub mod error;

/// Conversion of parsed JSON into the value universe
pub mod json;

/// String-keyed mappings and case tooling
pub mod mapping;

/// Registered host-type surfaces and the per-type metadata cache
pub mod reflect;

/// Adapted-instance synthesis: factories, handles, typed views
pub mod synth;

/// Declared types, zero values, and match modes
pub mod types;

/// Dynamic values and shared handles
pub mod value;

mod compat;
mod shim;

// ============================================================================
// Re-exports
// ============================================================================

pub use contract::{
    // Declarations
    Contract, ContractSpec, MemberDecl, MemberKind, SpecBuilder,
    // Flattening
    ContractDescriptor, DescriptorCache,
};

pub use convert::{ConvertFn, ConverterRegistry};

pub use engine::Engine;

pub use error::{AdaptError, AdaptResult};

pub use json::{map_from_json, mapping_from_json, value_from_json};

pub use mapping::{
    // Trait and concrete mapping
    KeyComparison, Mapping, ValueMap,
    // Case tooling
    force_fill, is_case_insensitive, to_case_insensitive,
};

pub use reflect::{
    // Traits
    Describe, Reflective,
    // Surfaces
    MethodSpec, PropertySpec, SurfaceBuilder, TypeSurface,
    // Cache
    MetadataCache, SourceMembers,
};

pub use synth::{Adapted, AdaptedInner, InstanceFactory, SynthesisCache};

pub use types::{ContractKey, MatchMode, TypeExpr};

pub use value::{AdaptedHandle, MapHandle, ObjectHandle, TypeKey, Value};

// ============================================================================
// Global-engine conveniences
// ============================================================================

/// Adapt `source` to contract `C` on the global engine, strict
/// resolution.
pub fn adapt_as<C: Contract>(source: &Value) -> AdaptResult<Adapted<C>> {
    Engine::global().adapt_as::<C>(source)
}

/// Adapt `source` to contract `C` on the global engine, fuzzy
/// resolution.
pub fn fuzzy_adapt_as<C: Contract>(source: &Value) -> AdaptResult<Adapted<C>> {
    Engine::global().fuzzy_adapt_as::<C>(source)
}

/// Whether `source` could adapt to `C` strictly, on the global engine.
pub fn can_adapt_as<C: Contract>(source: &Value) -> bool {
    Engine::global().can_adapt_as::<C>(source)
}

/// Whether `source` could adapt to `C` fuzzily, on the global engine.
pub fn can_fuzzy_adapt_as<C: Contract>(source: &Value) -> bool {
    Engine::global().can_fuzzy_adapt_as::<C>(source)
}

/// Adapt a mapping to `C` on the global engine.
pub fn adapt_mapping<C: Contract>(handle: &MapHandle, mode: MatchMode) -> AdaptResult<Adapted<C>> {
    Engine::global().adapt_mapping::<C>(handle, mode)
}

/// Adapt a mapping to `C` on the global engine, filling missing contract
/// property keys with zero values first.
pub fn force_adapt_mapping<C: Contract>(
    handle: &MapHandle,
    mode: MatchMode,
) -> AdaptResult<Adapted<C>> {
    Engine::global().force_adapt_mapping::<C>(handle, mode)
}
