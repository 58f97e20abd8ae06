//! Per-type member metadata, derived once from registered surfaces.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxHashMap;

use crate::reflect::surface::{MethodSpec, PropertySpec, Reflective, TypeSurface};
use crate::types::MatchMode;

/// Strict and fuzzy member tables over one host type's surface.
///
/// Properties and methods live in separate namespaces, as they do on the
/// surface itself. Fuzzy tables key by lowercased name; a pair of
/// distinctly-cased members collapsing to one fuzzy key keeps the first,
/// it never raises ambiguity.
pub struct SourceMembers {
    surface: &'static TypeSurface,
    strict_props: FxHashMap<&'static str, usize>,
    fuzzy_props: FxHashMap<String, usize>,
    strict_methods: FxHashMap<&'static str, usize>,
    fuzzy_methods: FxHashMap<String, usize>,
}

impl SourceMembers {
    fn build(surface: &'static TypeSurface) -> Self {
        let mut strict_props = FxHashMap::default();
        let mut fuzzy_props = FxHashMap::default();
        for (idx, prop) in surface.properties.iter().enumerate() {
            strict_props.entry(prop.name).or_insert(idx);
            fuzzy_props
                .entry(prop.name.to_ascii_lowercase())
                .or_insert(idx);
        }
        let mut strict_methods = FxHashMap::default();
        let mut fuzzy_methods = FxHashMap::default();
        for (idx, method) in surface.methods.iter().enumerate() {
            strict_methods.entry(method.name).or_insert(idx);
            fuzzy_methods
                .entry(method.name.to_ascii_lowercase())
                .or_insert(idx);
        }
        SourceMembers {
            surface,
            strict_props,
            fuzzy_props,
            strict_methods,
            fuzzy_methods,
        }
    }

    /// The underlying surface.
    pub fn surface(&self) -> &'static TypeSurface {
        self.surface
    }

    /// Resolve a property name under the given mode.
    ///
    /// The returned spec borrows the static surface, so callers may hold
    /// it across lock boundaries.
    pub fn resolve_property(&self, name: &str, mode: MatchMode) -> Option<&'static PropertySpec> {
        let idx = match mode {
            MatchMode::Strict => self.strict_props.get(name).copied(),
            MatchMode::Fuzzy => self.fuzzy_props.get(&name.to_ascii_lowercase()).copied(),
        }?;
        self.surface.properties.get(idx)
    }

    /// Resolve a method name under the given mode.
    pub fn resolve_method(&self, name: &str, mode: MatchMode) -> Option<&'static MethodSpec> {
        let idx = match mode {
            MatchMode::Strict => self.strict_methods.get(name).copied(),
            MatchMode::Fuzzy => self.fuzzy_methods.get(&name.to_ascii_lowercase()).copied(),
        }?;
        self.surface.methods.get(idx)
    }
}

/// Process-lifetime cache of [`SourceMembers`], keyed by concrete type.
///
/// Tables are built at most once per type; both the strict and fuzzy
/// variants come out of that single pass.
pub struct MetadataCache {
    entries: DashMap<TypeId, Arc<SourceMembers>>,
}

impl MetadataCache {
    /// Empty cache.
    pub fn new() -> Self {
        MetadataCache {
            entries: DashMap::new(),
        }
    }

    /// Member tables for a live host, building them on first sight.
    pub fn members_for(&self, host: &dyn Reflective) -> Arc<SourceMembers> {
        self.members_of_surface(host.surface())
    }

    /// Member tables for a surface reached without an instance.
    pub fn members_of_surface(&self, surface: &'static TypeSurface) -> Arc<SourceMembers> {
        self.entries
            .entry(surface.id)
            .or_insert_with(|| Arc::new(SourceMembers::build(surface)))
            .value()
            .clone()
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}
