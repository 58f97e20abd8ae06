//! String-keyed mappings and the case tooling used to adapt them.
//!
//! Mappings are the second source kind next to reflective hosts. Their
//! members are typeless: a key that is present is readable and
//! writable, an absent key is not a member. Fuzzy adaptation wants
//! case-insensitive keys, so this module carries detection (structural
//! report or brute-force probe), recursive normalization into
//! case-insensitive copies, and forced filling of missing contract keys.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::contract::{ContractDescriptor, MemberKind};
use crate::types::MatchMode;
use crate::value::{MapHandle, Value};

/// Key comparison strategy of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyComparison {
    /// Keys match byte-for-byte
    CaseSensitive,
    /// Keys match ignoring ASCII case
    CaseInsensitive,
}

/// Object-safe string-keyed mapping.
pub trait Mapping: Send + Sync + 'static {
    /// Value stored under `key`, if present.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`.
    fn insert(&mut self, key: &str, value: Value);

    /// Remove `key`, returning its value.
    fn remove(&mut self, key: &str) -> Option<Value>;

    /// Whether `key` is present.
    fn contains_key(&self, key: &str) -> bool;

    /// All keys, in no particular order.
    fn keys(&self) -> Vec<String>;

    /// Number of entries.
    fn len(&self) -> usize;

    /// Whether the mapping is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Structural report of the key comparison strategy. `None` means
    /// unknown, in which case callers probe.
    fn key_comparison(&self) -> Option<KeyComparison> {
        None
    }
}

/// The engine's concrete mapping.
///
/// Case-insensitive maps fold keys for lookup but keep the first-seen
/// casing for iteration.
#[derive(Debug, Clone)]
pub struct ValueMap {
    comparison: KeyComparison,
    entries: FxHashMap<String, Value>,
    // lowercased key -> stored key, maintained for insensitive maps only
    folded: FxHashMap<String, String>,
}

impl ValueMap {
    /// Case-sensitive map.
    pub fn case_sensitive() -> Self {
        Self::with_comparison(KeyComparison::CaseSensitive)
    }

    /// Case-insensitive map.
    pub fn case_insensitive() -> Self {
        Self::with_comparison(KeyComparison::CaseInsensitive)
    }

    /// Map with an explicit comparison strategy.
    pub fn with_comparison(comparison: KeyComparison) -> Self {
        ValueMap {
            comparison,
            entries: FxHashMap::default(),
            folded: FxHashMap::default(),
        }
    }

    /// Wrap in a shared handle.
    pub fn into_handle(self) -> MapHandle {
        Arc::new(RwLock::new(self))
    }

    fn stored_key(&self, key: &str) -> Option<String> {
        match self.comparison {
            KeyComparison::CaseSensitive => {
                self.entries.contains_key(key).then(|| key.to_string())
            }
            KeyComparison::CaseInsensitive => {
                self.folded.get(&key.to_ascii_lowercase()).cloned()
            }
        }
    }
}

impl Default for ValueMap {
    fn default() -> Self {
        Self::case_sensitive()
    }
}

impl Mapping for ValueMap {
    fn get(&self, key: &str) -> Option<Value> {
        let stored = self.stored_key(key)?;
        self.entries.get(&stored).cloned()
    }

    fn insert(&mut self, key: &str, value: Value) {
        match self.comparison {
            KeyComparison::CaseSensitive => {
                self.entries.insert(key.to_string(), value);
            }
            KeyComparison::CaseInsensitive => {
                let lower = key.to_ascii_lowercase();
                match self.folded.get(&lower) {
                    Some(stored) => {
                        self.entries.insert(stored.clone(), value);
                    }
                    None => {
                        self.folded.insert(lower, key.to_string());
                        self.entries.insert(key.to_string(), value);
                    }
                }
            }
        }
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        match self.comparison {
            KeyComparison::CaseSensitive => self.entries.remove(key),
            KeyComparison::CaseInsensitive => {
                let stored = self.folded.remove(&key.to_ascii_lowercase())?;
                self.entries.remove(&stored)
            }
        }
    }

    fn contains_key(&self, key: &str) -> bool {
        self.stored_key(key).is_some()
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn key_comparison(&self) -> Option<KeyComparison> {
        Some(self.comparison)
    }
}

/// Whether a mapping treats keys case-insensitively.
///
/// Uses the structural report when the mapping gives one. Otherwise
/// probes: insert a synthetic key absent in both casings, test
/// membership of the other casing, remove the probe. Works on empty
/// mappings and leaves no residue.
pub fn is_case_insensitive(handle: &MapHandle) -> bool {
    if let Some(comparison) = handle.read().key_comparison() {
        return comparison == KeyComparison::CaseInsensitive;
    }
    let mut map = handle.write();
    let (lower, upper) = probe_keys(&*map);
    map.insert(&upper, Value::Null);
    let collides = map.contains_key(&lower);
    map.remove(&upper);
    collides
}

fn probe_keys(map: &dyn Mapping) -> (String, String) {
    let mut n = 0usize;
    loop {
        let lower = format!("__mallard_case_probe_{}", n);
        let upper = lower.to_ascii_uppercase();
        if !map.contains_key(&lower) && !map.contains_key(&upper) {
            return (lower, upper);
        }
        n += 1;
    }
}

/// Recursively copy a mapping into case-insensitive [`ValueMap`]s.
///
/// Nested mappings are normalized too. The visited table keys source
/// maps by pointer identity and maps each to its single copy, so shared
/// and self-referencing mappings keep their shape and the walk
/// terminates.
pub fn to_case_insensitive(handle: &MapHandle) -> MapHandle {
    let mut visited: FxHashMap<usize, MapHandle> = FxHashMap::default();
    normalize_map(handle, &mut visited)
}

pub(crate) fn map_identity(handle: &MapHandle) -> usize {
    Arc::as_ptr(handle) as *const () as usize
}

fn normalize_map(handle: &MapHandle, visited: &mut FxHashMap<usize, MapHandle>) -> MapHandle {
    let id = map_identity(handle);
    if let Some(copy) = visited.get(&id) {
        return copy.clone();
    }
    let copy = ValueMap::case_insensitive().into_handle();
    visited.insert(id, copy.clone());

    let entries: Vec<(String, Value)> = {
        let source = handle.read();
        source
            .keys()
            .into_iter()
            .filter_map(|key| source.get(&key).map(|value| (key, value)))
            .collect()
    };
    for (key, value) in entries {
        let value = match value {
            Value::Map(inner) => Value::Map(normalize_map(&inner, visited)),
            other => other,
        };
        copy.write().insert(&key, value);
    }
    copy
}

/// Insert the zero value of every missing contract property key.
///
/// Precondition for forced adaptation: afterwards every contract
/// property resolves against the mapping.
pub fn force_fill(handle: &MapHandle, descriptor: &ContractDescriptor) {
    let mut map = handle.write();
    for member in descriptor.members() {
        if member.kind != MemberKind::Property {
            continue;
        }
        if !map.contains_key(member.name) {
            map.insert(member.name, member.value_type.zero_value());
        }
    }
}

/// Resolve the stored key a member name refers to, honoring the mode.
///
/// Exact membership first; fuzzy mode falls back to a case-insensitive
/// scan so sensitive mappings reached through nesting still resolve.
pub fn lookup_key(map: &dyn Mapping, name: &str, mode: MatchMode) -> Option<String> {
    if map.contains_key(name) {
        return Some(name.to_string());
    }
    if mode.is_fuzzy() {
        return map
            .keys()
            .into_iter()
            .find(|key| key.eq_ignore_ascii_case(name));
    }
    None
}
