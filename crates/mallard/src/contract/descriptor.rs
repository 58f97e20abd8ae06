//! Flattened contract descriptors and their cache.
//!
//! A descriptor is one contract's full member set (own members plus the
//! transitive closure of everything it extends) with a lookup table
//! normalized for one [`MatchMode`]. Flattening runs at most once per
//! (contract, mode) pair.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::contract::{ContractSpec, MemberDecl};
use crate::error::{AdaptError, AdaptResult};
use crate::types::{ContractKey, MatchMode};

/// A contract flattened over its extension graph.
#[derive(Debug)]
pub struct ContractDescriptor {
    key: ContractKey,
    mode: MatchMode,
    members: Vec<MemberDecl>,
    by_name: FxHashMap<String, usize>,
}

impl ContractDescriptor {
    fn build(key: ContractKey, mode: MatchMode) -> AdaptResult<Self> {
        let mut members: Vec<MemberDecl> = Vec::new();
        let mut visited: FxHashSet<TypeId> = FxHashSet::default();
        collect(key.spec(), mode, key, &mut visited, &mut members)?;

        let mut by_name = FxHashMap::default();
        for (idx, member) in members.iter().enumerate() {
            by_name.insert(normalize(member.name, mode), idx);
        }
        Ok(ContractDescriptor {
            key,
            mode,
            members,
            by_name,
        })
    }

    /// The contract this descriptor flattens.
    pub fn key(&self) -> ContractKey {
        self.key
    }

    /// Declared contract name.
    pub fn name(&self) -> &'static str {
        self.key.name()
    }

    /// The mode the lookup table is normalized for.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Flattened members: own first, then inherited, duplicates
    /// collapsed.
    pub fn members(&self) -> &[MemberDecl] {
        &self.members
    }

    /// Resolve a member name under this descriptor's own mode.
    pub fn member(&self, name: &str) -> Option<&MemberDecl> {
        let idx = match self.mode {
            MatchMode::Strict => self.by_name.get(name).copied(),
            MatchMode::Fuzzy => self.by_name.get(&name.to_ascii_lowercase()).copied(),
        }?;
        self.members.get(idx)
    }

    /// Resolve under an arbitrary mode. Cross-mode lookups (backing
    /// access on instances adapted in the other mode) fall back to a
    /// linear scan.
    pub fn member_with_mode(&self, name: &str, mode: MatchMode) -> Option<&MemberDecl> {
        if mode == self.mode {
            return self.member(name);
        }
        match mode {
            MatchMode::Strict => self.members.iter().find(|m| m.name == name),
            MatchMode::Fuzzy => self.members.iter().find(|m| m.name.eq_ignore_ascii_case(name)),
        }
    }
}

fn normalize(name: &str, mode: MatchMode) -> String {
    match mode {
        MatchMode::Strict => name.to_string(),
        MatchMode::Fuzzy => name.to_ascii_lowercase(),
    }
}

/// Walk the extension graph depth-first, own members before inherited
/// ones. Identical duplicate signatures collapse onto the first
/// occurrence; conflicting ones are ambiguous.
fn collect(
    spec: &'static ContractSpec,
    mode: MatchMode,
    root: ContractKey,
    visited: &mut FxHashSet<TypeId>,
    members: &mut Vec<MemberDecl>,
) -> AdaptResult<()> {
    if !visited.insert(spec.id()) {
        return Ok(());
    }
    for member in spec.members() {
        match members
            .iter()
            .find(|m| normalize(m.name, mode) == normalize(member.name, mode))
        {
            None => members.push(member.clone()),
            Some(existing) if existing.signature_eq(member) => {}
            Some(_) => {
                return Err(AdaptError::AmbiguousContract {
                    contract: root.name().to_string(),
                    member: member.name.to_string(),
                })
            }
        }
    }
    for parent in spec.extends() {
        collect(parent, mode, root, visited, members)?;
    }
    Ok(())
}

/// Cache of flattened descriptors, keyed by contract and mode.
pub struct DescriptorCache {
    entries: DashMap<(TypeId, MatchMode), Arc<ContractDescriptor>>,
}

impl DescriptorCache {
    /// Empty cache.
    pub fn new() -> Self {
        DescriptorCache {
            entries: DashMap::new(),
        }
    }

    /// The flattened descriptor for `(key, mode)`, building it on first
    /// use.
    pub fn describe(
        &self,
        key: ContractKey,
        mode: MatchMode,
    ) -> AdaptResult<Arc<ContractDescriptor>> {
        if let Some(found) = self.entries.get(&(key.id(), mode)) {
            return Ok(found.value().clone());
        }
        let built = Arc::new(ContractDescriptor::build(key, mode)?);
        Ok(self
            .entries
            .entry((key.id(), mode))
            .or_insert(built)
            .value()
            .clone())
    }
}

impl Default for DescriptorCache {
    fn default() -> Self {
        Self::new()
    }
}
