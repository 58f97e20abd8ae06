//! Contract declarations: the named, typed member sets sources are
//! adapted to.
//!
//! A contract is a unit struct implementing [`Contract`] with a static
//! declaration built through [`SpecBuilder`]. Contracts can extend other
//! contracts; the flattened view lives in
//! [`descriptor::ContractDescriptor`].

pub mod descriptor;

pub use descriptor::{ContractDescriptor, DescriptorCache};

use std::any::TypeId;
use std::fmt;

use crate::types::TypeExpr;

/// Marker trait declaring a contract type.
///
/// ```rust,ignore
/// struct NamedContract;
///
/// impl Contract for NamedContract {
///     fn contract_spec() -> &'static ContractSpec {
///         static SPEC: Lazy<ContractSpec> = Lazy::new(|| {
///             ContractSpec::build::<NamedContract>("Named")
///                 .property("Name", TypeExpr::Str)
///                 .finish()
///         });
///         &SPEC
///     }
/// }
/// ```
pub trait Contract: Sized + Send + Sync + 'static {
    /// The contract's static declaration.
    fn contract_spec() -> &'static ContractSpec;
}

/// Kind of a declared member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// Readable and/or writable named value
    Property,
    /// Invokable named operation
    Method,
}

/// One declared contract member.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDecl {
    /// Member name
    pub name: &'static str,
    /// Property or method
    pub kind: MemberKind,
    /// Property value type, or method return type
    pub value_type: TypeExpr,
    /// Whether property reads are part of the contract
    pub readable: bool,
    /// Whether property writes are part of the contract
    pub writable: bool,
    /// Positional parameter types (methods only)
    pub params: Vec<TypeExpr>,
}

impl MemberDecl {
    /// Signature equality ignoring the member name. Used when flattening
    /// collapses duplicate declarations.
    pub fn signature_eq(&self, other: &MemberDecl) -> bool {
        self.kind == other.kind
            && self.value_type == other.value_type
            && self.readable == other.readable
            && self.writable == other.writable
            && self.params == other.params
    }
}

/// Static declaration of a contract: own members plus links to the
/// contracts it extends.
pub struct ContractSpec {
    name: &'static str,
    id: TypeId,
    extends: Vec<fn() -> &'static ContractSpec>,
    members: Vec<MemberDecl>,
}

impl ContractSpec {
    /// Start a declaration for contract `C` under the given name.
    pub fn build<C: Contract>(name: &'static str) -> SpecBuilder {
        SpecBuilder {
            name,
            id: TypeId::of::<C>(),
            extends: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Declared contract name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The contract's `TypeId`.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Own member declarations, in declaration order.
    pub fn members(&self) -> &[MemberDecl] {
        &self.members
    }

    /// Directly extended contracts.
    pub fn extends(&self) -> impl Iterator<Item = &'static ContractSpec> + '_ {
        self.extends.iter().map(|link| link())
    }
}

impl fmt::Debug for ContractSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractSpec")
            .field("name", &self.name)
            .field("members", &self.members.len())
            .field("extends", &self.extends.len())
            .finish()
    }
}

/// Builder for a [`ContractSpec`].
pub struct SpecBuilder {
    name: &'static str,
    id: TypeId,
    extends: Vec<fn() -> &'static ContractSpec>,
    members: Vec<MemberDecl>,
}

impl SpecBuilder {
    /// Extend another contract; its members are inherited on flattening.
    pub fn extends<P: Contract>(mut self) -> Self {
        self.extends.push(P::contract_spec);
        self
    }

    /// Readable, writable property.
    pub fn property(self, name: &'static str, value_type: TypeExpr) -> Self {
        self.push(name, value_type, true, true)
    }

    /// Read-only property.
    pub fn readonly(self, name: &'static str, value_type: TypeExpr) -> Self {
        self.push(name, value_type, true, false)
    }

    /// Write-only property.
    pub fn writeonly(self, name: &'static str, value_type: TypeExpr) -> Self {
        self.push(name, value_type, false, true)
    }

    /// Method with positional parameters.
    pub fn method(mut self, name: &'static str, params: Vec<TypeExpr>, returns: TypeExpr) -> Self {
        self.members.push(MemberDecl {
            name,
            kind: MemberKind::Method,
            value_type: returns,
            readable: false,
            writable: false,
            params,
        });
        self
    }

    /// Finalize the declaration.
    pub fn finish(self) -> ContractSpec {
        ContractSpec {
            name: self.name,
            id: self.id,
            extends: self.extends,
            members: self.members,
        }
    }

    fn push(mut self, name: &'static str, value_type: TypeExpr, readable: bool, writable: bool) -> Self {
        self.members.push(MemberDecl {
            name,
            kind: MemberKind::Property,
            value_type,
            readable,
            writable,
            params: Vec::new(),
        });
        self
    }
}
