//! Runtime reflection over registered host-type schemas.
//!
//! Host types declare a closure-based member surface once; the cache
//! derives strict and fuzzy lookup tables from it at most once per type.

pub mod cache;
pub mod surface;

pub use cache::{MetadataCache, SourceMembers};
pub use surface::{
    Describe, GetterFn, InvokeFn, MethodSpec, PropertySpec, Reflective, SetterFn, SurfaceBuilder,
    TypeSurface,
};
