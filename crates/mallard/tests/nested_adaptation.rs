//! Integration tests for nested and re-entrant adaptation
//!
//! Contract-typed members adapt their values on first read and memoize
//! the instance per member until a write replaces the slot. Adapting an
//! already-adapted instance routes member access through the inner
//! instance's backing slots, bypassing the inner contract's direction
//! flags.

use std::sync::Arc;

use mallard::{
    AdaptError, Contract, ContractSpec, Describe, Engine, MapHandle, Mapping, MatchMode,
    SurfaceBuilder, TypeExpr, TypeSurface, Value, ValueMap,
};
use once_cell::sync::Lazy;

// ============================================================================
// Fixtures
// ============================================================================

struct Address {
    street: String,
    city: String,
}

impl Describe for Address {
    fn type_surface() -> &'static TypeSurface {
        static SURFACE: Lazy<TypeSurface> = Lazy::new(|| {
            SurfaceBuilder::<Address>::of("Address")
                .property(
                    "Street",
                    TypeExpr::Str,
                    |a: &Address| Value::from(a.street.clone()),
                    |a: &mut Address, v| a.street = v.as_str().unwrap_or("").to_string(),
                )
                .property(
                    "City",
                    TypeExpr::Str,
                    |a: &Address| Value::from(a.city.clone()),
                    |a: &mut Address, v| a.city = v.as_str().unwrap_or("").to_string(),
                )
                .finish()
        });
        &SURFACE
    }
}

struct Housed {
    name: String,
    address: Value,
}

impl Describe for Housed {
    fn type_surface() -> &'static TypeSurface {
        static SURFACE: Lazy<TypeSurface> = Lazy::new(|| {
            SurfaceBuilder::<Housed>::of("Housed")
                .readonly("Name", TypeExpr::Str, |h: &Housed| {
                    Value::from(h.name.clone())
                })
                .property(
                    "Address",
                    TypeExpr::object::<Address>(),
                    |h: &Housed| h.address.clone(),
                    |h: &mut Housed, v| h.address = v,
                )
                .finish()
        });
        &SURFACE
    }
}

struct Visitor {
    name: String,
    age: i64,
}

impl Describe for Visitor {
    fn type_surface() -> &'static TypeSurface {
        static SURFACE: Lazy<TypeSurface> = Lazy::new(|| {
            SurfaceBuilder::<Visitor>::of("Visitor")
                .property(
                    "Name",
                    TypeExpr::Str,
                    |v: &Visitor| Value::from(v.name.clone()),
                    |v: &mut Visitor, val| v.name = val.as_str().unwrap_or("").to_string(),
                )
                .property(
                    "Age",
                    TypeExpr::Int,
                    |v: &Visitor| Value::Int(v.age),
                    |v: &mut Visitor, val| v.age = val.as_int().unwrap_or(0),
                )
                .finish()
        });
        &SURFACE
    }
}

fn visitor() -> Value {
    Value::object(Visitor {
        name: "Ada".to_string(),
        age: 36,
    })
}

struct AddressLike;

impl Contract for AddressLike {
    fn contract_spec() -> &'static ContractSpec {
        static SPEC: Lazy<ContractSpec> = Lazy::new(|| {
            ContractSpec::build::<AddressLike>("AddressLike")
                .property("Street", TypeExpr::Str)
                .property("City", TypeExpr::Str)
                .finish()
        });
        &SPEC
    }
}

struct HousedLike;

impl Contract for HousedLike {
    fn contract_spec() -> &'static ContractSpec {
        static SPEC: Lazy<ContractSpec> = Lazy::new(|| {
            ContractSpec::build::<HousedLike>("HousedLike")
                .readonly("Name", TypeExpr::Str)
                .property("Address", TypeExpr::contract::<AddressLike>())
                .finish()
        });
        &SPEC
    }
}

struct Node;

impl Contract for Node {
    fn contract_spec() -> &'static ContractSpec {
        static SPEC: Lazy<ContractSpec> = Lazy::new(|| {
            ContractSpec::build::<Node>("Node")
                .property("Tag", TypeExpr::Str)
                .property("Next", TypeExpr::contract::<Node>())
                .finish()
        });
        &SPEC
    }
}

struct Wide;

impl Contract for Wide {
    fn contract_spec() -> &'static ContractSpec {
        static SPEC: Lazy<ContractSpec> = Lazy::new(|| {
            ContractSpec::build::<Wide>("Wide")
                .property("Name", TypeExpr::Str)
                .property("Age", TypeExpr::Int)
                .finish()
        });
        &SPEC
    }
}

struct Narrow;

impl Contract for Narrow {
    fn contract_spec() -> &'static ContractSpec {
        static SPEC: Lazy<ContractSpec> = Lazy::new(|| {
            ContractSpec::build::<Narrow>("Narrow")
                .property("Name", TypeExpr::Str)
                .finish()
        });
        &SPEC
    }
}

struct GuardedName;

impl Contract for GuardedName {
    fn contract_spec() -> &'static ContractSpec {
        static SPEC: Lazy<ContractSpec> = Lazy::new(|| {
            ContractSpec::build::<GuardedName>("GuardedName")
                .readonly("Name", TypeExpr::Str)
                .finish()
        });
        &SPEC
    }
}

struct OpenName;

impl Contract for OpenName {
    fn contract_spec() -> &'static ContractSpec {
        static SPEC: Lazy<ContractSpec> = Lazy::new(|| {
            ContractSpec::build::<OpenName>("OpenName")
                .property("Name", TypeExpr::Str)
                .finish()
        });
        &SPEC
    }
}

struct LowerName;

impl Contract for LowerName {
    fn contract_spec() -> &'static ContractSpec {
        static SPEC: Lazy<ContractSpec> = Lazy::new(|| {
            ContractSpec::build::<LowerName>("lower_name")
                .property("name", TypeExpr::Str)
                .finish()
        });
        &SPEC
    }
}

struct Reaching;

impl Contract for Reaching {
    fn contract_spec() -> &'static ContractSpec {
        static SPEC: Lazy<ContractSpec> = Lazy::new(|| {
            ContractSpec::build::<Reaching>("Reaching")
                .property("Name", TypeExpr::Str)
                .property("Email", TypeExpr::Str)
                .finish()
        });
        &SPEC
    }
}

struct AnyAge;

impl Contract for AnyAge {
    fn contract_spec() -> &'static ContractSpec {
        static SPEC: Lazy<ContractSpec> = Lazy::new(|| {
            ContractSpec::build::<AnyAge>("AnyAge")
                .property("Age", TypeExpr::Any)
                .finish()
        });
        &SPEC
    }
}

// ============================================================================
// Nested host objects
// ============================================================================

mod nested_objects {
    use super::*;

    fn housed() -> (Value, Value) {
        let address = Value::object(Address {
            street: "Baker St".to_string(),
            city: "London".to_string(),
        });
        let housed = Value::object(Housed {
            name: "Ada".to_string(),
            address: address.clone(),
        });
        (housed, address)
    }

    #[test]
    fn test_contract_member_adapts_the_nested_host() {
        let engine = Engine::new();
        let (housed, _) = housed();
        let view = engine.adapt_as::<HousedLike>(&housed).unwrap();
        let address = view.get("Address").unwrap();
        let address = address.as_adapted().expect("nested adapted instance");
        assert_eq!(address.get("Street").unwrap(), Value::from("Baker St"));
    }

    #[test]
    fn test_nested_instances_are_memoized() {
        let engine = Engine::new();
        let (housed, _) = housed();
        let view = engine.adapt_as::<HousedLike>(&housed).unwrap();
        let first = view.get("Address").unwrap();
        let second = view.get("Address").unwrap();
        let first = first.as_adapted().unwrap();
        let second = second.as_adapted().unwrap();
        assert!(Arc::ptr_eq(first, second));
    }

    #[test]
    fn test_nested_writes_reach_the_shared_host() {
        let engine = Engine::new();
        let (housed, address) = housed();
        let view = engine.adapt_as::<HousedLike>(&housed).unwrap();
        let nested = view.get("Address").unwrap();
        nested
            .as_adapted()
            .unwrap()
            .set("City", Value::from("Leeds"))
            .unwrap();
        // the nested instance wraps the same host the outer object holds
        let direct = engine.adapt_as::<AddressLike>(&address).unwrap();
        assert_eq!(direct.get("City").unwrap(), Value::from("Leeds"));
    }
}

// ============================================================================
// Nested mappings
// ============================================================================

mod nested_mappings {
    use super::*;

    fn address_map(street: &str) -> MapHandle {
        let mut map = ValueMap::case_sensitive();
        map.insert("Street", Value::from(street));
        map.insert("City", Value::from("London"));
        map.into_handle()
    }

    fn housed_map(address: &MapHandle) -> MapHandle {
        let mut map = ValueMap::case_sensitive();
        map.insert("Name", Value::from("Ada"));
        map.insert("Address", Value::Map(address.clone()));
        map.into_handle()
    }

    #[test]
    fn test_slot_replacement_invalidates_the_memo() {
        let engine = Engine::new();
        let handle = housed_map(&address_map("Baker St"));
        let view = engine
            .adapt_mapping::<HousedLike>(&handle, MatchMode::Strict)
            .unwrap();
        let first = view.get("Address").unwrap();
        let first = first.as_adapted().unwrap().clone();

        view.set("Address", Value::Map(address_map("Pine Ave")))
            .unwrap();
        let second = view.get("Address").unwrap();
        let second = second.as_adapted().unwrap();
        assert!(!Arc::ptr_eq(&first, second));
        assert_eq!(second.get("Street").unwrap(), Value::from("Pine Ave"));
    }

    #[test]
    fn test_unusable_slot_reads_null_until_repaired() {
        let engine = Engine::new();
        let handle = housed_map(&address_map("Baker St"));
        let view = engine
            .adapt_mapping::<HousedLike>(&handle, MatchMode::Strict)
            .unwrap();
        // mapping writes are typeless, so an unusable value can land
        view.set("Address", Value::Int(5)).unwrap();
        assert_eq!(view.get("Address").unwrap(), Value::Null);
        // the verdict is cached; repeated reads stay degraded
        assert_eq!(view.get("Address").unwrap(), Value::Null);

        view.set("Address", Value::Map(address_map("Pine Ave")))
            .unwrap();
        let repaired = view.get("Address").unwrap();
        let repaired = repaired.as_adapted().expect("slot usable again");
        assert_eq!(repaired.get("Street").unwrap(), Value::from("Pine Ave"));
    }

    #[test]
    fn test_null_slot_reads_null() {
        let engine = Engine::new();
        let handle = housed_map(&address_map("Baker St"));
        let view = engine
            .adapt_mapping::<HousedLike>(&handle, MatchMode::Strict)
            .unwrap();
        view.set("Address", Value::Null).unwrap();
        assert_eq!(view.get("Address").unwrap(), Value::Null);
    }

    #[test]
    fn test_cyclic_mappings_adapt_and_loop() {
        let engine = Engine::new();
        let a = ValueMap::case_sensitive().into_handle();
        let b = ValueMap::case_sensitive().into_handle();
        {
            let mut map = a.write();
            map.insert("Tag", Value::from("a"));
            map.insert("Next", Value::Map(b.clone()));
        }
        {
            let mut map = b.write();
            map.insert("Tag", Value::from("b"));
            map.insert("Next", Value::Map(a.clone()));
        }

        let start = engine.adapt_mapping::<Node>(&a, MatchMode::Strict).unwrap();
        let hop1 = start.get("Next").unwrap();
        let hop1 = hop1.as_adapted().unwrap().clone();
        assert_eq!(hop1.get("Tag").unwrap(), Value::from("b"));

        let hop2 = hop1.get("Next").unwrap();
        let hop2 = hop2.as_adapted().unwrap().clone();
        assert_eq!(hop2.get("Tag").unwrap(), Value::from("a"));
        // two hops land back on the starting mapping
        let source = hop2.source().as_mapping().unwrap();
        assert!(Arc::ptr_eq(source, &a));
    }
}

// ============================================================================
// Re-ducking through backing slots
// ============================================================================

mod re_ducking {
    use super::*;

    #[test]
    fn test_narrowing_reads_through_the_backing() {
        let engine = Engine::new();
        let wide = engine.adapt_as::<Wide>(&visitor()).unwrap();
        let narrow = engine
            .adapt_as::<Narrow>(&Value::Adapted(wide.handle().clone()))
            .unwrap();
        assert_eq!(narrow.get("Name").unwrap(), Value::from("Ada"));
    }

    #[test]
    fn test_backing_writes_reach_the_original_source() {
        let engine = Engine::new();
        let source = visitor();
        let wide = engine.adapt_as::<Wide>(&source).unwrap();
        let narrow = engine
            .adapt_as::<Narrow>(&Value::Adapted(wide.handle().clone()))
            .unwrap();
        narrow.set("Name", Value::from("Iris")).unwrap();
        assert_eq!(wide.get("Name").unwrap(), Value::from("Iris"));
        // and the host itself took the write
        let fresh = engine.adapt_as::<Wide>(&source).unwrap();
        assert_eq!(fresh.get("Name").unwrap(), Value::from("Iris"));
    }

    #[test]
    fn test_inner_direction_flags_are_bypassed() {
        let engine = Engine::new();
        let guarded = engine.adapt_as::<GuardedName>(&visitor()).unwrap();
        // the inner contract says read-only; writes through it fail
        let err = guarded.set("Name", Value::from("Iris")).unwrap_err();
        assert!(matches!(err, AdaptError::ReadOnlyProperty { .. }));

        // an outer contract re-ducked over it writes the backing directly
        let open = engine
            .adapt_as::<OpenName>(&Value::Adapted(guarded.handle().clone()))
            .unwrap();
        open.set("Name", Value::from("Iris")).unwrap();
        assert_eq!(guarded.get("Name").unwrap(), Value::from("Iris"));
    }

    #[test]
    fn test_backing_member_names_resolve_with_the_outer_mode() {
        let engine = Engine::new();
        let wide = engine.adapt_as::<Wide>(&visitor()).unwrap();
        let lower = engine
            .fuzzy_adapt_as::<LowerName>(&Value::Adapted(wide.handle().clone()))
            .unwrap();
        assert_eq!(lower.get("name").unwrap(), Value::from("Ada"));
        // strictly the casing does not line up
        let err = engine
            .adapt_as::<LowerName>(&Value::Adapted(wide.handle().clone()))
            .unwrap_err();
        assert!(matches!(err, AdaptError::NotAdaptable { .. }));
    }

    #[test]
    fn test_uncovered_member_is_not_adaptable() {
        let engine = Engine::new();
        let narrow = engine.adapt_as::<Narrow>(&visitor()).unwrap();
        let err = engine
            .adapt_as::<Reaching>(&narrow.into_value())
            .unwrap_err();
        assert!(matches!(err, AdaptError::NotAdaptable { .. }));
    }

    #[test]
    fn test_any_member_covers_any_inner_type() {
        let engine = Engine::new();
        let wide = engine.adapt_as::<Wide>(&visitor()).unwrap();
        let view = engine
            .adapt_as::<AnyAge>(&Value::Adapted(wide.handle().clone()))
            .unwrap();
        assert_eq!(view.get("Age").unwrap(), Value::Int(36));
    }

    #[test]
    fn test_missing_backing_key_reads_zero_and_writes_recreate_it() {
        let engine = Engine::new();
        let mut map = ValueMap::case_sensitive();
        map.insert("Name", Value::from("Ada"));
        map.insert("Age", Value::Int(36));
        let handle = map.into_handle();
        let wide = engine
            .adapt_mapping::<Wide>(&handle, MatchMode::Strict)
            .unwrap();
        let narrow = engine
            .adapt_as::<Narrow>(&Value::Adapted(wide.handle().clone()))
            .unwrap();

        handle.write().remove("Name");
        // a missing key behind a backing slot degrades instead of failing
        assert_eq!(narrow.get("Name").unwrap(), Value::from(""));

        narrow.set("Name", Value::from("Iris")).unwrap();
        assert_eq!(handle.read().get("Name"), Some(Value::from("Iris")));
        assert_eq!(wide.get("Name").unwrap(), Value::from("Iris"));
    }
}
