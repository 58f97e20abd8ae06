//! Registered member surfaces for host types.
//!
//! A host type exposes its members through a static [`TypeSurface`]
//! built once with [`SurfaceBuilder`]. Property access and method
//! dispatch run through erased closures over the concrete type, so no
//! runtime code generation is involved anywhere in the engine.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{AdaptError, AdaptResult};
use crate::types::TypeExpr;
use crate::value::Value;

/// Erased property getter.
pub type GetterFn = Arc<dyn Fn(&dyn Reflective) -> Value + Send + Sync>;

/// Erased property setter.
pub type SetterFn = Arc<dyn Fn(&mut dyn Reflective, Value) + Send + Sync>;

/// Erased method invoker.
pub type InvokeFn = Arc<dyn Fn(&mut dyn Reflective, Vec<Value>) -> AdaptResult<Value> + Send + Sync>;

/// A declared property: type plus optional accessor closures.
///
/// Readability and writability are exactly the presence of the getter
/// and setter.
pub struct PropertySpec {
    /// Property name
    pub name: &'static str,
    /// Declared value type
    pub value_type: TypeExpr,
    /// Getter, present when the property is readable
    pub getter: Option<GetterFn>,
    /// Setter, present when the property is writable
    pub setter: Option<SetterFn>,
}

impl PropertySpec {
    /// Whether the property can be read.
    pub fn readable(&self) -> bool {
        self.getter.is_some()
    }

    /// Whether the property can be written.
    pub fn writable(&self) -> bool {
        self.setter.is_some()
    }
}

impl fmt::Debug for PropertySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySpec")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("readable", &self.readable())
            .field("writable", &self.writable())
            .finish()
    }
}

/// A declared method: signature plus invoker closure.
pub struct MethodSpec {
    /// Method name
    pub name: &'static str,
    /// Positional parameter types
    pub params: Vec<TypeExpr>,
    /// Return type
    pub returns: TypeExpr,
    /// Erased invoker
    pub invoke: InvokeFn,
}

impl fmt::Debug for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSpec")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish()
    }
}

/// Statically declared member surface of a host type.
pub struct TypeSurface {
    /// Type name as registered
    pub name: &'static str,
    /// Concrete `TypeId` of the host type
    pub id: TypeId,
    /// Declared properties
    pub properties: Vec<PropertySpec>,
    /// Declared methods
    pub methods: Vec<MethodSpec>,
}

impl fmt::Debug for TypeSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSurface")
            .field("name", &self.name)
            .field("properties", &self.properties.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Object-safe runtime face of a host type.
///
/// Blanket-implemented for every [`Describe`] type; the engine only ever
/// sees hosts through this trait.
pub trait Reflective: Any + Send + Sync {
    /// The type's registered member surface.
    fn surface(&self) -> &'static TypeSurface;

    /// Upcast used by accessor closures to reach the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast used by setters and invokers.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Static schema registration for a host type.
///
/// Implementations build their surface once behind a
/// `once_cell::sync::Lazy` static:
///
/// ```rust,ignore
/// impl Describe for Traveller {
///     fn type_surface() -> &'static TypeSurface {
///         static SURFACE: Lazy<TypeSurface> = Lazy::new(|| {
///             SurfaceBuilder::<Traveller>::of("Traveller")
///                 .readonly("Name", TypeExpr::Str, |t| Value::from(t.name.clone()))
///                 .finish()
///         });
///         &SURFACE
///     }
/// }
/// ```
pub trait Describe: Sized + Send + Sync + 'static {
    /// The type's surface, built once for the process lifetime.
    fn type_surface() -> &'static TypeSurface;
}

impl<T: Describe> Reflective for T {
    fn surface(&self) -> &'static TypeSurface {
        T::type_surface()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Builder for a host type's surface.
///
/// Accessors are written against the concrete type and erased
/// internally. A repeated member name keeps the first declaration.
pub struct SurfaceBuilder<T: Describe> {
    name: &'static str,
    properties: Vec<PropertySpec>,
    methods: Vec<MethodSpec>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Describe> SurfaceBuilder<T> {
    /// Start a surface for `T` under the given type name.
    pub fn of(name: &'static str) -> Self {
        SurfaceBuilder {
            name,
            properties: Vec::new(),
            methods: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Add a readable, writable property.
    pub fn property<G, S>(self, name: &'static str, value_type: TypeExpr, get: G, set: S) -> Self
    where
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&mut T, Value) + Send + Sync + 'static,
    {
        self.push_property(PropertySpec {
            name,
            value_type,
            getter: Some(erase_getter(get)),
            setter: Some(erase_setter(set)),
        })
    }

    /// Add a read-only property.
    pub fn readonly<G>(self, name: &'static str, value_type: TypeExpr, get: G) -> Self
    where
        G: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.push_property(PropertySpec {
            name,
            value_type,
            getter: Some(erase_getter(get)),
            setter: None,
        })
    }

    /// Add a write-only property.
    pub fn writeonly<S>(self, name: &'static str, value_type: TypeExpr, set: S) -> Self
    where
        S: Fn(&mut T, Value) + Send + Sync + 'static,
    {
        self.push_property(PropertySpec {
            name,
            value_type,
            getter: None,
            setter: Some(erase_setter(set)),
        })
    }

    /// Add a method with positional parameters.
    pub fn method<F>(
        mut self,
        name: &'static str,
        params: Vec<TypeExpr>,
        returns: TypeExpr,
        body: F,
    ) -> Self
    where
        F: Fn(&mut T, Vec<Value>) -> AdaptResult<Value> + Send + Sync + 'static,
    {
        if self.methods.iter().any(|m| m.name == name) {
            return self;
        }
        self.methods.push(MethodSpec {
            name,
            params,
            returns,
            invoke: erase_invoker(name, body),
        });
        self
    }

    /// Finalize the surface.
    pub fn finish(self) -> TypeSurface {
        TypeSurface {
            name: self.name,
            id: TypeId::of::<T>(),
            properties: self.properties,
            methods: self.methods,
        }
    }

    fn push_property(mut self, prop: PropertySpec) -> Self {
        if self.properties.iter().any(|p| p.name == prop.name) {
            return self;
        }
        self.properties.push(prop);
        self
    }
}

fn erase_getter<T, G>(get: G) -> GetterFn
where
    T: Describe,
    G: Fn(&T) -> Value + Send + Sync + 'static,
{
    Arc::new(move |host: &dyn Reflective| match host.as_any().downcast_ref::<T>() {
        Some(typed) => get(typed),
        None => Value::Null,
    })
}

fn erase_setter<T, S>(set: S) -> SetterFn
where
    T: Describe,
    S: Fn(&mut T, Value) + Send + Sync + 'static,
{
    Arc::new(move |host: &mut dyn Reflective, value: Value| {
        if let Some(typed) = host.as_any_mut().downcast_mut::<T>() {
            set(typed, value);
        }
    })
}

fn erase_invoker<T, F>(name: &'static str, body: F) -> InvokeFn
where
    T: Describe,
    F: Fn(&mut T, Vec<Value>) -> AdaptResult<Value> + Send + Sync + 'static,
{
    Arc::new(
        move |host: &mut dyn Reflective, args: Vec<Value>| match host
            .as_any_mut()
            .downcast_mut::<T>()
        {
            Some(typed) => body(typed, args),
            None => Err(AdaptError::MethodFailed {
                method: name.to_string(),
                message: "receiver type mismatch".to_string(),
            }),
        },
    )
}
