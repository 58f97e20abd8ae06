//! Converter registry: implicit value conversions between runtime types.
//!
//! Converters are keyed by exact `(from, to)` pairs and never chain. A
//! converter is total over its source key; a conversion that fails at
//! runtime (an unparseable string, say) yields the target's zero value.

use std::sync::Arc;

use dashmap::DashMap;

use crate::value::{TypeKey, Value};

/// A registered conversion closure.
pub type ConvertFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Converter table keyed by `(from, to)` runtime type pairs.
pub struct ConverterRegistry {
    table: DashMap<(TypeKey, TypeKey), ConvertFn>,
}

impl ConverterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        ConverterRegistry {
            table: DashMap::new(),
        }
    }

    /// Registry primed with the built-in primitive conversions:
    /// Int↔Float, Int↔Str, Float↔Str, and Bool↔Str.
    pub fn with_defaults() -> Self {
        let registry = Self::new();

        registry.register(TypeKey::Int, TypeKey::Float, |v| {
            Value::Float(v.as_int().unwrap_or(0) as f64)
        });
        registry.register(TypeKey::Float, TypeKey::Int, |v| {
            // truncates toward zero
            Value::Int(v.as_float().unwrap_or(0.0) as i64)
        });

        registry.register(TypeKey::Int, TypeKey::Str, |v| {
            Value::from(v.as_int().unwrap_or(0).to_string())
        });
        registry.register(TypeKey::Str, TypeKey::Int, |v| {
            Value::Int(
                v.as_str()
                    .and_then(|s| s.trim().parse::<i64>().ok())
                    .unwrap_or(0),
            )
        });

        registry.register(TypeKey::Float, TypeKey::Str, |v| {
            Value::from(v.as_float().unwrap_or(0.0).to_string())
        });
        registry.register(TypeKey::Str, TypeKey::Float, |v| {
            Value::Float(
                v.as_str()
                    .and_then(|s| s.trim().parse::<f64>().ok())
                    .unwrap_or(0.0),
            )
        });

        registry.register(TypeKey::Bool, TypeKey::Str, |v| {
            Value::from(if v.as_bool().unwrap_or(false) {
                "true"
            } else {
                "false"
            })
        });
        registry.register(TypeKey::Str, TypeKey::Bool, |v| {
            Value::Bool(
                v.as_str()
                    .map(|s| s.trim().eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
            )
        });

        registry
    }

    /// Register a conversion, replacing any existing one for the pair.
    pub fn register<F>(&self, from: TypeKey, to: TypeKey, convert: F)
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.table.insert((from, to), Arc::new(convert));
    }

    /// The converter for an exact pair, if registered.
    pub fn find(&self, from: TypeKey, to: TypeKey) -> Option<ConvertFn> {
        self.table.get(&(from, to)).map(|entry| entry.value().clone())
    }

    /// Whether an exact pair is registered.
    pub fn has(&self, from: TypeKey, to: TypeKey) -> bool {
        self.table.contains_key(&(from, to))
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
