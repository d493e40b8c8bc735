//! Named value transformers that take over attribute conversion.

use super::NativeValue;
use entimap_codec::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A reversible conversion between external values and native values.
///
/// When an attribute names a registered transformer, the transformer owns
/// both directions and the built-in coercion rules are skipped.
pub trait ValueTransformer: Send + Sync {
    /// External to native. `None` means the value cannot be converted.
    fn transform(&self, value: &Value) -> Option<NativeValue>;

    /// Native to external. `None` exports as null.
    fn reverse_transform(&self, value: &NativeValue) -> Option<Value>;
}

/// A transformer built from a pair of closures.
pub struct FnTransformer<F, R> {
    forward: F,
    reverse: R,
}

impl<F, R> FnTransformer<F, R>
where
    F: Fn(&Value) -> Option<NativeValue> + Send + Sync,
    R: Fn(&NativeValue) -> Option<Value> + Send + Sync,
{
    /// Creates a transformer from its two directions.
    pub fn new(forward: F, reverse: R) -> Self {
        Self { forward, reverse }
    }
}

impl<F, R> ValueTransformer for FnTransformer<F, R>
where
    F: Fn(&Value) -> Option<NativeValue> + Send + Sync,
    R: Fn(&NativeValue) -> Option<Value> + Send + Sync,
{
    fn transform(&self, value: &Value) -> Option<NativeValue> {
        (self.forward)(value)
    }

    fn reverse_transform(&self, value: &NativeValue) -> Option<Value> {
        (self.reverse)(value)
    }
}

/// Transformers by name.
#[derive(Clone, Default)]
pub struct TransformerRegistry {
    transformers: HashMap<String, Arc<dyn ValueTransformer>>,
}

impl TransformerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transformer, replacing any previous one with this name.
    pub fn register(&mut self, name: impl Into<String>, transformer: impl ValueTransformer + 'static) {
        self.transformers.insert(name.into(), Arc::new(transformer));
    }

    /// Registers a transformer built from closures.
    pub fn register_fn<F, R>(&mut self, name: impl Into<String>, forward: F, reverse: R)
    where
        F: Fn(&Value) -> Option<NativeValue> + Send + Sync + 'static,
        R: Fn(&NativeValue) -> Option<Value> + Send + Sync + 'static,
    {
        self.register(name, FnTransformer::new(forward, reverse));
    }

    /// Looks up a transformer.
    pub fn get(&self, name: &str) -> Option<&dyn ValueTransformer> {
        self.transformers.get(name).map(|t| t.as_ref())
    }

    /// Number of registered transformers.
    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.transformers.keys().collect();
        names.sort();
        f.debug_struct("TransformerRegistry")
            .field("transformers", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let mut registry = TransformerRegistry::new();
        assert!(registry.is_empty());
        registry.register_fn(
            "upper",
            |v| v.as_text().map(|s| NativeValue::String(s.to_uppercase())),
            |n| n.as_str().map(|s| Value::from(s.to_lowercase())),
        );
        assert_eq!(registry.len(), 1);

        let upper = registry.get("upper").unwrap();
        assert_eq!(
            upper.transform(&Value::from("abc")),
            Some(NativeValue::String("ABC".into()))
        );
        assert_eq!(
            upper.reverse_transform(&NativeValue::String("ABC".into())),
            Some(Value::from("abc"))
        );
        assert!(registry.get("lower").is_none());
        assert_eq!(format!("{registry:?}"), r#"TransformerRegistry { transformers: ["upper"] }"#);
    }
}
