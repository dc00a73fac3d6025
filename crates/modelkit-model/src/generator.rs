//! Named ID generation strategies.

use std::collections::HashMap;
use std::sync::Arc;

use modelkit_core::{GeneratorCatalog, Result, Value};

use crate::record::Record;

/// Produces a value for a field with an ID generator on insert.
pub trait IdGenerator: Send + Sync {
    /// Generate a new identifier.
    ///
    /// `record` is the record being saved, when there is one; `options`
    /// are the generator options declared on the field.
    fn generate(
        &self,
        record: Option<&Record>,
        options: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Value>;
}

impl<F> IdGenerator for F
where
    F: Fn(Option<&Record>, &serde_json::Map<String, serde_json::Value>) -> Result<Value>
        + Send
        + Sync,
{
    fn generate(
        &self,
        record: Option<&Record>,
        options: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Value> {
        self(record, options)
    }
}

/// Random v4 UUIDs in hyphenated form.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(
        &self,
        _record: Option<&Record>,
        _options: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Value> {
        Ok(Value::Text(uuid::Uuid::new_v4().to_string()))
    }
}

/// Generators by name.
#[derive(Clone)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Arc<dyn IdGenerator>>,
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("names", &self.generators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneratorRegistry {
    /// Registry with the built-in `uuid` generator.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("uuid", UuidGenerator);
        registry
    }

    /// Registry without generators.
    pub fn empty() -> Self {
        Self {
            generators: HashMap::new(),
        }
    }

    /// Register `generator` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, generator: impl IdGenerator + 'static) {
        self.generators.insert(name.into(), Arc::new(generator));
    }

    /// Generator registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn IdGenerator>> {
        self.generators.get(name)
    }
}

impl GeneratorCatalog for GeneratorRegistry {
    fn contains(&self, name: &str) -> bool {
        self.generators.contains_key(name)
    }
}
