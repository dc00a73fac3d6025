//! Read-only views of the relation and generator registries.
//!
//! Descriptor compilation only needs to ask whether a class has relations
//! and whether a generator name exists. The full registries live in
//! `modelkit-model`; these traits keep the core independent of them.

/// Relation lookups used during compilation.
pub trait RelationCatalog: Send + Sync {
    /// Whether `class` declares any relation.
    fn has_relation(&self, class: &str) -> bool;

    /// Property names that hold relations of `class`.
    fn relation_field_names(&self, class: &str) -> Vec<String>;
}

/// Generator lookups used during compilation.
pub trait GeneratorCatalog: Send + Sync {
    /// Whether a generator is registered under `name`.
    fn contains(&self, name: &str) -> bool;
}

/// Catalog without relations or generators.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCatalog;

impl RelationCatalog for NoCatalog {
    fn has_relation(&self, _class: &str) -> bool {
        false
    }

    fn relation_field_names(&self, _class: &str) -> Vec<String> {
        Vec::new()
    }
}

impl GeneratorCatalog for NoCatalog {
    fn contains(&self, _name: &str) -> bool {
        false
    }
}
