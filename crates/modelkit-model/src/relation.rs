//! Relation hooks.
//!
//! Relation loading and cascading is owned by an external registry. The
//! persistence layer only notifies it after each write and after a record
//! is built, and asks which properties hold relations so the descriptor can
//! reserve virtual placeholders for them.

use modelkit_core::{RelationCatalog, Result};

use crate::record::Record;

/// External relation registry.
pub trait RelationRegistry: Send + Sync {
    /// Whether `class` declares any relation.
    fn has_relation(&self, class: &str) -> bool;

    /// Property names that hold relations of `class`.
    fn relation_field_names(&self, class: &str) -> Vec<String>;

    /// Called after an insert attempt.
    fn insert_model(&self, record: &mut Record) -> Result<()>;

    /// Called after an update attempt.
    fn update_model(&self, record: &mut Record) -> Result<()>;

    /// Called after a physical delete attempt.
    fn delete_model(&self, record: &mut Record) -> Result<()>;

    /// Called when a record has been built.
    fn init_model(&self, record: &mut Record) -> Result<()>;
}

/// Registry without relations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRelations;

impl RelationRegistry for NoRelations {
    fn has_relation(&self, _class: &str) -> bool {
        false
    }

    fn relation_field_names(&self, _class: &str) -> Vec<String> {
        Vec::new()
    }

    fn insert_model(&self, _record: &mut Record) -> Result<()> {
        Ok(())
    }

    fn update_model(&self, _record: &mut Record) -> Result<()> {
        Ok(())
    }

    fn delete_model(&self, _record: &mut Record) -> Result<()> {
        Ok(())
    }

    fn init_model(&self, _record: &mut Record) -> Result<()> {
        Ok(())
    }
}

/// Compile-time view of a [`RelationRegistry`].
pub struct RelationCatalogAdapter<'a>(pub &'a dyn RelationRegistry);

impl RelationCatalog for RelationCatalogAdapter<'_> {
    fn has_relation(&self, class: &str) -> bool {
        self.0.has_relation(class)
    }

    fn relation_field_names(&self, class: &str) -> Vec<String> {
        self.0.relation_field_names(class)
    }
}
