//! Model declarations.
//!
//! A declaration is the explicit, strongly-typed statement of how a class
//! maps onto a table: the table itself, entity-level policies, one
//! [`FieldDescriptor`] per property, primary-key markers, serialization
//! rules and an optional soft-delete marker. Declarations are registered at
//! start-up and compiled on demand into a
//! [`ModelDescriptor`](crate::meta::ModelDescriptor).
//!
//! # Example
//!
//! ```ignore
//! let decl = ModelDeclaration::builder("app::Article")
//!     .table(TableSpec::new("tb_article").id(["id"]))
//!     .entity(EntitySpec::new().incremental_update(true))
//!     .column("id", FieldDescriptor::column("id", SemanticType::Int).auto_increment(true))
//!     .column("title", FieldDescriptor::column("title", SemanticType::Varchar).length(255))
//!     .build();
//! ```

use std::collections::HashMap;

use crate::field::{FieldDescriptor, JsonDecodeSpec, JsonEncodeSpec};
use crate::value::Value;

/// Per-property column declaration.
pub type ColumnSpec = FieldDescriptor;

/// Table-level declaration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSpec {
    /// Table name, optionally qualified as `database.table`.
    pub name: Option<String>,
    /// Explicit primary-key column list.
    pub id: Vec<String>,
    /// Connection pool name.
    pub pool: Option<String>,
    /// Whether the configured table prefix applies.
    pub use_prefix: bool,
}

impl TableSpec {
    /// Declare a table by name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the explicit primary-key columns.
    pub fn id<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.id = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the pool name.
    pub fn pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = Some(pool.into());
        self
    }

    /// Set whether the table prefix applies.
    pub fn use_prefix(mut self, value: bool) -> Self {
        self.use_prefix = value;
        self
    }
}

/// Entity-level policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySpec {
    /// Serialize property names in camel case.
    pub camel: bool,
    /// Whether lifecycle hooks fire for this model.
    pub live_object: bool,
    /// Omit unchanged fields from update payloads.
    pub incremental_update: bool,
}

impl EntitySpec {
    /// Defaults: camel case, live object, full updates.
    pub const fn new() -> Self {
        Self {
            camel: true,
            live_object: true,
            incremental_update: false,
        }
    }

    /// Set camel-case serialization.
    pub const fn camel(mut self, value: bool) -> Self {
        self.camel = value;
        self
    }

    /// Set whether lifecycle hooks fire.
    pub const fn live_object(mut self, value: bool) -> Self {
        self.live_object = value;
        self
    }

    /// Set incremental update mode.
    pub const fn incremental_update(mut self, value: bool) -> Self {
        self.incremental_update = value;
        self
    }
}

impl Default for EntitySpec {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of a property-level primary-key marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdIndex {
    /// Appended after the highest position seen so far.
    #[default]
    Auto,
    /// Explicit position; a later marker at the same position replaces an
    /// earlier one.
    At(usize),
    /// Not part of the primary key (the marker only carries a generator).
    Excluded,
}

/// Property-level primary-key marker, optionally with an ID generator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IdSpec {
    /// Position inside the primary key.
    pub index: IdIndex,
    /// Generator name applied on insert.
    pub generator: Option<String>,
    /// Options passed to the generator.
    pub generator_options: serde_json::Map<String, serde_json::Value>,
}

impl IdSpec {
    /// Marker appended in declaration order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marker at an explicit position.
    pub fn at(index: usize) -> Self {
        Self {
            index: IdIndex::At(index),
            ..Self::default()
        }
    }

    /// Marker that does not contribute to the primary key.
    pub fn excluded() -> Self {
        Self {
            index: IdIndex::Excluded,
            ..Self::default()
        }
    }

    /// Attach a generator.
    pub fn generator(mut self, name: impl Into<String>) -> Self {
        self.generator = Some(name.into());
        self
    }

    /// Add a generator option.
    pub fn option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.generator_options.insert(key.into(), value);
        self
    }
}

/// Whether a model-level serialization list allows or denies its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializableMode {
    /// Only listed fields are serialized.
    Allow,
    /// Listed fields are dropped.
    Deny,
}

/// Model-level serialization filter, matched against external names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializablesSpec {
    /// Allow or deny.
    pub mode: SerializableMode,
    /// External field names.
    pub fields: Vec<String>,
}

impl SerializablesSpec {
    /// Allow-list.
    pub fn allow<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: SerializableMode::Allow,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Deny-list.
    pub fn deny<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: SerializableMode::Deny,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// Soft-delete marker declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftDeleteSpec {
    /// Column holding the deletion marker.
    pub field: String,
    /// Marker value of a row that is not deleted.
    pub default: Value,
}

impl SoftDeleteSpec {
    /// Marker column with a `NULL` default.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            default: Value::Null,
        }
    }

    /// Set the not-deleted marker value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }
}

/// Everything declared about one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDeclaration {
    /// Fully qualified class name.
    pub class: String,
    /// Parent class, used by inherited descriptors.
    pub parent: Option<String>,
    /// Table declaration, absent for table-less models.
    pub table: Option<TableSpec>,
    /// Entity policies.
    pub entity: EntitySpec,
    /// Columns in declaration order, property name set.
    pub columns: Vec<FieldDescriptor>,
    /// Property-level primary-key markers.
    pub ids: Vec<(String, IdSpec)>,
    /// Per-property serialization overrides (`true` = allow).
    pub serializable: HashMap<String, bool>,
    /// Model-level serialization filter.
    pub serializables: Option<SerializablesSpec>,
    /// Soft-delete marker.
    pub soft_delete: Option<SoftDeleteSpec>,
    /// Model-level `json` encode policy.
    pub json_encode: Option<JsonEncodeSpec>,
    /// Model-level `json` decode policy.
    pub json_decode: Option<JsonDecodeSpec>,
}

impl ModelDeclaration {
    /// Start a declaration for `class`.
    pub fn builder(class: impl Into<String>) -> ModelDeclarationBuilder {
        ModelDeclarationBuilder {
            decl: ModelDeclaration {
                class: class.into(),
                parent: None,
                table: None,
                entity: EntitySpec::default(),
                columns: Vec::new(),
                ids: Vec::new(),
                serializable: HashMap::new(),
                serializables: None,
                soft_delete: None,
                json_encode: None,
                json_decode: None,
            },
        }
    }

    /// Primary-key marker for a property.
    pub fn id_spec(&self, property: &str) -> Option<&IdSpec> {
        self.ids
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, spec)| spec)
    }
}

/// Builder for [`ModelDeclaration`].
#[derive(Debug, Clone)]
pub struct ModelDeclarationBuilder {
    decl: ModelDeclaration,
}

impl ModelDeclarationBuilder {
    /// Set the parent class.
    pub fn parent(mut self, class: impl Into<String>) -> Self {
        self.decl.parent = Some(class.into());
        self
    }

    /// Set the table declaration.
    pub fn table(mut self, table: TableSpec) -> Self {
        self.decl.table = Some(table);
        self
    }

    /// Set the entity policies.
    pub fn entity(mut self, entity: EntitySpec) -> Self {
        self.decl.entity = entity;
        self
    }

    /// Declare a property backed by `column`.
    pub fn column(mut self, property: impl Into<String>, column: ColumnSpec) -> Self {
        self.decl.columns.push(column.property(property));
        self
    }

    /// Attach a primary-key marker to a property.
    pub fn id(mut self, property: impl Into<String>, spec: IdSpec) -> Self {
        self.decl.ids.push((property.into(), spec));
        self
    }

    /// Per-property serialization override.
    pub fn serializable(mut self, property: impl Into<String>, allow: bool) -> Self {
        self.decl.serializable.insert(property.into(), allow);
        self
    }

    /// Model-level serialization filter.
    pub fn serializables(mut self, spec: SerializablesSpec) -> Self {
        self.decl.serializables = Some(spec);
        self
    }

    /// Declare the soft-delete marker.
    pub fn soft_delete(mut self, spec: SoftDeleteSpec) -> Self {
        self.decl.soft_delete = Some(spec);
        self
    }

    /// Model-level `json` encode policy; columns may override it.
    pub fn json_encode(mut self, spec: JsonEncodeSpec) -> Self {
        self.decl.json_encode = Some(spec);
        self
    }

    /// Model-level `json` decode policy; columns may override it.
    pub fn json_decode(mut self, spec: JsonDecodeSpec) -> Self {
        self.decl.json_decode = Some(spec);
        self
    }

    /// Finish the declaration.
    pub fn build(self) -> ModelDeclaration {
        self.decl
    }
}

/// Source of model declarations, looked up by class name.
pub trait DeclarationProvider: Send + Sync {
    /// Declaration registered for `class`.
    fn declaration(&self, class: &str) -> Option<&ModelDeclaration>;
}

/// In-memory declaration registry.
#[derive(Debug, Clone, Default)]
pub struct DeclarationSet {
    declarations: HashMap<String, ModelDeclaration>,
}

impl DeclarationSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration, replacing any previous one for the class.
    pub fn register(&mut self, declaration: ModelDeclaration) {
        self.declarations
            .insert(declaration.class.clone(), declaration);
    }

    /// Builder-style `register`.
    pub fn with(mut self, declaration: ModelDeclaration) -> Self {
        self.register(declaration);
        self
    }

    /// Registered class names.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.declarations.keys().map(String::as_str)
    }
}

impl DeclarationProvider for DeclarationSet {
    fn declaration(&self, class: &str) -> Option<&ModelDeclaration> {
        self.declarations.get(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SemanticType;

    #[test]
    fn test_builder_assigns_property_names() {
        let decl = ModelDeclaration::builder("app::Member")
            .table(TableSpec::new("tb_member").id(["id"]).pool("main"))
            .column(
                "id",
                FieldDescriptor::column("id", SemanticType::Int).auto_increment(true),
            )
            .column(
                "userName",
                FieldDescriptor::column("user_name", SemanticType::Varchar),
            )
            .build();

        assert_eq!(decl.columns[1].property_name, "userName");
        assert_eq!(decl.columns[1].db_name.as_deref(), Some("user_name"));
        let table = decl.table.as_ref().unwrap();
        assert_eq!(table.id, vec!["id".to_string()]);
        assert_eq!(table.pool.as_deref(), Some("main"));
        assert!(decl.entity.camel);
        assert!(decl.entity.live_object);
        assert!(!decl.entity.incremental_update);
    }

    #[test]
    fn test_declaration_set_lookup() {
        let set = DeclarationSet::new()
            .with(ModelDeclaration::builder("a::A").build())
            .with(ModelDeclaration::builder("a::B").parent("a::A").build());

        assert!(set.declaration("a::A").is_some());
        assert_eq!(
            set.declaration("a::B").and_then(|d| d.parent.as_deref()),
            Some("a::A")
        );
        assert!(set.declaration("a::C").is_none());
    }

    #[test]
    fn test_id_spec_lookup() {
        let decl = ModelDeclaration::builder("app::Pair")
            .id("b", IdSpec::at(1).generator("uuid"))
            .id("a", IdSpec::at(0))
            .build();
        let spec = decl.id_spec("b").unwrap();
        assert_eq!(spec.index, IdIndex::At(1));
        assert_eq!(spec.generator.as_deref(), Some("uuid"));
        assert!(decl.id_spec("c").is_none());
    }
}
