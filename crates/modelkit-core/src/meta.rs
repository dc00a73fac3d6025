//! Compiled model descriptors.
//!
//! [`ModelDescriptor::compile`] turns a [`ModelDeclaration`] into the
//! immutable metadata every record, query and save operation reads:
//! resolved table and pool, ordered primary keys, field indexes by property
//! and column name, serialization names and the entity policies.
//!
//! Compilation validates the declaration. Any structural problem (unknown
//! generator, timestamp role on a non-temporal column, malformed
//! identifier, duplicate column) is a [`Error::Configuration`] and is never
//! retried.

use std::collections::{BTreeMap, HashMap};

use crate::catalog::{GeneratorCatalog, RelationCatalog};
use crate::config::ConfigProvider;
use crate::declare::{
    DeclarationProvider, IdIndex, IdSpec, ModelDeclaration, SerializableMode, SerializablesSpec,
    SoftDeleteSpec,
};
use crate::error::{Error, Result};
use crate::field::{FieldDescriptor, JsonDecodeSpec, JsonEncodeSpec};
use crate::naming::{is_valid_identifier, to_camel};

/// Collaborators consulted while compiling a descriptor.
#[derive(Clone, Copy)]
pub struct CompileContext<'a> {
    /// Declaration lookup.
    pub declarations: &'a dyn DeclarationProvider,
    /// Named configuration.
    pub config: &'a dyn ConfigProvider,
    /// Relation lookup.
    pub relations: &'a dyn RelationCatalog,
    /// Generator lookup.
    pub generators: &'a dyn GeneratorCatalog,
}

impl std::fmt::Debug for CompileContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileContext").finish_non_exhaustive()
    }
}

/// Immutable, shared metadata for one model class.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    class_name: String,
    real_class_name: String,
    inherit: bool,
    database_name: Option<String>,
    table_name: Option<String>,
    use_prefix: bool,
    pool_name: Option<String>,
    primary_keys: Vec<String>,
    id_markers: Vec<(String, IdSpec)>,
    fields: Vec<FieldDescriptor>,
    field_index: HashMap<String, usize>,
    db_index: HashMap<String, usize>,
    serializable_field_names: Vec<(String, String)>,
    parsed_serializable_field_names: Vec<String>,
    serializables: Option<SerializablesSpec>,
    auto_increment_field: Option<String>,
    has_relation: bool,
    incremental_update: bool,
    live_object: bool,
    camel: bool,
    soft_delete: Option<SoftDeleteSpec>,
    json_encode: Option<JsonEncodeSpec>,
    json_decode: Option<JsonDecodeSpec>,
}

/// Split `database.table` on the first dot.
fn split_table_name(name: &str) -> (Option<String>, String) {
    match name.split_once('.') {
        Some((database, table)) => (Some(database.to_string()), table.to_string()),
        None => (None, name.to_string()),
    }
}

impl ModelDescriptor {
    /// Compile the descriptor of `class`.
    ///
    /// With `inherit` set the declaration of the class's parent is
    /// authoritative, while the descriptor still reports `class` as its
    /// class name.
    pub fn compile(class: &str, inherit: bool, ctx: CompileContext<'_>) -> Result<Self> {
        let real_class = if inherit {
            let own = ctx
                .declarations
                .declaration(class)
                .ok_or_else(|| Error::UnknownModel(class.to_string()))?;
            own.parent.clone().ok_or_else(|| {
                Error::configuration(class, "inherited descriptor requested without a parent class")
            })?
        } else {
            class.to_string()
        };
        let decl = ctx
            .declarations
            .declaration(&real_class)
            .ok_or_else(|| Error::UnknownModel(real_class.clone()))?;

        let descriptor = Compiler {
            class,
            real_class: &real_class,
            decl,
            ctx,
        }
        .run(inherit)?;

        tracing::debug!(
            class = class,
            real_class = %real_class,
            table = ?descriptor.full_table_name(),
            fields = descriptor.fields.len(),
            "Compiled model descriptor"
        );
        Ok(descriptor)
    }

    /// Class this descriptor was requested for.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Class whose declaration is authoritative.
    pub fn real_class_name(&self) -> &str {
        &self.real_class_name
    }

    /// Whether the parent's declaration was used.
    pub fn is_inherit(&self) -> bool {
        self.inherit
    }

    /// Database name, when the table name is qualified.
    pub fn database_name(&self) -> Option<&str> {
        self.database_name.as_deref()
    }

    /// Unqualified table name.
    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    /// `database.table`, or just the table.
    pub fn full_table_name(&self) -> Option<String> {
        let table = self.table_name.as_deref()?;
        Some(match &self.database_name {
            Some(db) => format!("{db}.{table}"),
            None => table.to_string(),
        })
    }

    /// Whether the configured table prefix applies.
    pub fn use_prefix(&self) -> bool {
        self.use_prefix
    }

    /// Pool name.
    pub fn pool_name(&self) -> Option<&str> {
        self.pool_name.as_deref()
    }

    /// Primary-key columns in order.
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    /// First primary-key column.
    pub fn first_id(&self) -> Option<&str> {
        self.primary_keys.first().map(String::as_str)
    }

    /// Whether `column` is part of the primary key.
    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_keys.iter().any(|k| k == column)
    }

    /// Property-level primary-key markers as declared.
    pub fn id_markers(&self) -> &[(String, IdSpec)] {
        &self.id_markers
    }

    /// All fields in declaration order, synthesized relation placeholders
    /// last.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    /// Field by property name.
    pub fn field(&self, property: &str) -> Option<&FieldDescriptor> {
        self.field_index.get(property).map(|&i| &self.fields[i])
    }

    /// Field by column name.
    pub fn field_by_db(&self, column: &str) -> Option<&FieldDescriptor> {
        self.db_index.get(column).map(|&i| &self.fields[i])
    }

    /// Field by property name, falling back to the column name.
    pub fn resolve_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field(name).or_else(|| self.field_by_db(name))
    }

    /// Declaration-order position of a field, by property or column name.
    pub fn field_position(&self, name: &str) -> Option<usize> {
        self.field_index
            .get(name)
            .or_else(|| self.db_index.get(name))
            .copied()
    }

    /// Field at a declaration-order position.
    pub fn field_at(&self, position: usize) -> Option<&FieldDescriptor> {
        self.fields.get(position)
    }

    /// Number of fields, including relation placeholders.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Property name mapped to a column.
    pub fn property_for_db(&self, column: &str) -> Option<&str> {
        self.field_by_db(column).map(|f| f.property_name.as_str())
    }

    /// Fields with an explicit column name, in declaration order.
    pub fn db_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.db_name.is_some())
    }

    /// Property names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.property_name.as_str())
    }

    /// `(property, external name)` pairs for every field.
    pub fn serializable_field_names(&self) -> &[(String, String)] {
        &self.serializable_field_names
    }

    /// External name of a property.
    pub fn serializable_name(&self, property: &str) -> Option<&str> {
        self.serializable_field_names
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, name)| name.as_str())
    }

    /// External names that survive allow/deny filtering, in order.
    pub fn parsed_serializable_field_names(&self) -> &[String] {
        &self.parsed_serializable_field_names
    }

    /// Model-level serialization filter.
    pub fn serializables(&self) -> Option<&SerializablesSpec> {
        self.serializables.as_ref()
    }

    /// Property name of the auto-increment field.
    pub fn auto_increment_field(&self) -> Option<&str> {
        self.auto_increment_field.as_deref()
    }

    /// Whether the model has relations.
    pub fn has_relation(&self) -> bool {
        self.has_relation
    }

    /// Whether unchanged fields are omitted from updates.
    pub fn incremental_update(&self) -> bool {
        self.incremental_update
    }

    /// Whether lifecycle hooks fire.
    pub fn is_live_object(&self) -> bool {
        self.live_object
    }

    /// Whether external names are camel-cased.
    pub fn is_camel(&self) -> bool {
        self.camel
    }

    /// Soft-delete marker, with the field resolved to its column name.
    pub fn soft_delete(&self) -> Option<&SoftDeleteSpec> {
        self.soft_delete.as_ref()
    }

    /// Model-level `json` encode policy.
    pub fn json_encode(&self) -> Option<JsonEncodeSpec> {
        self.json_encode
    }

    /// Model-level `json` decode policy.
    pub fn json_decode(&self) -> Option<JsonDecodeSpec> {
        self.json_decode
    }
}

struct Compiler<'a> {
    class: &'a str,
    real_class: &'a str,
    decl: &'a ModelDeclaration,
    ctx: CompileContext<'a>,
}

impl Compiler<'_> {
    fn error(&self, message: impl Into<String>) -> Error {
        Error::configuration(self.real_class, message)
    }

    fn run(self, inherit: bool) -> Result<ModelDescriptor> {
        let overrides = self
            .ctx
            .config
            .model_override(self.real_class)?
            .unwrap_or_default();

        let mut database_name = None;
        let mut table_name = None;
        let mut pool_name = None;
        let mut use_prefix = false;
        let mut table_ids = Vec::new();
        if let Some(table) = &self.decl.table {
            if let Some(name) = overrides.name.as_ref().or(table.name.as_ref()) {
                let (database, table) = split_table_name(name);
                database_name = database;
                table_name = Some(table);
            }
            pool_name = overrides.pool_name.clone().or_else(|| table.pool.clone());
            use_prefix = overrides.prefix.unwrap_or(table.use_prefix);
            table_ids.clone_from(&table.id);
        }
        for name in database_name.iter().chain(table_name.iter()) {
            if !is_valid_identifier(name) {
                return Err(self.error(format!("invalid table identifier `{name}`")));
            }
        }

        let (mut fields, auto_increment_field) = self.compile_fields()?;
        for (property, _) in &self.decl.ids {
            if !fields.iter().any(|f| f.property_name == *property) {
                return Err(self.error(format!("id marker on undeclared property `{property}`")));
            }
        }

        let primary_keys = if table_ids.is_empty() {
            self.resolve_marked_keys(&fields)
        } else {
            table_ids
        };
        for field in &mut fields {
            if primary_keys.iter().any(|k| k == field.column_name()) {
                field.primary_key = true;
            }
        }

        let has_relation = self.ctx.relations.has_relation(self.real_class);
        if has_relation {
            for name in self.ctx.relations.relation_field_names(self.real_class) {
                if !fields.iter().any(|f| f.property_name == name) {
                    fields.push(FieldDescriptor::virtual_property().property(name));
                }
            }
        }

        let mut field_index = HashMap::with_capacity(fields.len());
        let mut db_index = HashMap::new();
        for (i, field) in fields.iter().enumerate() {
            field_index.insert(field.property_name.clone(), i);
            if let Some(db) = &field.db_name {
                let taken_by_stored = db_index
                    .get(db)
                    .is_some_and(|&j: &usize| !fields[j].virtual_field);
                if !taken_by_stored {
                    db_index.insert(db.clone(), i);
                }
            }
        }

        let soft_delete = self
            .decl
            .soft_delete
            .as_ref()
            .map(|spec| self.resolve_soft_delete(spec, &fields))
            .transpose()?;

        let camel = self.decl.entity.camel;
        let (serializable_field_names, parsed_serializable_field_names) =
            self.serializable_names(&fields, camel);

        Ok(ModelDescriptor {
            class_name: self.class.to_string(),
            real_class_name: self.real_class.to_string(),
            inherit,
            database_name,
            table_name,
            use_prefix,
            pool_name,
            primary_keys,
            id_markers: self.decl.ids.clone(),
            fields,
            field_index,
            db_index,
            serializable_field_names,
            parsed_serializable_field_names,
            serializables: self.decl.serializables.clone(),
            auto_increment_field,
            has_relation,
            incremental_update: self.decl.entity.incremental_update,
            live_object: self.decl.entity.live_object,
            camel,
            soft_delete,
            json_encode: self.decl.json_encode,
            json_decode: self.decl.json_decode,
        })
    }

    fn compile_fields(&self) -> Result<(Vec<FieldDescriptor>, Option<String>)> {
        let mut fields: Vec<FieldDescriptor> = Vec::with_capacity(self.decl.columns.len());
        let mut auto_increment_field = None;

        for column in &self.decl.columns {
            let mut field = column.clone();
            let property = field.property_name.clone();
            if property.is_empty() {
                return Err(self.error("column declared without a property name"));
            }
            if fields.iter().any(|f| f.property_name == property) {
                return Err(self.error(format!("property `{property}` declared twice")));
            }
            if let Some(db) = &field.db_name {
                if !is_valid_identifier(db) {
                    return Err(self.error(format!("invalid column identifier `{db}`")));
                }
                let clash = fields
                    .iter()
                    .any(|f| !f.virtual_field && f.db_name.as_ref() == Some(db));
                if clash && !field.virtual_field {
                    return Err(self.error(format!("column `{db}` mapped by two properties")));
                }
            }

            if field.create_time.is_some() && field.update_time.is_some() {
                return Err(self.error(format!(
                    "`{property}` can not be both create time and update time"
                )));
            }
            if (field.create_time.is_some() || field.update_time.is_some())
                && !field.semantic_type.supports_timestamp()
            {
                return Err(self.error(format!(
                    "timestamp role on `{property}` of unsupported type {}",
                    field.semantic_type
                )));
            }

            if let Some(spec) = self.decl.id_spec(&property) {
                if let Some(generator) = &spec.generator {
                    field.generator = Some(generator.clone());
                    field.generator_options.clone_from(&spec.generator_options);
                }
            }
            if let Some(generator) = field.generator.as_deref().filter(|g| !g.is_empty()) {
                if !self.ctx.generators.contains(generator) {
                    return Err(self.error(format!(
                        "unknown generator `{generator}` on `{property}`"
                    )));
                }
            }

            field.json_encode = field.json_encode.or(self.decl.json_encode);
            field.json_decode = field.json_decode.or(self.decl.json_decode);

            if auto_increment_field.is_none() && !field.virtual_field && field.auto_increment {
                auto_increment_field = Some(property);
            }
            fields.push(field);
        }

        Ok((fields, auto_increment_field))
    }

    /// Primary keys from property markers, ordered by position.
    ///
    /// Unindexed markers append after the highest position seen so far; an
    /// explicit position replaces whatever occupied it.
    fn resolve_marked_keys(&self, fields: &[FieldDescriptor]) -> Vec<String> {
        let mut positions: BTreeMap<usize, String> = BTreeMap::new();
        for field in fields {
            let index = match self.decl.id_spec(&field.property_name) {
                Some(spec) => spec.index,
                None if field.primary_key => {
                    field.primary_key_index.map_or(IdIndex::Auto, IdIndex::At)
                }
                None => continue,
            };
            let column = field.column_name().to_string();
            match index {
                IdIndex::Excluded => {}
                IdIndex::Auto => {
                    let next = positions.keys().next_back().map_or(0, |last| last + 1);
                    positions.insert(next, column);
                }
                IdIndex::At(n) => {
                    positions.insert(n, column);
                }
            }
        }
        positions.into_values().collect()
    }

    fn resolve_soft_delete(
        &self,
        spec: &SoftDeleteSpec,
        fields: &[FieldDescriptor],
    ) -> Result<SoftDeleteSpec> {
        let field = fields
            .iter()
            .filter(|f| f.is_persisted())
            .find(|f| f.db_name.as_deref() == Some(spec.field.as_str()))
            .or_else(|| {
                fields
                    .iter()
                    .filter(|f| f.is_persisted())
                    .find(|f| f.property_name == spec.field)
            })
            .ok_or_else(|| {
                self.error(format!("soft delete field `{}` is not a column", spec.field))
            })?;
        Ok(SoftDeleteSpec {
            field: field.column_name().to_string(),
            default: spec.default.clone(),
        })
    }

    fn serializable_names(
        &self,
        fields: &[FieldDescriptor],
        camel: bool,
    ) -> (Vec<(String, String)>, Vec<String>) {
        let mut names = Vec::with_capacity(fields.len());
        let mut parsed = Vec::with_capacity(fields.len());

        for field in fields {
            let property = &field.property_name;
            let name = if camel {
                to_camel(property)
            } else if field.virtual_field {
                property.clone()
            } else {
                field.column_name().to_string()
            };
            names.push((property.clone(), name.clone()));

            let include = match self.decl.serializable.get(property) {
                Some(&allow) => allow,
                None => match &self.decl.serializables {
                    Some(spec) => {
                        let listed = spec.fields.iter().any(|f| *f == name);
                        match spec.mode {
                            SerializableMode::Allow => listed,
                            SerializableMode::Deny => !listed,
                        }
                    }
                    None => true,
                },
            };
            if include {
                parsed.push(name);
            }
        }
        (names, parsed)
    }
}
