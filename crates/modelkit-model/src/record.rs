//! Live record instances.
//!
//! A [`Record`] is bound to one descriptor (through a [`ModelFork`], which
//! may reroute its table or pool). It keeps three pieces of state next to
//! the field values:
//!
//! - the **origin**: last known persisted values keyed by column name,
//!   merged after every successful write,
//! - **raw overrides**: one-shot SQL fragments consumed by the next save,
//! - **existence**: whether the row is known to exist.
//!
//! Only explicitly assigned fields carry a value; an unassigned field is
//! absent from [`Record::to_row`] and therefore untouched by an update.

use std::collections::HashMap;
use std::sync::Arc;

use modelkit_core::{
    Error, FieldDescriptor, ModelDescriptor, ModelFork, Result, Row, SavePayload, SaveValue, Value,
};

use crate::coerce::CoercionSet;

/// Whether a record's row is known to exist in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Existence {
    /// Not known; `save` infers it or falls back to a replace.
    #[default]
    Unknown,
    /// The row exists.
    Exists,
    /// The row does not exist.
    NotExists,
}

impl Existence {
    /// `Some(true)` / `Some(false)` when known.
    pub fn known(self) -> Option<bool> {
        match self {
            Existence::Unknown => None,
            Existence::Exists => Some(true),
            Existence::NotExists => Some(false),
        }
    }
}

/// A live data object bound to one model descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fork: ModelFork,
    values: Vec<Option<Value>>,
    origin: HashMap<String, Value>,
    raw: HashMap<String, String>,
    existence: Existence,
}

impl Record {
    /// Empty record routed through `fork`.
    pub fn new(fork: impl Into<ModelFork>) -> Self {
        let fork = fork.into();
        let count = fork.descriptor().field_count();
        Self {
            fork,
            values: vec![None; count],
            origin: HashMap::new(),
            raw: HashMap::new(),
            existence: Existence::Unknown,
        }
    }

    /// The compiled descriptor.
    pub fn descriptor(&self) -> &Arc<ModelDescriptor> {
        self.fork.descriptor()
    }

    /// Table/pool routing of this record.
    pub fn fork(&self) -> &ModelFork {
        &self.fork
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.descriptor()
            .field_position(name)
            .ok_or_else(|| Error::value(name, "no such field"))
    }

    /// Current value, by property or column name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let position = self.descriptor().field_position(name)?;
        self.values.get(position).and_then(Option::as_ref)
    }

    /// Current value, `Null` when unset.
    pub fn value(&self, name: &str) -> Value {
        self.get(name).cloned().unwrap_or_default()
    }

    /// Whether the field was assigned.
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Assign a field, checking declared length and sign.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let position = self.position(name)?;
        let value = value.into();
        if let Some(field) = self.descriptor().field_at(position) {
            field
                .check_value(&value)
                .map_err(|message| Error::value(&field.property_name, message))?;
        }
        self.values[position] = Some(value);
        Ok(())
    }

    /// Builder-style `set`.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Assign without constraint checks; unknown names are ignored.
    pub(crate) fn put(&mut self, name: &str, value: Value) {
        if let Some(position) = self.descriptor().field_position(name) {
            self.values[position] = Some(value);
        }
    }

    /// Clear a field back to unassigned.
    pub fn unset(&mut self, name: &str) {
        if let Some(position) = self.descriptor().field_position(name) {
            self.values[position] = None;
        }
    }

    /// Assigned fields as `(property, value)` in declaration order.
    pub fn values(&self) -> Vec<(&str, &Value)> {
        self.descriptor()
            .fields()
            .zip(&self.values)
            .filter_map(|(field, value)| {
                value.as_ref().map(|v| (field.property_name.as_str(), v))
            })
            .collect()
    }

    /// Assigned fields as an owned row keyed by property name.
    pub fn to_row(&self) -> Row {
        self.values()
            .into_iter()
            .map(|(name, value)| (name, value.clone()))
            .collect()
    }

    /// Assign every recognised key of `data`.
    ///
    /// Keys may be property or column names. Text values of structured
    /// types are decoded first. With `checked` the declared constraints
    /// apply; unknown keys are skipped.
    pub(crate) fn fill(&mut self, data: &Row, coercion: &CoercionSet, checked: bool) -> Result<()> {
        let descriptor = Arc::clone(self.descriptor());
        for (key, value) in data.iter() {
            let Some(field) = descriptor.resolve_field(key) else {
                tracing::trace!(class = descriptor.class_name(), key = key, "Skipping unknown key");
                continue;
            };
            let value = coercion.init_value(field, value.clone())?;
            if checked {
                self.set(&field.property_name, value)?;
            } else {
                self.put(&field.property_name, value);
            }
        }
        Ok(())
    }

    /// Last known persisted values, keyed by column name.
    pub fn origin(&self) -> &HashMap<String, Value> {
        &self.origin
    }

    /// Origin value by column name, falling back to property name.
    pub fn origin_value(&self, name: &str) -> Option<&Value> {
        self.origin.get(name).or_else(|| {
            let field = self.descriptor().resolve_field(name)?;
            field
                .db_name
                .as_deref()
                .and_then(|db| self.origin.get(db))
                .or_else(|| self.origin.get(&field.property_name))
        })
    }

    /// Replace the origin with a persisted row.
    pub(crate) fn reset_origin(&mut self, row: &Row) {
        let descriptor = Arc::clone(self.descriptor());
        self.origin = row
            .iter()
            .filter_map(|(key, value)| {
                let field: &FieldDescriptor = descriptor.resolve_field(key)?;
                Some((field.column_name().to_string(), value.clone()))
            })
            .collect();
    }

    /// Merge a written payload into the origin.
    ///
    /// Raw entries drop their origin value: what the database stored is
    /// unknown.
    pub(crate) fn merge_origin(&mut self, payload: &SavePayload) {
        for (column, value) in payload.iter() {
            match value {
                SaveValue::Value(v) => {
                    self.origin.insert(column.to_string(), v.clone());
                }
                SaveValue::Raw(_) => {
                    self.origin.remove(column);
                }
            }
        }
    }

    pub(crate) fn set_origin_value(&mut self, column: &str, value: Value) {
        self.origin.insert(column.to_string(), value);
    }

    /// Set (`Some`) or clear (`None`) a raw SQL override for the next save.
    pub fn set_raw(&mut self, field: &str, sql: Option<String>) -> &mut Self {
        match sql {
            Some(sql) => {
                self.raw.insert(field.to_string(), sql);
            }
            None => {
                self.raw.remove(field);
            }
        }
        self
    }

    /// Pending raw override of a field.
    pub fn raw(&self, field: &str) -> Option<&str> {
        self.raw.get(field).map(String::as_str)
    }

    /// Take every pending raw override.
    pub(crate) fn take_raw(&mut self) -> HashMap<String, String> {
        std::mem::take(&mut self.raw)
    }

    /// Existence state.
    pub fn existence(&self) -> Existence {
        self.existence
    }

    pub(crate) fn set_existence(&mut self, existence: Existence) {
        self.existence = existence;
    }

    /// Serialize the externally visible fields.
    ///
    /// Unset fields serialize as `null`; JSON-typed values are embedded as
    /// documents.
    pub fn to_json(&self) -> serde_json::Value {
        let descriptor = self.descriptor();
        let visible = descriptor.parsed_serializable_field_names();
        let mut out = serde_json::Map::new();
        for (property, name) in descriptor.serializable_field_names() {
            if !visible.contains(name) {
                continue;
            }
            let value = self
                .get(property)
                .map_or(serde_json::Value::Null, Value::to_json);
            out.insert(name.clone(), value);
        }
        serde_json::Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelkit_core::{
        CompileContext, DeclarationSet, EmptyConfig, ModelDeclaration, NoCatalog, SemanticType,
        SerializablesSpec, TableSpec,
    };
    use serde_json::json;

    fn descriptor() -> Arc<ModelDescriptor> {
        let set = DeclarationSet::new().with(
            ModelDeclaration::builder("app::Member")
                .table(TableSpec::new("tb_member").id(["id"]))
                .column(
                    "id",
                    FieldDescriptor::column("id", SemanticType::Int)
                        .auto_increment(true)
                        .unsigned(true),
                )
                .column(
                    "userName",
                    FieldDescriptor::column("user_name", SemanticType::Varchar).length(8),
                )
                .column(
                    "tags",
                    FieldDescriptor::column("tags", SemanticType::List).nullable(true),
                )
                .column("profile", FieldDescriptor::column("profile", SemanticType::Json))
                .column("password", FieldDescriptor::column("password", SemanticType::Varchar))
                .serializables(SerializablesSpec::deny(["password"]))
                .build(),
        );
        let ctx = CompileContext {
            declarations: &set,
            config: &EmptyConfig,
            relations: &NoCatalog,
            generators: &NoCatalog,
        };
        Arc::new(ModelDescriptor::compile("app::Member", false, ctx).unwrap())
    }

    #[test]
    fn test_set_by_property_or_column() {
        let mut record = Record::new(descriptor());
        record.set("user_name", "alice").unwrap();
        assert_eq!(record.get("userName"), Some(&Value::from("alice")));
        assert!(!record.is_set("id"));
        assert_eq!(record.value("id"), Value::Null);

        let names: Vec<_> = record.values().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["userName"]);
    }

    #[test]
    fn test_value_errors_at_assignment() {
        let mut record = Record::new(descriptor());
        let err = record.set("userName", "much too long").unwrap_err();
        assert!(matches!(err, Error::Value { ref field, .. } if field == "userName"));
        let err = record.set("id", -1).unwrap_err();
        assert!(matches!(err, Error::Value { .. }));
        assert!(record.set("nope", 1).is_err());
        assert!(!record.is_set("userName"));
    }

    #[test]
    fn test_fill_decodes_structured_text() {
        let mut record = Record::new(descriptor());
        let data = Row::new()
            .with("user_name", "bob")
            .with("tags", "a,b")
            .with("profile", r#"{"age":3}"#)
            .with("unknown", 1);
        record.fill(&data, &CoercionSet::default(), true).unwrap();
        assert_eq!(
            record.get("tags"),
            Some(&Value::List(vec![Value::from("a"), Value::from("b")]))
        );
        assert_eq!(record.get("profile"), Some(&Value::Json(json!({"age": 3}))));
    }

    #[test]
    fn test_raw_overrides() {
        let mut record = Record::new(descriptor());
        record.set_raw("id", Some("id + 1".into()));
        assert_eq!(record.raw("id"), Some("id + 1"));
        record.set_raw("id", None);
        assert_eq!(record.raw("id"), None);
        record.set_raw("userName", Some("UPPER(user_name)".into()));
        assert_eq!(record.take_raw().len(), 1);
        assert!(record.raw("userName").is_none());
    }

    #[test]
    fn test_merge_origin_drops_raw_entries() {
        let mut record = Record::new(descriptor());
        record.reset_origin(&Row::new().with("userName", "a").with("id", 1));
        assert_eq!(record.origin().get("user_name"), Some(&Value::from("a")));

        let payload = SavePayload::new()
            .with("user_name", "b")
            .with("id", SaveValue::Raw("id + 1".into()));
        record.merge_origin(&payload);
        assert_eq!(record.origin_value("userName"), Some(&Value::from("b")));
        assert!(record.origin().get("id").is_none());
    }

    #[test]
    fn test_to_json_uses_parsed_names() {
        let record = Record::new(descriptor())
            .with("userName", "carol")
            .unwrap()
            .with("password", "secret")
            .unwrap();
        let out = record.to_json();
        assert_eq!(out["userName"], json!("carol"));
        assert_eq!(out["id"], json!(null));
        assert!(out.get("password").is_none());
    }
}
