//! Value coercion by semantic type.
//!
//! Structured column types are stored as text. When a record is built from
//! raw data, the init parser decodes the stored text; when save data is
//! compiled, the save parser encodes the live value back to its wire form.
//! Parsers are registered per [`SemanticType`] in a [`CoercionSet`], which
//! also owns the list of types whose `NULL` is written instead of skipped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use modelkit_core::{Error, FieldDescriptor, Result, SemanticType, Value};

/// Decode and encode values of one semantic type.
pub trait ValueCoercion: Send + Sync {
    /// Decode a stored text value while a record is being built.
    fn init(&self, field: &FieldDescriptor, raw: &str) -> Result<Value>;

    /// Encode a live value for the save payload.
    fn save(&self, field: &FieldDescriptor, value: Value) -> Result<Value>;
}

/// `json` columns: serde_json text on the wire, a JSON document in memory.
///
/// Follows the field's compiled encode and decode policies: pretty or
/// compact output, and whether undecodable text is kept or rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCoercion;

impl ValueCoercion for JsonCoercion {
    fn init(&self, field: &FieldDescriptor, raw: &str) -> Result<Value> {
        let decoded: serde_json::Value = match serde_json::from_str(raw) {
            Ok(decoded) => decoded,
            Err(_) if field.json_decode.is_some_and(|d| d.keep_invalid) => {
                return Ok(Value::Text(raw.to_string()));
            }
            Err(e) => {
                return Err(Error::value(&field.property_name, format!("invalid json: {e}")));
            }
        };
        Ok(match decoded {
            serde_json::Value::Null => Value::Null,
            other => Value::Json(other),
        })
    }

    fn save(&self, field: &FieldDescriptor, value: Value) -> Result<Value> {
        let pretty = field.json_encode.is_some_and(|e| e.pretty);
        Ok(match value {
            Value::Null => Value::Null,
            Value::Text(text) => Value::Text(text),
            other if pretty => Value::Text(serde_json::to_string_pretty(&other.to_json())?),
            other => Value::Text(serde_json::to_string(&other.to_json())?),
        })
    }
}

/// `list` and `set` columns: separator-joined text on the wire.
#[derive(Debug, Clone, Default)]
pub struct DelimitedCoercion {
    fixed_separator: Option<String>,
}

impl DelimitedCoercion {
    /// Use each field's declared list separator.
    pub fn per_field() -> Self {
        Self {
            fixed_separator: None,
        }
    }

    /// Always use `separator`, as `set` columns do.
    pub fn fixed(separator: impl Into<String>) -> Self {
        Self {
            fixed_separator: Some(separator.into()),
        }
    }

    fn separator<'a>(&'a self, field: &'a FieldDescriptor) -> &'a str {
        self.fixed_separator
            .as_deref()
            .unwrap_or(&field.list_separator)
    }
}

impl ValueCoercion for DelimitedCoercion {
    fn init(&self, field: &FieldDescriptor, raw: &str) -> Result<Value> {
        if raw.is_empty() {
            return Ok(Value::List(Vec::new()));
        }
        Ok(Value::List(
            raw.split(self.separator(field))
                .map(|item| Value::Text(item.to_string()))
                .collect(),
        ))
    }

    fn save(&self, field: &FieldDescriptor, value: Value) -> Result<Value> {
        Ok(match value {
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                Value::Text(parts.join(self.separator(field)))
            }
            other => other,
        })
    }
}

/// Coercion policies keyed by semantic type.
#[derive(Clone)]
pub struct CoercionSet {
    coercions: HashMap<SemanticType, Arc<dyn ValueCoercion>>,
    null_exempt: HashSet<SemanticType>,
}

impl std::fmt::Debug for CoercionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoercionSet")
            .field("types", &self.coercions.keys().collect::<Vec<_>>())
            .field("null_exempt", &self.null_exempt)
            .finish()
    }
}

impl Default for CoercionSet {
    /// `json`, `list` and `set` parsers; only `json` may be written as `NULL`
    /// when the column is not nullable.
    fn default() -> Self {
        let mut set = Self::empty();
        set.register(SemanticType::Json, JsonCoercion);
        set.register(SemanticType::List, DelimitedCoercion::per_field());
        set.register(SemanticType::Set, DelimitedCoercion::fixed(","));
        set.null_exempt.insert(SemanticType::Json);
        set
    }
}

impl CoercionSet {
    /// No parsers and no null exemptions.
    pub fn empty() -> Self {
        Self {
            coercions: HashMap::new(),
            null_exempt: HashSet::new(),
        }
    }

    /// Register the parser for `ty`, replacing any previous one.
    pub fn register(&mut self, ty: SemanticType, coercion: impl ValueCoercion + 'static) {
        self.coercions.insert(ty, Arc::new(coercion));
    }

    /// Let `NULL` through for `ty` even on non-nullable columns.
    pub fn exempt_null(&mut self, ty: SemanticType) {
        self.null_exempt.insert(ty);
    }

    /// Whether `NULL` of this type is written instead of skipped.
    pub fn is_null_exempt(&self, ty: SemanticType) -> bool {
        self.null_exempt.contains(&ty)
    }

    /// Decode `value` for a record; only text values are parsed.
    pub fn init_value(&self, field: &FieldDescriptor, value: Value) -> Result<Value> {
        match (self.coercions.get(&field.semantic_type), value) {
            (Some(coercion), Value::Text(raw)) => coercion.init(field, &raw),
            (_, other) => Ok(other),
        }
    }

    /// Encode `value` for a save payload.
    pub fn save_value(&self, field: &FieldDescriptor, value: Value) -> Result<Value> {
        match self.coercions.get(&field.semantic_type) {
            Some(coercion) => coercion.save(field, value),
            None => Ok(value),
        }
    }
}
