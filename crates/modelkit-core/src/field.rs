//! Field descriptors.
//!
//! A `FieldDescriptor` is the immutable description of one declared
//! property: where it is stored, how it is typed, and which automatic roles
//! (auto-increment, create/update timestamps, ID generation) it carries.
//! Declarations build descriptors with the same chained-builder style used
//! for the rest of the metadata; compilation then freezes them inside a
//! [`ModelDescriptor`](crate::meta::ModelDescriptor).

use crate::types::SemanticType;
use crate::value::Value;

/// Multiplier applied to Unix time when a timestamp role targets a `bigint`
/// column.
///
/// `1000` stores milliseconds, `1_000_000` microseconds. Other column types
/// ignore the precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimePrecision(u64);

impl TimePrecision {
    /// Milliseconds, the default for `bigint` timestamp columns.
    pub const MILLIS: TimePrecision = TimePrecision(1_000);
    /// Microseconds.
    pub const MICROS: TimePrecision = TimePrecision(1_000_000);

    /// Custom multiplier. Zero is treated as one.
    #[must_use]
    pub const fn new(multiplier: u64) -> Self {
        if multiplier == 0 {
            TimePrecision(1)
        } else {
            TimePrecision(multiplier)
        }
    }

    /// The multiplier.
    #[must_use]
    pub const fn multiplier(&self) -> u64 {
        self.0
    }
}

impl Default for TimePrecision {
    fn default() -> Self {
        Self::MILLIS
    }
}

/// How `json` values are encoded on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonEncodeSpec {
    /// Indented output instead of compact text.
    pub pretty: bool,
}

impl JsonEncodeSpec {
    /// Compact text, the default.
    pub const fn compact() -> Self {
        Self { pretty: false }
    }

    /// Indented text.
    pub const fn pretty() -> Self {
        Self { pretty: true }
    }
}

/// How stored `json` text is decoded when a record is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonDecodeSpec {
    /// Keep text that is not valid JSON instead of rejecting it.
    pub keep_invalid: bool,
}

impl JsonDecodeSpec {
    /// Reject invalid JSON, the default.
    pub const fn strict() -> Self {
        Self {
            keep_invalid: false,
        }
    }

    /// Keep invalid JSON as plain text.
    pub const fn lenient() -> Self {
        Self { keep_invalid: true }
    }
}

/// Immutable description of one declared property.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Property name on the record.
    pub property_name: String,
    /// Column name; `None` when the property is not a stored column.
    pub db_name: Option<String>,
    /// Semantic type.
    pub semantic_type: SemanticType,
    /// Declared length (characters for text types).
    pub length: Option<u32>,
    /// Whether `NULL` may be written.
    pub nullable: bool,
    /// Declared default, informational.
    pub default: Option<Value>,
    /// Virtual properties never take part in persistence.
    pub virtual_field: bool,
    /// Whether the database generates the value on insert.
    pub auto_increment: bool,
    /// Whether negative integers are rejected.
    pub unsigned: bool,
    /// Per-column primary key marker.
    pub primary_key: bool,
    /// Position of this column inside a composite primary key.
    pub primary_key_index: Option<usize>,
    /// Fill with the current time on insert when empty.
    pub create_time: Option<TimePrecision>,
    /// Fill with the current time on every non-insert save when untouched.
    pub update_time: Option<TimePrecision>,
    /// Name of the ID generation strategy applied on insert.
    pub generator: Option<String>,
    /// Options handed to the generator.
    pub generator_options: serde_json::Map<String, serde_json::Value>,
    /// Separator used by `list` columns.
    pub list_separator: String,
    /// Encode policy of `json` columns; compilation fills in the model's.
    pub json_encode: Option<JsonEncodeSpec>,
    /// Decode policy of `json` columns; compilation fills in the model's.
    pub json_decode: Option<JsonDecodeSpec>,
}

impl FieldDescriptor {
    /// Describe a stored column.
    ///
    /// The property name is assigned when the column is added to a
    /// declaration.
    pub fn column(db_name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            property_name: String::new(),
            db_name: Some(db_name.into()),
            semantic_type,
            length: None,
            nullable: false,
            default: None,
            virtual_field: false,
            auto_increment: false,
            unsigned: false,
            primary_key: false,
            primary_key_index: None,
            create_time: None,
            update_time: None,
            generator: None,
            generator_options: serde_json::Map::new(),
            list_separator: ",".to_string(),
            json_encode: None,
            json_decode: None,
        }
    }

    /// Describe a property without a backing column.
    pub fn virtual_property() -> Self {
        let mut field = Self::column("", SemanticType::default());
        field.db_name = None;
        field.virtual_field = true;
        field
    }

    /// Describe a property that has no column name of its own.
    pub fn unnamed(semantic_type: SemanticType) -> Self {
        let mut field = Self::column("", semantic_type);
        field.db_name = None;
        field
    }

    /// Set the property name.
    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.property_name = name.into();
        self
    }

    /// Set the declared length.
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Set nullable flag.
    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set the declared default.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Mark the property as virtual.
    pub fn virtual_field(mut self, value: bool) -> Self {
        self.virtual_field = value;
        self
    }

    /// Set auto-increment flag.
    pub fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    /// Set unsigned flag.
    pub fn unsigned(mut self, value: bool) -> Self {
        self.unsigned = value;
        self
    }

    /// Mark as (part of) the primary key.
    pub fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Mark as part of the primary key at `index`.
    pub fn primary_key_at(mut self, index: usize) -> Self {
        self.primary_key = true;
        self.primary_key_index = Some(index);
        self
    }

    /// Auto-fill on insert, default precision.
    pub fn create_time(mut self) -> Self {
        self.create_time = Some(TimePrecision::default());
        self
    }

    /// Auto-fill on insert with an explicit `bigint` precision.
    pub fn create_time_with(mut self, precision: TimePrecision) -> Self {
        self.create_time = Some(precision);
        self
    }

    /// Auto-fill on update, default precision.
    pub fn update_time(mut self) -> Self {
        self.update_time = Some(TimePrecision::default());
        self
    }

    /// Auto-fill on update with an explicit `bigint` precision.
    pub fn update_time_with(mut self, precision: TimePrecision) -> Self {
        self.update_time = Some(precision);
        self
    }

    /// Set the separator used by `list` columns.
    pub fn list_separator(mut self, separator: impl Into<String>) -> Self {
        self.list_separator = separator.into();
        self
    }

    /// Field-level `json` encode policy.
    pub fn json_encode(mut self, spec: JsonEncodeSpec) -> Self {
        self.json_encode = Some(spec);
        self
    }

    /// Field-level `json` decode policy.
    pub fn json_decode(mut self, spec: JsonDecodeSpec) -> Self {
        self.json_decode = Some(spec);
        self
    }

    /// Whether the field is written to the database at all.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !self.virtual_field && self.db_name.is_some()
    }

    /// Column name, falling back to the property name.
    #[must_use]
    pub fn column_name(&self) -> &str {
        self.db_name.as_deref().unwrap_or(&self.property_name)
    }

    /// Whether the field carries an ID generator.
    #[must_use]
    pub fn has_generator(&self) -> bool {
        self.generator.as_deref().is_some_and(|g| !g.is_empty())
    }

    /// Check a value against the declared length and sign constraints.
    ///
    /// Returns a human-readable reason on failure.
    pub fn check_value(&self, value: &Value) -> Result<(), String> {
        if let (Some(max), Value::Text(text)) = (self.length, value) {
            if self.semantic_type.is_textual() {
                let len = text.chars().count();
                if len > max as usize {
                    return Err(format!("length {len} exceeds declared length {max}"));
                }
            }
        }
        if self.unsigned && self.semantic_type.is_integer() {
            if let Some(n) = value.as_i64() {
                if n < 0 {
                    return Err(format!("negative value {n} for unsigned column"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_builder_chain() {
        let field = FieldDescriptor::column("member_id", SemanticType::Int)
            .property("memberId")
            .length(10)
            .unsigned(true)
            .default_value(0);

        assert_eq!(field.property_name, "memberId");
        assert_eq!(field.db_name.as_deref(), Some("member_id"));
        assert_eq!(field.length, Some(10));
        assert!(field.unsigned);
        assert!(!field.nullable);
        assert_eq!(field.default, Some(Value::Int(0)));
        assert!(field.is_persisted());
    }

    #[test]
    fn test_virtual_property() {
        let field = FieldDescriptor::virtual_property().property("comments");
        assert!(field.virtual_field);
        assert!(field.db_name.is_none());
        assert!(!field.is_persisted());
        assert_eq!(field.column_name(), "comments");
    }

    #[test]
    fn test_check_value_length() {
        let field = FieldDescriptor::column("title", SemanticType::Varchar).length(3);
        assert!(field.check_value(&Value::from("abc")).is_ok());
        assert!(field.check_value(&Value::from("abcd")).is_err());
        // multibyte characters count once
        assert!(field.check_value(&Value::from("äöü")).is_ok());
    }

    #[test]
    fn test_check_value_unsigned() {
        let field = FieldDescriptor::column("n", SemanticType::Int).unsigned(true);
        assert!(field.check_value(&Value::Int(0)).is_ok());
        assert!(field.check_value(&Value::Int(-1)).is_err());
        assert!(field.check_value(&Value::Null).is_ok());
    }

    #[test]
    fn test_time_precision() {
        assert_eq!(TimePrecision::default().multiplier(), 1_000);
        assert_eq!(TimePrecision::new(0).multiplier(), 1);
    }
}
