//! Compiled save payloads.
//!
//! A payload is the exact ordered `column -> value` set that an insert,
//! update or replace statement sends. Raw entries are SQL fragments that
//! the query layer inlines without escaping.

use crate::value::Value;

/// One entry of a save payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveValue {
    /// A bound parameter.
    Value(Value),
    /// An unescaped SQL fragment, e.g. `views + 1`.
    Raw(String),
}

impl SaveValue {
    /// The bound value, if this is not a raw fragment.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            SaveValue::Value(v) => Some(v),
            SaveValue::Raw(_) => None,
        }
    }

    /// True for raw SQL fragments.
    pub fn is_raw(&self) -> bool {
        matches!(self, SaveValue::Raw(_))
    }
}

impl From<Value> for SaveValue {
    fn from(v: Value) -> Self {
        SaveValue::Value(v)
    }
}

macro_rules! save_value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for SaveValue {
                fn from(v: $ty) -> Self {
                    SaveValue::Value(Value::from(v))
                }
            }
        )*
    };
}

save_value_from!(bool, i32, i64, u32, f64, &str, String);

/// Ordered `db column -> value` mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavePayload {
    entries: Vec<(String, SaveValue)>,
}

impl SavePayload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a column, keeping its original position.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<SaveValue>) {
        let column = column.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(c, _)| *c == column) {
            slot.1 = value;
        } else {
            self.entries.push((column, value));
        }
    }

    /// Builder-style `insert`.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SaveValue>) -> Self {
        self.insert(column, value);
        self
    }

    /// Remove a column.
    pub fn remove(&mut self, column: &str) -> Option<SaveValue> {
        let idx = self.entries.iter().position(|(c, _)| c == column)?;
        Some(self.entries.remove(idx).1)
    }

    /// Entry for a column.
    pub fn get(&self, column: &str) -> Option<&SaveValue> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    /// Bound (non-raw, non-null) value for a column.
    ///
    /// Used when a primary-key predicate is resolved from the payload.
    pub fn bound_value(&self, column: &str) -> Option<&Value> {
        self.get(column)
            .and_then(SaveValue::as_value)
            .filter(|v| !v.is_null())
    }

    /// Whether the column is present.
    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    /// Iterate entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SaveValue)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing would be written.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for SavePayload {
    type Item = (String, SaveValue);
    type IntoIter = std::vec::IntoIter<(String, SaveValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_position() {
        let mut payload = SavePayload::new().with("a", 1).with("b", 2);
        payload.insert("a", 3);
        let cols: Vec<_> = payload.columns().collect();
        assert_eq!(cols, vec!["a", "b"]);
        assert_eq!(payload.get("a"), Some(&SaveValue::Value(Value::Int(3))));
    }

    #[test]
    fn test_bound_value_skips_raw_and_null() {
        let payload = SavePayload::new()
            .with("id", SaveValue::Raw("LAST_INSERT_ID()".into()))
            .with("x", Value::Null)
            .with("y", 7);
        assert!(payload.bound_value("id").is_none());
        assert!(payload.bound_value("x").is_none());
        assert_eq!(payload.bound_value("y"), Some(&Value::Int(7)));
    }
}
