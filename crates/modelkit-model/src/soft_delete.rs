//! Soft-delete markers.
//!
//! A soft-deleted row keeps its data; its marker column moves away from the
//! declared default. Queries built through the persistence layer only see
//! rows whose marker still holds the default.

use chrono::{DateTime, Utc};
use modelkit_core::{SoftDeleteSpec, Value};
use modelkit_query::{Condition, Operator, TableRef};

/// Produces the value written into the marker column on soft delete.
pub trait SoftDeletePolicy: Send + Sync {
    /// Marker for a row deleted at `now`.
    fn generate(&self, now: DateTime<Utc>) -> Value;
}

/// Writes the deletion time as Unix seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixSeconds;

impl SoftDeletePolicy for UnixSeconds {
    fn generate(&self, now: DateTime<Utc>) -> Value {
        Value::Int(now.timestamp())
    }
}

impl<F> SoftDeletePolicy for F
where
    F: Fn(DateTime<Utc>) -> Value + Send + Sync,
{
    fn generate(&self, now: DateTime<Utc>) -> Value {
        self(now)
    }
}

/// Predicate matching rows that are not soft-deleted.
///
/// The column is qualified with the table so it stays unambiguous in joins.
pub fn live_condition(spec: &SoftDeleteSpec, table: &TableRef) -> Condition {
    let column = format!("{}.{}", table.qualified(), spec.field);
    if spec.default.is_null() {
        Condition::new(column, Operator::Is, Value::Null)
    } else {
        Condition::new(column, Operator::Eq, spec.default.clone())
    }
}

/// Predicate matching rows that are soft-deleted.
pub fn deleted_condition(spec: &SoftDeleteSpec) -> Condition {
    Condition::new(spec.field.clone(), Operator::Ne, spec.default.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_seconds_policy() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(UnixSeconds.generate(now), Value::Int(1_700_000_000));
        let custom = |_: DateTime<Utc>| Value::Int(1);
        assert_eq!(custom.generate(now), Value::Int(1));
    }

    #[test]
    fn test_live_condition_null_default() {
        let spec = SoftDeleteSpec::new("deleted_at");
        let condition = live_condition(&spec, &TableRef::new("tb_post"));
        assert_eq!(condition.operator, Operator::Is);
        assert_eq!(condition.column, "tb_post.deleted_at");
        assert_eq!(condition.column_name(), "deleted_at");
    }

    #[test]
    fn test_live_condition_value_default() {
        let spec = SoftDeleteSpec::new("deleted").default_value(0);
        let table = TableRef {
            database: Some("blog".into()),
            name: "post".into(),
            prefix: "tb_".into(),
        };
        let condition = live_condition(&spec, &table);
        assert_eq!(condition.operator, Operator::Eq);
        assert_eq!(condition.value, Value::Int(0));
        assert_eq!(condition.column, "blog.tb_post.deleted");

        let deleted = deleted_condition(&spec);
        assert_eq!(deleted.operator, Operator::Ne);
        assert_eq!(deleted.column, "deleted");
    }
}
