//! Connection contract and statement outcomes.

use modelkit_core::{Result, Row};

use crate::statement::Statement;

/// Outcome of a mutating statement.
///
/// A failed statement is a normal outcome, not an error: callers inspect
/// [`QueryResult::is_success`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryResult {
    /// Whether the statement succeeded.
    pub success: bool,
    /// Rows written or removed.
    pub affected_rows: u64,
    /// Generated auto-increment id of an insert.
    pub last_insert_id: Option<i64>,
    /// Driver message for failures.
    pub message: Option<String>,
}

impl QueryResult {
    /// Successful outcome.
    pub fn success(affected_rows: u64) -> Self {
        Self {
            success: true,
            affected_rows,
            last_insert_id: None,
            message: None,
        }
    }

    /// Success without executing anything.
    pub fn trivial() -> Self {
        Self::success(0)
    }

    /// Failed outcome with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            affected_rows: 0,
            last_insert_id: None,
            message: Some(message.into()),
        }
    }

    /// Attach a generated id.
    pub fn with_last_insert_id(mut self, id: i64) -> Self {
        self.last_insert_id = Some(id);
        self
    }

    /// Whether the statement succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Generated id, if any.
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }
}

/// A database connection able to run structured statements.
///
/// Execution is synchronous; timeouts and retries belong to the
/// implementation. `Err` is reserved for statements that could not be run
/// at all.
pub trait Connection: Send + Sync {
    /// Run an insert, update, delete or replace.
    fn execute(&self, statement: &Statement) -> Result<QueryResult>;

    /// Run a select or aggregate.
    fn query(&self, statement: &Statement) -> Result<Vec<Row>>;
}

impl<C: Connection + ?Sized> Connection for std::sync::Arc<C> {
    fn execute(&self, statement: &Statement) -> Result<QueryResult> {
        (**self).execute(statement)
    }

    fn query(&self, statement: &Statement) -> Result<Vec<Row>> {
        (**self).query(statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_constructors() {
        let ok = QueryResult::success(1).with_last_insert_id(9);
        assert!(ok.is_success());
        assert_eq!(ok.last_insert_id(), Some(9));

        let trivial = QueryResult::trivial();
        assert!(trivial.is_success());
        assert_eq!(trivial.affected_rows, 0);

        let failed = QueryResult::failed("duplicate key");
        assert!(!failed.is_success());
        assert_eq!(failed.message.as_deref(), Some("duplicate key"));
    }
}
