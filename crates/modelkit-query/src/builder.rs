//! Model-bound query builder.
//!
//! A [`ModelQuery`] is pre-bound to a table and pool by the
//! [`QueryFactory`]. Conditions and a limit are accumulated fluently; the
//! terminal methods build a [`Statement`] and hand it to the connection.
//!
//! # Example
//!
//! ```ignore
//! let query = factory.for_descriptor(&descriptor)?;
//! let result = query
//!     .filter_eq("id", 1)
//!     .limit(1)
//!     .update(SavePayload::new().with("title", "B"))?;
//! assert!(result.is_success());
//! ```

use std::fmt;
use std::sync::Arc;

use modelkit_core::{Error, ModelDescriptor, ModelFork, Result, Row, SavePayload, Value};

use crate::connection::{Connection, QueryResult};
use crate::statement::{
    Aggregate, AggregateFunction, Condition, Dialect, Operator, Statement, StatementKind, TableRef,
};

/// Query bound to one table and pool.
#[derive(Clone)]
pub struct ModelQuery {
    connection: Arc<dyn Connection>,
    table: TableRef,
    pool: Option<String>,
    conditions: Vec<Condition>,
    limit: Option<usize>,
    dialect: Dialect,
}

impl fmt::Debug for ModelQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelQuery")
            .field("table", &self.table)
            .field("pool", &self.pool)
            .field("conditions", &self.conditions)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl ModelQuery {
    /// Query against `table` on `pool`.
    pub fn new(connection: Arc<dyn Connection>, table: TableRef, pool: Option<String>) -> Self {
        Self {
            connection,
            table,
            pool,
            conditions: Vec::new(),
            limit: None,
            dialect: Dialect::default(),
        }
    }

    /// Set the dialect used when logging rendered SQL.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Add a `column <op> value` condition.
    pub fn filter(mut self, column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        self.push_condition(Condition::new(column, operator, value));
        self
    }

    /// Add a `column = value` condition.
    pub fn filter_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, Operator::Eq, value)
    }

    /// Limit the number of rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Add a condition in place.
    pub fn push_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    /// Replace the limit in place.
    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    /// Target table.
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Target pool.
    pub fn pool(&self) -> Option<&str> {
        self.pool.as_deref()
    }

    /// Accumulated conditions.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Current limit.
    pub fn current_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Build the statement of `kind` from the current state.
    pub fn statement(&self, kind: StatementKind) -> Statement {
        let mut statement = Statement::new(kind, self.table.clone());
        statement.pool.clone_from(&self.pool);
        statement.conditions.clone_from(&self.conditions);
        statement.limit = self.limit;
        statement
    }

    /// Insert `payload`.
    pub fn insert(&self, payload: SavePayload) -> Result<QueryResult> {
        let mut statement = self.statement(StatementKind::Insert);
        statement.conditions.clear();
        statement.limit = None;
        statement.assignments = payload;
        self.execute(&statement)
    }

    /// Update matching rows with `payload`.
    pub fn update(&self, payload: SavePayload) -> Result<QueryResult> {
        let mut statement = self.statement(StatementKind::Update);
        statement.assignments = payload;
        self.execute(&statement)
    }

    /// Delete matching rows.
    pub fn delete(&self) -> Result<QueryResult> {
        self.execute(&self.statement(StatementKind::Delete))
    }

    /// Insert or replace `payload`, keyed by `keys`.
    pub fn replace(&self, payload: SavePayload, keys: &[String]) -> Result<QueryResult> {
        let mut statement = self.statement(StatementKind::Replace);
        statement.conditions.clear();
        statement.limit = None;
        statement.assignments = payload;
        statement.conflict_keys = keys.to_vec();
        self.execute(&statement)
    }

    /// Fetch matching rows.
    pub fn select(&self) -> Result<Vec<Row>> {
        let statement = self.statement(StatementKind::Select);
        self.trace(&statement);
        self.connection.query(&statement)
    }

    /// Fetch the first matching row.
    pub fn first(&self) -> Result<Option<Row>> {
        let mut statement = self.statement(StatementKind::Select);
        statement.limit = Some(1);
        self.trace(&statement);
        Ok(self.connection.query(&statement)?.into_iter().next())
    }

    /// Run an aggregate; `column = None` aggregates `*`.
    pub fn aggregate(&self, function: AggregateFunction, column: Option<&str>) -> Result<Value> {
        let mut statement = self.statement(StatementKind::Aggregate);
        statement.aggregate = Some(Aggregate {
            function,
            column: column.map(ToString::to_string),
        });
        self.trace(&statement);
        let rows = self.connection.query(&statement)?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .map_or(Value::Null, |(_, value)| value))
    }

    /// Count matching rows.
    pub fn count(&self) -> Result<i64> {
        Ok(self
            .aggregate(AggregateFunction::Count, None)?
            .as_i64()
            .unwrap_or(0))
    }

    fn trace(&self, statement: &Statement) {
        let (sql, params) = statement.to_sql_with_dialect(self.dialect);
        tracing::trace!(sql = %sql, params = params.len(), pool = ?self.pool, "Running statement");
    }

    fn execute(&self, statement: &Statement) -> Result<QueryResult> {
        self.trace(statement);
        let result = self.connection.execute(statement)?;
        if !result.is_success() {
            tracing::warn!(
                table = %self.table.qualified(),
                message = ?result.message,
                "Statement reported failure"
            );
        }
        Ok(result)
    }
}

/// Produces queries pre-bound to a model's table and pool.
#[derive(Clone)]
pub struct QueryFactory {
    connection: Arc<dyn Connection>,
    table_prefix: String,
    default_pool: Option<String>,
    dialect: Dialect,
}

impl fmt::Debug for QueryFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryFactory")
            .field("table_prefix", &self.table_prefix)
            .field("default_pool", &self.default_pool)
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

impl QueryFactory {
    /// Factory over `connection`.
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            table_prefix: String::new(),
            default_pool: None,
            dialect: Dialect::default(),
        }
    }

    /// Prefix applied to tables that opt in.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Pool used when a model names none.
    pub fn with_default_pool(mut self, pool: Option<String>) -> Self {
        self.default_pool = pool;
        self
    }

    /// Dialect for rendered SQL.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Query against a descriptor's own table and pool.
    pub fn for_descriptor(&self, descriptor: &Arc<ModelDescriptor>) -> Result<ModelQuery> {
        self.for_fork(&ModelFork::new(Arc::clone(descriptor)))
    }

    /// Query against a fork's effective table and pool.
    pub fn for_fork(&self, fork: &ModelFork) -> Result<ModelQuery> {
        let descriptor = fork.descriptor();
        let name = fork.table_name().ok_or_else(|| {
            Error::configuration(descriptor.class_name(), "model has no table declaration")
        })?;
        let table = TableRef {
            database: fork.database_name().map(ToString::to_string),
            name: name.to_string(),
            prefix: if descriptor.use_prefix() {
                self.table_prefix.clone()
            } else {
                String::new()
            },
        };
        let pool = fork
            .pool_name()
            .map(ToString::to_string)
            .or_else(|| self.default_pool.clone());
        Ok(ModelQuery::new(Arc::clone(&self.connection), table, pool).with_dialect(self.dialect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every statement and answers with canned rows.
    #[derive(Default)]
    struct Recorder {
        statements: Mutex<Vec<Statement>>,
        rows: Vec<Row>,
    }

    impl Connection for Recorder {
        fn execute(&self, statement: &Statement) -> Result<QueryResult> {
            self.statements.lock().unwrap().push(statement.clone());
            Ok(QueryResult::success(1))
        }

        fn query(&self, statement: &Statement) -> Result<Vec<Row>> {
            self.statements.lock().unwrap().push(statement.clone());
            Ok(self.rows.clone())
        }
    }

    #[test]
    fn test_update_carries_conditions_and_limit() {
        let recorder = Arc::new(Recorder::default());
        let query = ModelQuery::new(recorder.clone(), TableRef::new("tb_article"), Some("main".into()))
            .filter_eq("id", 1)
            .limit(1);
        let result = query.update(SavePayload::new().with("title", "B")).unwrap();
        assert!(result.is_success());

        let statements = recorder.statements.lock().unwrap();
        let stmt = &statements[0];
        assert_eq!(stmt.kind, StatementKind::Update);
        assert_eq!(stmt.pool.as_deref(), Some("main"));
        assert_eq!(stmt.limit, Some(1));
        assert_eq!(
            stmt.to_sql().0,
            "UPDATE `tb_article` SET `title` = ? WHERE `id` = ? LIMIT 1"
        );
    }

    #[test]
    fn test_insert_ignores_conditions() {
        let recorder = Arc::new(Recorder::default());
        let query = ModelQuery::new(recorder.clone(), TableRef::new("t"), None).filter_eq("id", 1);
        query.insert(SavePayload::new().with("a", 1)).unwrap();
        let statements = recorder.statements.lock().unwrap();
        assert!(statements[0].conditions.is_empty());
    }

    #[test]
    fn test_count_reads_first_value() {
        let recorder = Arc::new(Recorder {
            rows: vec![Row::new().with("COUNT(*)", 3)],
            ..Recorder::default()
        });
        let query = ModelQuery::new(recorder, TableRef::new("t"), None);
        assert_eq!(query.count().unwrap(), 3);
    }
}
