//! In-process connection for modelkit.
//!
//! `MemoryConnection` executes structured statements over in-memory tables.
//! It honours conditions, limits, auto-increment columns and primary-key
//! uniqueness, evaluates the simple raw fragments the save pipeline emits
//! (`views + 1`, literals, `NULL`), and logs the rendered SQL of every
//! statement so tests can count queries.
//!
//! It is not a SQL engine: statements are never parsed from text.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use modelkit_core::{Error, Result, Row, SavePayload, SaveValue, Value};
use modelkit_query::{
    AggregateFunction, Condition, Connection, Operator, QueryResult, Statement, StatementKind,
};

/// Shape of an in-memory table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    primary_keys: Vec<String>,
    auto_increment: Option<String>,
}

impl TableSchema {
    /// Table addressed by its qualified name (`db.table` or `table`,
    /// including any prefix).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_keys: Vec::new(),
            auto_increment: None,
        }
    }

    /// Primary-key columns, checked for uniqueness on insert.
    pub fn primary_keys<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Auto-increment column.
    pub fn auto_increment(mut self, column: impl Into<String>) -> Self {
        self.auto_increment = Some(column.into());
        self
    }

    /// Qualified name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
struct Table {
    schema: TableSchema,
    rows: Vec<Row>,
    next_id: i64,
}

impl Table {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            next_id: 1,
        }
    }

    fn matching(&self, conditions: &[Condition]) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| conditions.iter().all(|c| matches_condition(row, c)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Fill the auto-increment column and return the id it holds.
    fn assign_id(&mut self, row: &mut Row) -> Option<i64> {
        let column = self.schema.auto_increment.clone()?;
        let current = row.get(&column).and_then(Value::as_i64).filter(|&id| id > 0);
        let id = match current {
            Some(id) => {
                self.next_id = self.next_id.max(id + 1);
                id
            }
            None => {
                let id = self.next_id;
                self.next_id += 1;
                row.set(column, id);
                id
            }
        };
        Some(id)
    }

    fn key_of(&self, row: &Row) -> Option<Vec<Value>> {
        if self.schema.primary_keys.is_empty() {
            return None;
        }
        Some(
            self.schema
                .primary_keys
                .iter()
                .map(|k| row.get(k).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }

    fn position_of_key(&self, key: &[Value]) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| self.key_of(row).is_some_and(|k| k == key))
    }
}

/// An in-memory [`Connection`].
#[derive(Debug, Default)]
pub struct MemoryConnection {
    tables: RwLock<HashMap<String, Table>>,
    log: Mutex<Vec<String>>,
    fail_next: Mutex<Option<String>>,
}

impl MemoryConnection {
    /// Connection without tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reset) a table.
    pub fn create_table(&self, schema: TableSchema) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.insert(schema.name.clone(), Table::new(schema));
    }

    /// Builder-style `create_table`.
    pub fn with_table(self, schema: TableSchema) -> Self {
        self.create_table(schema);
        self
    }

    /// Store a row directly, bypassing the statement log.
    pub fn seed(&self, table: &str, row: Row) -> Result<()> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables
            .get_mut(table)
            .ok_or_else(|| Error::Query(format!("no such table `{table}`")))?;
        let mut row = row;
        table.assign_id(&mut row);
        table.rows.push(row);
        Ok(())
    }

    /// Snapshot of a table's rows.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.get(table).map(|t| t.rows.clone()).unwrap_or_default()
    }

    /// Rendered SQL of every statement run so far.
    pub fn statements(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of statements run so far.
    pub fn query_count(&self) -> usize {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Forget the statement log.
    pub fn clear_log(&self) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Make the next mutating statement report failure with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        *self
            .fail_next
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    fn record(&self, statement: &Statement) {
        let (sql, _) = statement.to_sql();
        tracing::trace!(sql = %sql, "Memory connection statement");
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql);
    }

    fn take_failure(&self) -> Option<String> {
        self.fail_next
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

fn missing_table(name: &str) -> Error {
    Error::Query(format!("no such table `{name}`"))
}

impl Connection for MemoryConnection {
    fn execute(&self, statement: &Statement) -> Result<QueryResult> {
        self.record(statement);
        if let Some(message) = self.take_failure() {
            return Ok(QueryResult::failed(message));
        }

        let name = statement.table.qualified();
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables.get_mut(&name).ok_or_else(|| missing_table(&name))?;

        match statement.kind {
            StatementKind::Insert => {
                let mut row = apply_payload(Row::new(), &statement.assignments);
                let id = table.assign_id(&mut row);
                if let Some(key) = table.key_of(&row) {
                    if table.position_of_key(&key).is_some() {
                        return Ok(QueryResult::failed(format!(
                            "duplicate primary key in `{name}`"
                        )));
                    }
                }
                table.rows.push(row);
                let result = QueryResult::success(1);
                Ok(match id {
                    Some(id) => result.with_last_insert_id(id),
                    None => result,
                })
            }
            StatementKind::Replace => {
                let mut row = apply_payload(Row::new(), &statement.assignments);
                let id = table.assign_id(&mut row);
                let existing = table.key_of(&row).and_then(|k| table.position_of_key(&k));
                let affected = match existing {
                    Some(pos) => {
                        table.rows[pos] = row;
                        2
                    }
                    None => {
                        table.rows.push(row);
                        1
                    }
                };
                let result = QueryResult::success(affected);
                Ok(match id {
                    Some(id) => result.with_last_insert_id(id),
                    None => result,
                })
            }
            StatementKind::Update => {
                let mut hits = table.matching(&statement.conditions);
                if let Some(limit) = statement.limit {
                    hits.truncate(limit);
                }
                for &i in &hits {
                    let current = std::mem::take(&mut table.rows[i]);
                    table.rows[i] = apply_payload(current, &statement.assignments);
                }
                Ok(QueryResult::success(hits.len() as u64))
            }
            StatementKind::Delete => {
                let mut hits = table.matching(&statement.conditions);
                if let Some(limit) = statement.limit {
                    hits.truncate(limit);
                }
                for &i in hits.iter().rev() {
                    table.rows.remove(i);
                }
                Ok(QueryResult::success(hits.len() as u64))
            }
            StatementKind::Select | StatementKind::Aggregate => Err(Error::Query(
                "read statements must go through `query`".to_string(),
            )),
        }
    }

    fn query(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.record(statement);
        let name = statement.table.qualified();
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let table = tables.get(&name).ok_or_else(|| missing_table(&name))?;

        let mut hits: Vec<&Row> = table
            .matching(&statement.conditions)
            .into_iter()
            .map(|i| &table.rows[i])
            .collect();

        match statement.kind {
            StatementKind::Select => {
                if let Some(limit) = statement.limit {
                    hits.truncate(limit);
                }
                Ok(hits.into_iter().cloned().collect())
            }
            StatementKind::Aggregate => {
                let (function, column) = statement
                    .aggregate
                    .as_ref()
                    .map_or((AggregateFunction::Count, None), |a| {
                        (a.function, a.column.as_deref())
                    });
                let label = format!(
                    "{}({})",
                    function.as_sql(),
                    column.unwrap_or("*")
                );
                let value = aggregate(function, column, &hits);
                Ok(vec![Row::new().with(label, value)])
            }
            _ => Err(Error::Query(
                "write statements must go through `execute`".to_string(),
            )),
        }
    }
}

fn matches_condition(row: &Row, condition: &Condition) -> bool {
    let actual = row.get(condition.column_name()).unwrap_or(&Value::Null);
    let expected = &condition.value;
    if expected.is_null() {
        return match condition.operator {
            Operator::Ne | Operator::IsNot => !actual.is_null(),
            _ => actual.is_null(),
        };
    }
    if actual.is_null() {
        return false;
    }
    let ordering = actual.compare(expected);
    let equal = actual == expected || ordering == Some(Ordering::Equal);
    match condition.operator {
        Operator::Eq | Operator::Is => equal,
        Operator::Ne | Operator::IsNot => !equal,
        Operator::Lt => ordering == Some(Ordering::Less),
        Operator::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        Operator::Gt => ordering == Some(Ordering::Greater),
        Operator::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
    }
}

fn apply_payload(mut row: Row, payload: &SavePayload) -> Row {
    let mut evaluated = Vec::with_capacity(payload.len());
    for (column, value) in payload.iter() {
        let value = match value {
            SaveValue::Value(v) => v.clone(),
            SaveValue::Raw(fragment) => eval_raw(fragment, &row),
        };
        evaluated.push((column.to_string(), value));
    }
    for (column, value) in evaluated {
        row.set(column, value);
    }
    row
}

/// Evaluate a raw fragment against the row being written.
///
/// Understands `NULL`, numeric and quoted literals, bare column references
/// and `column +|- number`. Anything else is stored verbatim as text.
fn eval_raw(fragment: &str, row: &Row) -> Value {
    let parts: Vec<&str> = fragment.split_whitespace().collect();
    match parts.as_slice() {
        [single] => eval_atom(single, row),
        [left, op @ ("+" | "-"), right] => {
            let lhs = eval_atom(left, row);
            let rhs = eval_atom(right, row);
            match (lhs, rhs) {
                (Value::Int(a), Value::Int(b)) => {
                    Value::Int(if *op == "+" { a + b } else { a - b })
                }
                (a, b) => match (a.as_f64(), b.as_f64()) {
                    (Some(a), Some(b)) => Value::Float(if *op == "+" { a + b } else { a - b }),
                    _ => Value::Null,
                },
            }
        }
        _ => Value::Text(fragment.to_string()),
    }
}

fn eval_atom(atom: &str, row: &Row) -> Value {
    if atom.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(i) = atom.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = atom.parse::<f64>() {
        return Value::Float(f);
    }
    if let Some(text) = atom
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Value::Text(text.to_string());
    }
    row.get(atom.trim_matches('`')).cloned().unwrap_or(Value::Null)
}

fn aggregate(function: AggregateFunction, column: Option<&str>, rows: &[&Row]) -> Value {
    let values: Vec<&Value> = match column {
        Some(c) => rows
            .iter()
            .filter_map(|row| row.get(c))
            .filter(|v| !v.is_null())
            .collect(),
        None => Vec::new(),
    };
    match function {
        AggregateFunction::Count => {
            let n = if column.is_some() { values.len() } else { rows.len() };
            Value::Int(n as i64)
        }
        AggregateFunction::Sum => {
            if values.is_empty() {
                return Value::Null;
            }
            if values.iter().all(|v| matches!(v, Value::Int(_))) {
                Value::Int(values.iter().filter_map(|v| v.as_i64()).sum())
            } else {
                Value::Float(values.iter().filter_map(|v| v.as_f64()).sum())
            }
        }
        AggregateFunction::Avg => {
            let nums: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
            if nums.is_empty() {
                Value::Null
            } else {
                Value::Float(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }
        AggregateFunction::Max => values
            .into_iter()
            .max_by(|a, b| a.compare(b).unwrap_or(Ordering::Equal))
            .cloned()
            .unwrap_or(Value::Null),
        AggregateFunction::Min => values
            .into_iter()
            .min_by(|a, b| a.compare(b).unwrap_or(Ordering::Equal))
            .cloned()
            .unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelkit_query::{Aggregate, TableRef};

    fn connection() -> MemoryConnection {
        MemoryConnection::new().with_table(
            TableSchema::new("tb_article")
                .primary_keys(["id"])
                .auto_increment("id"),
        )
    }

    fn insert(conn: &MemoryConnection, payload: SavePayload) -> QueryResult {
        let mut stmt = Statement::new(StatementKind::Insert, TableRef::new("tb_article"));
        stmt.assignments = payload;
        conn.execute(&stmt).unwrap()
    }

    #[test]
    fn test_insert_assigns_ids() {
        let conn = connection();
        let first = insert(&conn, SavePayload::new().with("title", "a"));
        let second = insert(&conn, SavePayload::new().with("title", "b"));
        assert_eq!(first.last_insert_id(), Some(1));
        assert_eq!(second.last_insert_id(), Some(2));
        assert_eq!(conn.rows("tb_article").len(), 2);
        assert_eq!(conn.query_count(), 2);
    }

    #[test]
    fn test_duplicate_key_fails() {
        let conn = connection();
        insert(&conn, SavePayload::new().with("id", 5));
        let dup = insert(&conn, SavePayload::new().with("id", 5));
        assert!(!dup.is_success());
        let next = insert(&conn, SavePayload::new());
        assert_eq!(next.last_insert_id(), Some(6));
    }

    #[test]
    fn test_update_with_raw_fragment() {
        let conn = connection();
        insert(&conn, SavePayload::new().with("views", 10));
        let mut stmt = Statement::new(StatementKind::Update, TableRef::new("tb_article"));
        stmt.assignments = SavePayload::new().with("views", SaveValue::Raw("views + 1".into()));
        stmt.conditions.push(Condition::new("id", Operator::Eq, 1));
        stmt.limit = Some(1);
        let result = conn.execute(&stmt).unwrap();
        assert_eq!(result.affected_rows, 1);
        assert_eq!(conn.rows("tb_article")[0].get("views"), Some(&Value::Int(11)));
    }

    #[test]
    fn test_select_filters_null() {
        let conn = connection();
        insert(&conn, SavePayload::new().with("deleted", Value::Null));
        insert(&conn, SavePayload::new().with("deleted", 1));
        let mut stmt = Statement::new(StatementKind::Select, TableRef::new("tb_article"));
        stmt.conditions
            .push(Condition::new("tb_article.deleted", Operator::Eq, Value::Null));
        let rows = conn.query(&stmt).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_aggregates() {
        let conn = connection();
        for views in [3, 5, 10] {
            insert(&conn, SavePayload::new().with("views", views));
        }
        let mut stmt = Statement::new(StatementKind::Aggregate, TableRef::new("tb_article"));
        let mut run = |function, column: Option<&str>| {
            stmt.aggregate = Some(Aggregate {
                function,
                column: column.map(ToString::to_string),
            });
            conn.query(&stmt).unwrap()[0].iter().next().unwrap().1.clone()
        };
        assert_eq!(run(AggregateFunction::Count, None), Value::Int(3));
        assert_eq!(run(AggregateFunction::Sum, Some("views")), Value::Int(18));
        assert_eq!(run(AggregateFunction::Avg, Some("views")), Value::Float(6.0));
        assert_eq!(run(AggregateFunction::Max, Some("views")), Value::Int(10));
        assert_eq!(run(AggregateFunction::Min, Some("views")), Value::Int(3));
    }

    #[test]
    fn test_replace_by_key() {
        let conn = connection();
        insert(&conn, SavePayload::new().with("title", "a"));
        let mut stmt = Statement::new(StatementKind::Replace, TableRef::new("tb_article"));
        stmt.assignments = SavePayload::new().with("id", 1).with("title", "b");
        stmt.conflict_keys = vec!["id".into()];
        let result = conn.execute(&stmt).unwrap();
        assert!(result.is_success());
        let rows = conn.rows("tb_article");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("title"), Some(&Value::from("b")));
    }

    #[test]
    fn test_fail_next_and_missing_table() {
        let conn = connection();
        conn.fail_next("boom");
        let failed = insert(&conn, SavePayload::new());
        assert!(!failed.is_success());
        assert!(conn.rows("tb_article").is_empty());

        let stmt = Statement::new(StatementKind::Delete, TableRef::new("nope"));
        assert!(conn.execute(&stmt).is_err());
    }
}
