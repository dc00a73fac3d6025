//! Structured statements and SQL rendering.
//!
//! A [`Statement`] is the exact description of one query: kind, target
//! table and pool, assignments, conditions and limit. Connections receive
//! the structured form and may render it with [`Statement::to_sql`], which
//! produces the SQL text plus bound parameters in the selected dialect.

use std::fmt;
use std::str::FromStr;

use modelkit_core::{SavePayload, SaveValue, Value};

/// SQL dialect used for identifier quoting and placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// Backtick identifiers, `?` placeholders.
    #[default]
    Mysql,
    /// Double-quoted identifiers, `$n` placeholders.
    Postgres,
    /// Double-quoted identifiers, `?` placeholders.
    Sqlite,
}

impl Dialect {
    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Mysql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Quote one identifier segment.
    pub fn quote(self, ident: &str) -> String {
        match self {
            Dialect::Mysql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Quote a possibly dotted identifier (`table.column`).
    pub fn quote_path(self, path: &str) -> String {
        path.split('.')
            .map(|segment| self.quote(segment))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// What a statement does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// `SELECT *`.
    Select,
    /// `INSERT`.
    Insert,
    /// `UPDATE`.
    Update,
    /// `DELETE`.
    Delete,
    /// `REPLACE` keyed by the conflict keys.
    Replace,
    /// `SELECT <function>(...)`.
    Aggregate,
}

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `IS`
    Is,
    /// `IS NOT`
    IsNot,
}

impl Operator {
    /// SQL spelling.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" => Operator::Eq,
            "!=" | "<>" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "is" => Operator::Is,
            "is not" => Operator::IsNot,
            other => return Err(format!("unsupported operator `{other}`")),
        };
        Ok(op)
    }
}

/// One `column <op> value` predicate. Conditions are joined with `AND`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column, optionally qualified as `table.column`.
    pub column: String,
    /// Operator.
    pub operator: Operator,
    /// Compared value.
    pub value: Value,
}

impl Condition {
    /// Build a condition.
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    /// Unqualified column name.
    pub fn column_name(&self) -> &str {
        self.column
            .rsplit_once('.')
            .map_or(self.column.as_str(), |(_, c)| c)
    }

    fn render(&self, dialect: Dialect, params: &mut Vec<Value>) -> String {
        let column = dialect.quote_path(&self.column);
        if self.value.is_null() {
            return match self.operator {
                Operator::Ne | Operator::IsNot => format!("{column} IS NOT NULL"),
                _ => format!("{column} IS NULL"),
            };
        }
        params.push(self.value.clone());
        format!(
            "{column} {} {}",
            self.operator,
            dialect.placeholder(params.len())
        )
    }
}

/// Aggregate function of an aggregate statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    /// `COUNT`
    Count,
    /// `SUM`
    Sum,
    /// `AVG`
    Avg,
    /// `MAX`
    Max,
    /// `MIN`
    Min,
}

impl AggregateFunction {
    /// SQL spelling.
    pub const fn as_sql(self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Min => "MIN",
        }
    }
}

/// Aggregate target: function plus column (`None` = `*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    /// Function.
    pub function: AggregateFunction,
    /// Column, `None` for `*`.
    pub column: Option<String>,
}

/// Target table of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableRef {
    /// Database name.
    pub database: Option<String>,
    /// Table name without prefix.
    pub name: String,
    /// Prefix prepended to `name`.
    pub prefix: String,
}

impl TableRef {
    /// Table without database or prefix.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            database: None,
            name: name.into(),
            prefix: String::new(),
        }
    }

    /// Prefixed table name, without database.
    pub fn table(&self) -> String {
        format!("{}{}", self.prefix, self.name)
    }

    /// `database.prefixed_table`, or just the prefixed table.
    pub fn qualified(&self) -> String {
        match &self.database {
            Some(db) => format!("{db}.{}", self.table()),
            None => self.table(),
        }
    }

    fn render(&self, dialect: Dialect) -> String {
        match &self.database {
            Some(db) => format!("{}.{}", dialect.quote(db), dialect.quote(&self.table())),
            None => dialect.quote(&self.table()),
        }
    }
}

/// A fully described statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Kind.
    pub kind: StatementKind,
    /// Target table.
    pub table: TableRef,
    /// Pool the statement runs on.
    pub pool: Option<String>,
    /// Column assignments for insert, update and replace.
    pub assignments: SavePayload,
    /// `AND`-joined conditions.
    pub conditions: Vec<Condition>,
    /// Row limit.
    pub limit: Option<usize>,
    /// Key columns of a replace.
    pub conflict_keys: Vec<String>,
    /// Aggregate target.
    pub aggregate: Option<Aggregate>,
}

impl Statement {
    /// Empty statement of `kind` against `table`.
    pub fn new(kind: StatementKind, table: TableRef) -> Self {
        Self {
            kind,
            table,
            pool: None,
            assignments: SavePayload::new(),
            conditions: Vec::new(),
            limit: None,
            conflict_keys: Vec::new(),
            aggregate: None,
        }
    }

    /// Render with the default dialect.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        self.to_sql_with_dialect(Dialect::default())
    }

    /// Render SQL and parameters.
    ///
    /// Raw assignments are inlined verbatim; every other value becomes a
    /// bound parameter.
    pub fn to_sql_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let table = self.table.render(dialect);
        let mut sql = match self.kind {
            StatementKind::Select => format!("SELECT * FROM {table}"),
            StatementKind::Aggregate => {
                let (function, column) = match &self.aggregate {
                    Some(agg) => (
                        agg.function.as_sql(),
                        agg.column
                            .as_deref()
                            .map_or_else(|| "*".to_string(), |c| dialect.quote_path(c)),
                    ),
                    None => ("COUNT", "*".to_string()),
                };
                format!("SELECT {function}({column}) FROM {table}")
            }
            StatementKind::Insert | StatementKind::Replace => {
                let verb = if self.kind == StatementKind::Insert {
                    "INSERT"
                } else {
                    "REPLACE"
                };
                let mut columns = Vec::with_capacity(self.assignments.len());
                let mut values = Vec::with_capacity(self.assignments.len());
                for (column, value) in self.assignments.iter() {
                    columns.push(dialect.quote(column));
                    values.push(render_value(value, dialect, &mut params));
                }
                format!(
                    "{verb} INTO {table} ({}) VALUES ({})",
                    columns.join(", "),
                    values.join(", ")
                )
            }
            StatementKind::Update => {
                let sets: Vec<String> = self
                    .assignments
                    .iter()
                    .map(|(column, value)| {
                        format!(
                            "{} = {}",
                            dialect.quote(column),
                            render_value(value, dialect, &mut params)
                        )
                    })
                    .collect();
                format!("UPDATE {table} SET {}", sets.join(", "))
            }
            StatementKind::Delete => format!("DELETE FROM {table}"),
        };

        if !self.conditions.is_empty() {
            let predicates: Vec<String> = self
                .conditions
                .iter()
                .map(|c| c.render(dialect, &mut params))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        (sql, params)
    }
}

fn render_value(value: &SaveValue, dialect: Dialect, params: &mut Vec<Value>) -> String {
    match value {
        SaveValue::Raw(fragment) => fragment.clone(),
        SaveValue::Value(v) => {
            params.push(v.clone());
            dialect.placeholder(params.len())
        }
    }
}
