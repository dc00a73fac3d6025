//! Query building and the connection contract for modelkit.
//!
//! The save pipeline does not own a SQL dialect or a driver. It drives this
//! crate instead: [`QueryFactory`] binds a [`ModelQuery`] to a model's
//! table and pool, the query turns payloads and conditions into structured
//! [`Statement`]s, and a [`Connection`] executes them.

pub mod builder;
pub mod connection;
pub mod statement;

pub use builder::{ModelQuery, QueryFactory};
pub use connection::{Connection, QueryResult};
pub use statement::{
    Aggregate, AggregateFunction, Condition, Dialect, Operator, Statement, StatementKind, TableRef,
};
