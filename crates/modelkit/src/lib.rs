//! Declarative model metadata and a save pipeline for relational databases.
//!
//! `modelkit` re-exports the workspace crates behind one dependency:
//!
//! - [`core`]: values, declarations and compiled descriptors.
//! - [`query`]: statements, query building and the connection contract.
//! - [`model`]: records, save-data compilation and persistence operations.
//! - [`memory`] (feature `memory`): an in-process connection.
//!
//! Most programs only need the [`prelude`].
//!
//! ```ignore
//! use modelkit::prelude::*;
//!
//! let declarations = DeclarationSet::new().with(
//!     ModelDeclaration::builder("app::Article")
//!         .table(TableSpec::new("tb_article"))
//!         .column("id", FieldDescriptor::column("id", SemanticType::Int).auto_increment(true))
//!         .id("id", IdSpec::new())
//!         .column("title", FieldDescriptor::column("title", SemanticType::Varchar))
//!         .build(),
//! );
//! let orm = Orm::builder(declarations, connection).build();
//! let mut article = orm.new_record("app::Article", Row::new().with("title", "A"))?;
//! orm.save(&mut article)?;
//! ```

pub use modelkit_core as core;
pub use modelkit_model as model;
pub use modelkit_query as query;

#[cfg(feature = "memory")]
pub use modelkit_memory as memory;

pub use modelkit_core::{
    DeclarationSet, DescriptorRegistry, Error, ModelDeclaration, ModelDescriptor, ModelFork,
    Result, Row, SavePayload, SaveValue, Value,
};
pub use modelkit_model::{Existence, Operation, Orm, OrmBuilder, Record};
pub use modelkit_query::{Connection, QueryResult};

/// Everything needed to declare models and persist records.
pub mod prelude {
    pub use modelkit_core::{
        ConfigProvider, DeclarationProvider, DeclarationSet, EmptyConfig, EntitySpec, Error,
        FieldDescriptor, IdIndex, IdSpec, JsonConfig, JsonDecodeSpec, JsonEncodeSpec,
        ModelDeclaration, ModelDescriptor, ModelFork, Result, Row, SavePayload, SaveValue,
        SemanticType, SerializableMode, SerializablesSpec, SoftDeleteSpec, TableSpec,
        TimePrecision, Value,
    };
    pub use modelkit_model::{
        Clock, CoercionSet, EventBus, EventContext, Existence, FixedClock, GeneratorRegistry,
        IdGenerator, ModelEvent, ModelRef, NoRelations, Operation, Orm, OrmBuilder, Record,
        RelationRegistry, SoftDeletePolicy, SystemClock, UnixSeconds,
    };
    pub use modelkit_query::{
        AggregateFunction, Condition, Connection, Dialect, ModelQuery, Operator, QueryResult,
    };

    #[cfg(feature = "memory")]
    pub use modelkit_memory::{MemoryConnection, TableSchema};
}
