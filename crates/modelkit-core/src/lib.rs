//! Core types and compiled model metadata for modelkit.
//!
//! `modelkit-core` is the **foundation layer** of the workspace. It defines the
//! data types every other crate shares and the one-time compilation of model
//! declarations into immutable descriptors.
//!
//! # Role In The Architecture
//!
//! - **Data model**: `Value`, `Row`, `SavePayload` and `SemanticType` carry field
//!   values, query results and compiled save payloads.
//! - **Declarations**: `ModelDeclaration` and its specs state how a class maps onto
//!   a table; `DeclarationProvider` looks them up by class name.
//! - **Metadata**: `ModelDescriptor::compile` validates a declaration and freezes it;
//!   `DescriptorRegistry` caches one shared descriptor per `(class, inherit)`.
//! - **Contracts**: `ConfigProvider`, `RelationCatalog` and `GeneratorCatalog` are
//!   the read-only collaborators consulted during compilation.
//!
//! # Who Uses This Crate
//!
//! - `modelkit-query` renders statements from descriptors, forks and payloads.
//! - `modelkit-model` builds records and the save pipeline on top of descriptors.
//! - `modelkit-memory` stores `Row`s and evaluates `Value` predicates.

pub mod catalog;
pub mod config;
pub mod declare;
pub mod error;
pub mod field;
pub mod fork;
pub mod meta;
pub mod naming;
pub mod payload;
pub mod registry;
pub mod row;
pub mod types;
pub mod value;

pub use catalog::{GeneratorCatalog, NoCatalog, RelationCatalog};
pub use config::{ConfigProvider, EmptyConfig, JsonConfig, ModelOverride, OrmSettings};
pub use declare::{
    ColumnSpec, DeclarationProvider, DeclarationSet, EntitySpec, IdIndex, IdSpec,
    ModelDeclaration, ModelDeclarationBuilder, SerializableMode, SerializablesSpec,
    SoftDeleteSpec, TableSpec,
};
pub use error::{Error, Result};
pub use field::{FieldDescriptor, JsonDecodeSpec, JsonEncodeSpec, TimePrecision};
pub use fork::ModelFork;
pub use meta::{CompileContext, ModelDescriptor};
pub use naming::{is_valid_identifier, to_camel};
pub use payload::{SavePayload, SaveValue};
pub use registry::DescriptorRegistry;
pub use row::Row;
pub use types::SemanticType;
pub use value::Value;
