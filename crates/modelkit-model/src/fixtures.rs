//! Declarations shared by the unit tests of this crate.

use std::sync::Arc;

use modelkit_core::{
    CompileContext, DeclarationSet, EmptyConfig, EntitySpec, FieldDescriptor, IdSpec,
    ModelDeclaration, ModelDescriptor, NoCatalog, SemanticType, SoftDeleteSpec, TableSpec,
};
use modelkit_memory::{MemoryConnection, TableSchema};

use crate::generator::GeneratorRegistry;

pub const ARTICLE: &str = "app::Article";
pub const TAG: &str = "app::Tag";
pub const POST: &str = "app::Post";

/// Auto-increment article with both timestamp roles.
pub fn article(incremental: bool) -> ModelDeclaration {
    ModelDeclaration::builder(ARTICLE)
        .table(TableSpec::new("tb_article"))
        .entity(EntitySpec::new().incremental_update(incremental))
        .column(
            "id",
            FieldDescriptor::column("id", SemanticType::Int)
                .auto_increment(true)
                .unsigned(true),
        )
        .id("id", IdSpec::new())
        .column(
            "title",
            FieldDescriptor::column("title", SemanticType::Varchar).length(64),
        )
        .column(
            "content",
            FieldDescriptor::column("content", SemanticType::Text).nullable(true),
        )
        .column("views", FieldDescriptor::column("views", SemanticType::Int))
        .column(
            "tags",
            FieldDescriptor::column("tags", SemanticType::List).nullable(true),
        )
        .column("extra", FieldDescriptor::column("extra", SemanticType::Json))
        .column(
            "createTime",
            FieldDescriptor::column("create_time", SemanticType::DateTime).create_time(),
        )
        .column(
            "updateTime",
            FieldDescriptor::column("update_time", SemanticType::DateTime).update_time(),
        )
        .column("memo", FieldDescriptor::virtual_property())
        .build()
}

/// Composite key without auto-increment; `code` is generated.
pub fn tag() -> ModelDeclaration {
    ModelDeclaration::builder(TAG)
        .table(TableSpec::new("tb_tag").id(["site_id", "code"]))
        .column("siteId", FieldDescriptor::column("site_id", SemanticType::Int))
        .column("code", FieldDescriptor::column("code", SemanticType::Varchar))
        .id("code", IdSpec::excluded().generator("uuid"))
        .column("name", FieldDescriptor::column("name", SemanticType::Varchar))
        .build()
}

/// Soft-deletable post with a `NULL` marker default.
pub fn post() -> ModelDeclaration {
    ModelDeclaration::builder(POST)
        .table(TableSpec::new("tb_post").id(["id"]))
        .column(
            "id",
            FieldDescriptor::column("id", SemanticType::Int).auto_increment(true),
        )
        .column("title", FieldDescriptor::column("title", SemanticType::Varchar))
        .column(
            "deletedAt",
            FieldDescriptor::column("deleted_at", SemanticType::Int).nullable(true),
        )
        .soft_delete(SoftDeleteSpec::new("deletedAt"))
        .build()
}

pub fn declarations(incremental: bool) -> DeclarationSet {
    DeclarationSet::new()
        .with(article(incremental))
        .with(tag())
        .with(post())
}

pub fn compile(class: &str, incremental: bool) -> Arc<ModelDescriptor> {
    let declarations = declarations(incremental);
    let generators = GeneratorRegistry::new();
    let ctx = CompileContext {
        declarations: &declarations,
        config: &EmptyConfig,
        relations: &NoCatalog,
        generators: &generators,
    };
    Arc::new(ModelDescriptor::compile(class, false, ctx).unwrap())
}

pub fn memory() -> Arc<MemoryConnection> {
    Arc::new(
        MemoryConnection::new()
            .with_table(
                TableSchema::new("tb_article")
                    .primary_keys(["id"])
                    .auto_increment("id"),
            )
            .with_table(TableSchema::new("tb_tag").primary_keys(["site_id", "code"]))
            .with_table(
                TableSchema::new("tb_post")
                    .primary_keys(["id"])
                    .auto_increment("id"),
            ),
    )
}
