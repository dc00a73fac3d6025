//! Models and storage shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use modelkit::prelude::*;
use modelkit_memory::{MemoryConnection, TableSchema};

pub const MEMBER: &str = "shop::Member";
pub const ORDER_ITEM: &str = "shop::OrderItem";
pub const COMMENT: &str = "shop::Comment";

/// 2024-03-05 06:07:08 UTC.
pub const NOW: i64 = 1_709_618_828;

pub fn member(incremental: bool) -> ModelDeclaration {
    ModelDeclaration::builder(MEMBER)
        .table(TableSpec::new("tb_member"))
        .entity(EntitySpec::new().incremental_update(incremental))
        .column(
            "id",
            FieldDescriptor::column("id", SemanticType::Int)
                .auto_increment(true)
                .unsigned(true),
        )
        .id("id", IdSpec::new())
        .column(
            "username",
            FieldDescriptor::column("username", SemanticType::Varchar).length(16),
        )
        .column("score", FieldDescriptor::column("score", SemanticType::Int))
        .column("profile", FieldDescriptor::column("profile", SemanticType::Json))
        .column(
            "roles",
            FieldDescriptor::column("roles", SemanticType::List).nullable(true),
        )
        .column(
            "password",
            FieldDescriptor::column("password", SemanticType::Varchar),
        )
        .serializable("password", false)
        .column(
            "createTime",
            FieldDescriptor::column("create_time", SemanticType::DateTime).create_time(),
        )
        .column(
            "updateTime",
            FieldDescriptor::column("update_time", SemanticType::DateTime).update_time(),
        )
        .column("nickname", FieldDescriptor::virtual_property())
        .build()
}

/// Composite key declared out of order: `sku` is key 1, `shopId` key 0.
pub fn order_item() -> ModelDeclaration {
    ModelDeclaration::builder(ORDER_ITEM)
        .table(TableSpec::new("tb_order_item").use_prefix(true))
        .column("sku", FieldDescriptor::column("sku", SemanticType::Varchar))
        .id("sku", IdSpec::at(1))
        .column(
            "shopId",
            FieldDescriptor::column("shop_id", SemanticType::Int),
        )
        .id("shopId", IdSpec::at(0))
        .column(
            "quantity",
            FieldDescriptor::column("quantity", SemanticType::Int),
        )
        .build()
}

/// Soft-deletable comment whose marker defaults to `0`.
pub fn comment() -> ModelDeclaration {
    ModelDeclaration::builder(COMMENT)
        .table(TableSpec::new("tb_comment"))
        .column(
            "id",
            FieldDescriptor::column("id", SemanticType::Int).auto_increment(true),
        )
        .id("id", IdSpec::new())
        .column("body", FieldDescriptor::column("body", SemanticType::Text))
        .column(
            "deletedAt",
            FieldDescriptor::column("deleted_at", SemanticType::Int).default_value(0),
        )
        .soft_delete(SoftDeleteSpec::new("deletedAt").default_value(0))
        .build()
}

pub fn declarations(incremental: bool) -> DeclarationSet {
    DeclarationSet::new()
        .with(member(incremental))
        .with(order_item())
        .with(comment())
}

pub fn memory() -> Arc<MemoryConnection> {
    Arc::new(
        MemoryConnection::new()
            .with_table(
                TableSchema::new("tb_member")
                    .primary_keys(["id"])
                    .auto_increment("id"),
            )
            .with_table(TableSchema::new("tb_order_item").primary_keys(["shop_id", "sku"]))
            .with_table(
                TableSchema::new("tb_comment")
                    .primary_keys(["id"])
                    .auto_increment("id"),
            ),
    )
}

pub struct Harness {
    pub orm: Orm,
    pub connection: Arc<MemoryConnection>,
    pub clock: Arc<FixedClock>,
}

pub fn harness(incremental: bool) -> Harness {
    let connection = memory();
    let clock = Arc::new(FixedClock::at_unix(NOW));
    let orm = Orm::builder(declarations(incremental), connection.clone())
        .clock(clock.clone())
        .build();
    Harness {
        orm,
        connection,
        clock,
    }
}

/// Collects the payload columns seen by `event`.
pub fn capture_columns(orm: &Orm, event: ModelEvent) -> Arc<Mutex<Vec<Vec<String>>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    orm.events().on(event, move |ctx| {
        if let Some(payload) = ctx.payload.as_deref() {
            let columns = payload.columns().map(ToString::to_string).collect();
            sink.lock().unwrap().push(columns);
        }
        Ok(())
    });
    seen
}

/// A stored member row with every column populated.
pub fn stored_member() -> Row {
    Row::new()
        .with("username", "neo")
        .with("score", 1)
        .with("profile", r#"{"vip":true}"#)
        .with("roles", "admin,dev")
        .with("password", "secret")
        .with("create_time", "2024-01-01 00:00:00")
        .with("update_time", "2024-01-01 00:00:00")
}
