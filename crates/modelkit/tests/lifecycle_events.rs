mod common;

use std::sync::{Arc, Mutex};

use common::{MEMBER, harness, stored_member};
use modelkit::prelude::*;
use modelkit_memory::{MemoryConnection, TableSchema};

const ALL_EVENTS: [ModelEvent; 12] = [
    ModelEvent::BeforeInit,
    ModelEvent::AfterInit,
    ModelEvent::BeforeInsert,
    ModelEvent::AfterInsert,
    ModelEvent::BeforeUpdate,
    ModelEvent::AfterUpdate,
    ModelEvent::BeforeSave,
    ModelEvent::AfterSave,
    ModelEvent::BeforeDelete,
    ModelEvent::AfterDelete,
    ModelEvent::BeforeParseData,
    ModelEvent::AfterParseData,
];

fn record_events(events: &EventBus) -> Arc<Mutex<Vec<&'static str>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    for event in ALL_EVENTS {
        let sink = Arc::clone(&seen);
        events.on(event, move |ctx| {
            sink.lock().unwrap().push(ctx.event.name());
            Ok(())
        });
    }
    seen
}

#[test]
fn save_of_new_record_fires_in_order() {
    let h = harness(false);
    let seen = record_events(h.orm.events());
    let mut member = h
        .orm
        .new_record(MEMBER, Row::new().with("username", "neo"))
        .unwrap();
    h.orm.save(&mut member).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        [
            "before_init",
            "after_init",
            "before_parse_data",
            "after_parse_data",
            "before_save",
            "before_insert",
            "after_insert",
            "after_save",
        ]
    );
}

#[test]
fn update_and_delete_fire_around_statement() {
    let h = harness(false);
    h.connection.seed("tb_member", stored_member()).unwrap();
    let mut member = h.orm.find(MEMBER, &[Value::Int(1)]).unwrap().unwrap();
    let seen = record_events(h.orm.events());

    member.set("score", 2).unwrap();
    h.orm.update(&mut member).unwrap();
    h.orm.delete(&mut member).unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        [
            "before_parse_data",
            "after_parse_data",
            "before_update",
            "after_update",
            "before_delete",
            "after_delete",
        ]
    );
}

#[test]
fn listeners_can_rewrite_source_data_and_query() {
    let h = harness(false);
    h.orm
        .events()
        .on_class(MEMBER, ModelEvent::BeforeInit, |ctx| {
            if let Some(data) = ctx.data.as_deref_mut() {
                data.set("score", 100);
            }
            Ok(())
        });
    h.orm.events().on(ModelEvent::BeforeUpdate, |ctx| {
        if let Some(query) = ctx.query.as_deref_mut() {
            query.set_limit(None);
        }
        Ok(())
    });

    let mut member = h
        .orm
        .new_record(MEMBER, Row::new().with("username", "neo"))
        .unwrap();
    assert_eq!(member.get("score"), Some(&Value::Int(100)));
    h.orm.insert(&mut member).unwrap();

    member.set("score", 1).unwrap();
    h.orm.update(&mut member).unwrap();
    let statements = h.connection.statements();
    assert!(!statements.last().unwrap().contains("LIMIT"));
}

#[test]
fn after_listeners_see_the_result() {
    let h = harness(false);
    let affected = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&affected);
    h.orm.events().on(ModelEvent::AfterUpdate, move |ctx| {
        *sink.lock().unwrap() = ctx.result.as_deref().map(|r| r.affected_rows);
        Ok(())
    });
    h.connection.seed("tb_member", stored_member()).unwrap();
    let mut member = h.orm.find(MEMBER, &[Value::Int(1)]).unwrap().unwrap();
    member.set("score", 2).unwrap();
    h.orm.update(&mut member).unwrap();
    assert_eq!(*affected.lock().unwrap(), Some(1));
}

#[test]
fn listener_error_aborts_the_operation() {
    let h = harness(false);
    h.connection.seed("tb_member", stored_member()).unwrap();
    let mut member = h.orm.find(MEMBER, &[Value::Int(1)]).unwrap().unwrap();
    h.orm.events().on_class(MEMBER, ModelEvent::BeforeDelete, |_| {
        Err(Error::Precondition("members are never deleted".into()))
    });

    let before = h.connection.query_count();
    let err = h.orm.delete(&mut member).unwrap_err();
    assert!(err.is_precondition());
    assert_eq!(h.connection.query_count(), before);
    assert_eq!(member.existence(), Existence::Exists);
    assert_eq!(h.connection.rows("tb_member").len(), 1);
}

#[test]
fn dead_models_only_fire_parse_data_events() {
    let declarations = DeclarationSet::new().with(
        ModelDeclaration::builder("shop::AuditLog")
            .table(TableSpec::new("tb_audit_log"))
            .entity(EntitySpec::new().live_object(false))
            .column(
                "id",
                FieldDescriptor::column("id", SemanticType::Int).auto_increment(true),
            )
            .id("id", IdSpec::new())
            .column(
                "message",
                FieldDescriptor::column("message", SemanticType::Text),
            )
            .build(),
    );
    let connection = Arc::new(MemoryConnection::new().with_table(
        TableSchema::new("tb_audit_log")
            .primary_keys(["id"])
            .auto_increment("id"),
    ));
    let orm = Orm::builder(declarations, connection).build();
    let seen = record_events(orm.events());

    let mut log = orm
        .new_record("shop::AuditLog", Row::new().with("message", "login"))
        .unwrap();
    orm.save(&mut log).unwrap();
    orm.delete(&mut log).unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        ["before_parse_data", "after_parse_data"]
    );
}
