mod common;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{COMMENT, MEMBER, NOW, declarations, harness, memory};
use modelkit::prelude::*;

#[test]
fn delete_marks_restore_clears_hard_delete_removes() {
    let h = harness(false);
    let mut comment = h
        .orm
        .new_record(COMMENT, Row::new().with("body", "first"))
        .unwrap();
    h.orm.insert(&mut comment).unwrap();
    assert_eq!(comment.get("deletedAt"), Some(&Value::Int(0)));
    assert_eq!(h.orm.count(COMMENT).unwrap(), 1);

    let result = h.orm.delete(&mut comment).unwrap();
    assert!(result.is_success());
    let statements = h.connection.statements();
    assert!(
        statements
            .last()
            .unwrap()
            .starts_with("UPDATE `tb_comment` SET `deleted_at` = ?")
    );
    assert_eq!(comment.get("deletedAt"), Some(&Value::Int(NOW)));
    assert_eq!(comment.existence(), Existence::NotExists);

    // Hidden from the default query, still stored.
    assert_eq!(h.orm.count(COMMENT).unwrap(), 0);
    assert!(h.orm.find(COMMENT, &[Value::Int(1)]).unwrap().is_none());
    assert_eq!(h.orm.origin_query(COMMENT).unwrap().count().unwrap(), 1);
    assert!(h.orm.exists(COMMENT, &[Value::Int(1)]).unwrap());

    let mut deleted = h
        .orm
        .find_deleted(COMMENT, &[Value::Int(1)])
        .unwrap()
        .unwrap();
    assert_eq!(deleted.get("body"), Some(&Value::from("first")));

    h.orm.restore(&mut deleted).unwrap();
    assert_eq!(deleted.get("deletedAt"), Some(&Value::Int(0)));
    assert_eq!(deleted.existence(), Existence::Exists);
    assert!(h.orm.find(COMMENT, &[Value::Int(1)]).unwrap().is_some());
    assert!(h.orm.find_deleted(COMMENT, &[Value::Int(1)]).unwrap().is_none());

    h.orm.hard_delete(&mut deleted).unwrap();
    assert_eq!(deleted.existence(), Existence::NotExists);
    assert!(h.connection.rows("tb_comment").is_empty());
    assert!(!h.orm.exists(COMMENT, &[Value::Int(1)]).unwrap());
}

#[test]
fn default_query_filters_on_qualified_marker() {
    let h = harness(false);
    let query = h.orm.query(COMMENT).unwrap();
    let condition = &query.conditions()[0];
    assert_eq!(condition.column, "tb_comment.deleted_at");
    assert_eq!(condition.operator, Operator::Eq);
    assert_eq!(condition.value, Value::Int(0));
    assert!(h.orm.origin_query(COMMENT).unwrap().conditions().is_empty());
    assert!(h.orm.query(MEMBER).unwrap().conditions().is_empty());
}

#[test]
fn custom_marker_policy() {
    let connection = memory();
    let orm = Orm::builder(declarations(false), connection.clone())
        .clock(Arc::new(FixedClock::at_unix(NOW)))
        .soft_delete_policy(|now: DateTime<Utc>| Value::Int(now.timestamp_millis()))
        .build();
    let mut comment = orm
        .new_record(COMMENT, Row::new().with("body", "first"))
        .unwrap();
    orm.insert(&mut comment).unwrap();
    orm.delete(&mut comment).unwrap();
    assert_eq!(
        connection.rows("tb_comment")[0].get("deleted_at"),
        Some(&Value::Int(NOW * 1_000))
    );
}

#[test]
fn soft_delete_needs_a_key() {
    let h = harness(false);
    let mut comment = h
        .orm
        .new_record(COMMENT, Row::new().with("body", "orphan"))
        .unwrap();
    assert!(h.orm.delete(&mut comment).unwrap_err().is_precondition());
    assert!(h.orm.restore(&mut comment).unwrap_err().is_precondition());
    assert_eq!(h.connection.query_count(), 0);
}

#[test]
fn plain_models_reject_soft_delete_operations() {
    let h = harness(false);
    let mut member = h
        .orm
        .new_record(MEMBER, Row::new().with("id", 1))
        .unwrap();
    assert!(h.orm.restore(&mut member).unwrap_err().is_configuration());
    assert!(h.orm.hard_delete(&mut member).unwrap_err().is_configuration());
    assert!(
        h.orm
            .find_deleted(MEMBER, &[Value::Int(1)])
            .unwrap_err()
            .is_configuration()
    );
}
