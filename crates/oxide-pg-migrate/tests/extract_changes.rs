//! End-to-end extraction and application against recorded transactions.

mod common;

use common::{extractor, migrated, CUSTOMER, CUSTOMER_V1, PURCHASE};
use oxide_pg_core::migrations::{CodeModelBuilder, ModelChange, ViewNode};
use oxide_pg_core::schema::Ident;
use oxide_pg_core::SchemaError;
use oxide_pg_migrate::{applied_migrations, MigrateError, MigrationExecutor};
use oxide_pg_orm::{DatabaseTransaction, QueryRow, RecordingTransaction, SqlValue};

// =============================================================================
// Extraction
// =============================================================================

#[tokio::test]
async fn test_missing_database_is_created() {
    let mut tx = RecordingTransaction::new(1);
    let changes = extractor(None)
        .extract_changes(&mut tx, &[&PURCHASE])
        .await
        .unwrap();

    assert!(matches!(
        &changes[0],
        ModelChange::CreateDatabase { database } if database == &Ident::from("app")
    ));
    assert!(changes.iter().all(|c| !c.is_removal()));

    let sql = MigrationExecutor::new().render(&changes);
    assert_eq!(sql[0], r#"create database "app""#);
    let position = |statement: &str| sql.iter().position(|s| s == statement).unwrap();
    assert!(position(r#"create schema "shop""#) < position(r#"create table "shop"."customer"()"#));
    assert!(
        position(r#"create type "shop"."status" as enum ('open', 'shipped')"#)
            < position(r#"create table "shop"."purchase"()"#)
    );
    assert!(sql.contains(&String::from(r#"create schema "oxide_migrations""#)));
}

#[tokio::test]
async fn test_new_column_is_the_only_change() {
    let mut tx = RecordingTransaction::new(1);
    let changes = extractor(Some(migrated(&[&CUSTOMER_V1])))
        .extract_changes(&mut tx, &[&CUSTOMER])
        .await
        .unwrap();

    assert_eq!(changes.len(), 1);
    let sql = MigrationExecutor::new().render(&changes);
    assert!(sql[0].starts_with(r#"alter table "shop"."customer" add column "email" text"#));
}

#[tokio::test]
async fn test_dropping_an_entity_is_refused() {
    let mut tx = RecordingTransaction::new(1);
    let err = extractor(Some(migrated(&[&PURCHASE])))
        .extract_changes(&mut tx, &[&CUSTOMER])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MigrateError::Schema(SchemaError::ImplicitTableDrop { ref table, .. })
            if table == "purchase"
    ));
}

#[tokio::test]
async fn test_views_are_recreated() {
    let view = |query: &str| ViewNode {
        schema: Ident::from("shop"),
        name: Ident::from("open_purchases"),
        query: query.to_string(),
    };
    let live = extractor(None)
        .expected_model(
            CodeModelBuilder::new()
                .entity(&PURCHASE)
                .view(view("select * from shop.purchase")),
        )
        .unwrap();

    let mut tx = RecordingTransaction::new(1);
    let changes = extractor(Some(live))
        .extract_model_changes(
            &mut tx,
            CodeModelBuilder::new()
                .entity(&PURCHASE)
                .view(view("select * from shop.purchase where status = 'open'")),
        )
        .await
        .unwrap();

    let described: Vec<String> = changes.iter().map(ToString::to_string).collect();
    assert_eq!(
        described,
        vec!["drop view shop.open_purchases", "create view shop.open_purchases"]
    );
}

// =============================================================================
// Application
// =============================================================================

#[tokio::test]
async fn test_extract_then_apply() {
    let mut tx = RecordingTransaction::new(42);
    let changes = extractor(Some(migrated(&[&CUSTOMER_V1])))
        .extract_changes(&mut tx, &[&CUSTOMER])
        .await
        .unwrap();
    let report = MigrationExecutor::new()
        .apply(&mut tx, "0002_customer_email", &changes)
        .await
        .unwrap();

    assert!(report.applied);
    assert_eq!(tx.commands().len(), 2);
    let history: Vec<_> = tx.commands()[1].values().cloned().collect();
    assert_eq!(history[0], SqlValue::Text(String::from("0002_customer_email")));
    assert_eq!(history[1], SqlValue::Int(42));
    let SqlValue::Text(commands) = &history[3] else {
        panic!("commands are stored as text");
    };
    let commands: Vec<String> = serde_json::from_str(commands).unwrap();
    assert_eq!(commands, report.statements);
    assert_eq!(tx.changes().len(), 1);
}

#[tokio::test]
async fn test_failed_statement_stops_the_migration() {
    let mut tx = RecordingTransaction::new(1);
    let changes = extractor(None)
        .extract_changes(&mut tx, &[&CUSTOMER])
        .await
        .unwrap();
    tx.fail_next(oxide_pg_orm::BackendError::with_code(
        "25001",
        "cannot run inside a transaction block",
    ));

    let err = MigrationExecutor::new()
        .apply(&mut tx, "0001_initial", &changes)
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::Orm(_)));
    assert_eq!(tx.commands().len(), 1);
    assert!(tx.changes().is_empty());
}

#[tokio::test]
async fn test_reading_history() {
    let row = QueryRow::new()
        .with("name", SqlValue::Text(String::from("0001_initial")))
        .with("version", SqlValue::Int(3))
        .with("applied_at", SqlValue::TimestampTz(chrono::Utc::now()))
        .with("commands", SqlValue::Text(String::from(r#"["create schema \"shop\""]"#)));
    let mut tx = RecordingTransaction::new(1).with_result(vec![row]);

    let history = applied_migrations(&mut tx).await.unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].commands, vec![r#"create schema "shop""#]);
    assert_eq!(
        tx.commands()[0].text,
        r#"select a."name", a."version", a."applied_at", a."commands" from "oxide_migrations"."applied_migration" a order by a."applied_at", a."name""#
    );
}
