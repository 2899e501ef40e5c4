//! Runs against a real database. Point `CATALOG_TESTING_DB_CONNECTION_STRING`
//! at a migrated database (see `initdb`) and run with `--ignored`.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use mocap_catalog::config::{get_variable, DbSettings};
use mocap_catalog::db::{Db, PgDb};
use mocap_catalog::recording::{AnimationRecord, CreateAnimation, RecordPatch};
use mocap_catalog::sync::{self, EditedRow};
use mocap_catalog::validation::validate_for_create;

async fn connect() -> PgDb {
    let connection_string = get_variable("CATALOG_TESTING_DB_CONNECTION_STRING")
        .expect("read CATALOG_TESTING_DB_CONNECTION_STRING");

    PgDb::connect(&DbSettings::new(connection_string, 2))
        .await
        .expect("connect to testing database")
}

/// Inserts a record with a name no other test uses.
async fn insert(db: &PgDb, prefix: &str) -> AnimationRecord {
    let input = CreateAnimation {
        original_filename: Some(format!("{}-{}.bvh", prefix, Uuid::new_v4())),
        duration_seconds: Some(12.5),
        frame_count: Some(300),
        frame_time: Some(0.0333),
        fps: Some(30.0),
        bone_count: Some(42),
        actor_gender: Some("Other".to_owned()),
        ..Default::default()
    };

    let metadata = validate_for_create(input).expect("validate record");

    db.insert(metadata).await.expect("insert record")
}

#[tokio::test]
#[ignore]
async fn inserted_records_can_be_retrieved() {
    let db = connect().await;

    let record = insert(&db, "retrieve").await;
    let retrieved = db
        .retrieve(record.id())
        .await
        .expect("retrieve record")
        .expect("record exists");

    assert_eq!(retrieved.external_id(), record.external_id());
    assert_eq!(retrieved.metadata(), record.metadata());
    assert!(db
        .retrieve_all()
        .await
        .expect("retrieve all records")
        .iter()
        .any(|r| r.id() == record.id()));

    db.close().await;
}

#[tokio::test]
#[ignore]
async fn delete_many_counts_existing_rows() {
    let db = connect().await;

    let first = insert(&db, "delete").await;
    let second = insert(&db, "delete").await;
    let ids = [first.id(), second.id(), i32::MAX]
        .iter()
        .copied()
        .collect::<BTreeSet<_>>();

    assert_eq!(db.delete_many(&ids).await.expect("delete records"), 2);
    assert_eq!(db.delete_many(&ids).await.expect("delete records again"), 0);

    db.close().await;
}

#[tokio::test]
#[ignore]
async fn updates_need_an_existing_record() {
    let db = connect().await;

    let patch = RecordPatch {
        fps: Some(24.0),
        ..Default::default()
    };

    assert!(db.update_fields(i32::MAX, patch.clone()).await.is_err());
    assert!(db.update_fields(i32::MAX, RecordPatch::default()).await.is_err());

    let record = insert(&db, "update").await;
    db.update_fields(record.id(), patch).await.expect("update record");

    let updated = db
        .retrieve(record.id())
        .await
        .expect("retrieve record")
        .expect("record exists");
    assert_eq!(updated.metadata().fps, 24.0);

    db.close().await;
}

#[tokio::test]
#[ignore]
async fn uncommitted_transaction_is_rolled_back() {
    let db = connect().await;
    let record = insert(&db, "rollback").await;

    {
        let mut transaction = db.begin().await.expect("begin transaction");
        let patch = RecordPatch {
            description: Some(Some("never saved".to_owned())),
            ..Default::default()
        };
        transaction
            .update_fields(record.id(), patch)
            .await
            .expect("update within transaction");
    }

    let stored = db
        .retrieve(record.id())
        .await
        .expect("retrieve record")
        .expect("record exists");
    assert_eq!(stored.metadata().description, None);

    db.close().await;
}

#[tokio::test]
#[ignore]
async fn reconcile_isolates_bad_rows() {
    let db = Arc::new(connect().await);

    let first = insert(&db, "reconcile").await;
    let second = insert(&db, "reconcile").await;
    let third = insert(&db, "reconcile").await;

    let rows: Vec<EditedRow> = serde_json::from_value(json!([
        {"id": first.id(), "fps": 60, "actor_gender": ""},
        {"id": second.id(), "frame_count": "abc"},
        {"id": third.id(), "has_fingers": 1},
    ]))
    .expect("parse rows");

    let summary = sync::reconcile(Arc::new(log::discard()), db.clone(), rows)
        .await
        .expect("reconcile rows");

    assert_eq!(summary.updated, 2);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].row_id, second.id());

    let first = db.retrieve(first.id()).await.expect("retrieve").expect("exists");
    assert_eq!(first.metadata().fps, 60.0);
    assert_eq!(first.metadata().actor_gender, None);

    let third = db.retrieve(third.id()).await.expect("retrieve").expect("exists");
    assert!(third.metadata().has_fingers);

    db.close().await;
}
