mod common;

use common::{TestItem, harness};
use http::StatusCode;
use trelnex_data::prelude::*;

#[tokio::test]
async fn create_then_delete_leaves_nothing_to_query() {
    let h = harness();

    let create = h.provider.create("item-x", "partition-p");
    create.item().set("public_message", "Public #1").unwrap();
    let created = create.save(&h.context, &h.token).await.unwrap();
    assert_eq!(created.item().read(|item| item.base.version).unwrap(), 1);
    assert_eq!(
        created.item().get("public_message").unwrap(),
        Value::from("Public #1")
    );

    let delete = h
        .provider
        .delete("item-x", "partition-p", &h.token)
        .await
        .unwrap()
        .unwrap();
    let deleted = delete.save(&h.context, &h.token).await.unwrap();
    let deleted_item = deleted.into_item().unwrap();
    assert_eq!(deleted_item.base.version, 2);
    assert!(deleted_item.base.is_deleted);
    assert!(deleted_item.base.deleted_date_time.is_some());

    let results = h.provider.query().to_vec(&h.token).await.unwrap();
    assert!(results.is_empty());
    assert!(
        h.provider
            .read("item-x", "partition-p", &h.token)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn save_is_single_shot() {
    let h = harness();
    let command = h.provider.create("a", "p");
    command.save(&h.context, &h.token).await.unwrap();

    let err = command.save(&h.context, &h.token).await.unwrap_err();
    assert!(err.is_invalid_operation());
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn saved_item_becomes_read_only() {
    let h = harness();
    let command = h.provider.create("a", "p");
    let result = command.save(&h.context, &h.token).await.unwrap();

    assert!(command.item().is_read_only().unwrap());
    assert!(matches!(
        command.item().set("public_message", "late"),
        Err(DataError::ReadOnly("test-item"))
    ));
    assert!(result.item().is_read_only().unwrap());
    assert!(result.item().set("public_message", "late").is_err());
}

#[tokio::test]
async fn delete_command_cannot_be_edited() {
    let h = harness();
    h.seed("a", "p", "hello", 1).await;

    let delete = h.provider.delete("a", "p", &h.token).await.unwrap().unwrap();
    assert_eq!(delete.save_action(), SaveAction::Deleted);
    assert!(matches!(
        delete.item().set("public_message", "changed"),
        Err(DataError::ReadOnly(_))
    ));
}

#[tokio::test]
async fn validation_failure_keeps_command_usable() {
    let h = harness();
    let command = h.provider.create("a", "p");
    command
        .item()
        .set("public_message", "x".repeat(40))
        .unwrap();

    let validation = command.validate(&h.token).await.unwrap();
    assert!(!validation.is_valid());
    assert_eq!(validation.failures()[0].property_name, "publicMessage");

    let err = command.save(&h.context, &h.token).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    assert!(h.store.is_empty().await);

    command.item().set("public_message", "short").unwrap();
    let saved = command.save(&h.context, &h.token).await.unwrap();
    assert_eq!(saved.item().read(|item| item.base.version).unwrap(), 1);
}

#[tokio::test]
async fn storage_failure_keeps_command_usable() {
    let h = harness();
    h.store.fail_next_save(StatusCode::SERVICE_UNAVAILABLE).await;

    let command = h.provider.create("a", "p");
    let err = command.save(&h.context, &h.token).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(!command.item().is_read_only().unwrap());

    command.save(&h.context, &h.token).await.unwrap();
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn concurrent_saves_persist_once() {
    let h = harness();
    let command = h.provider.create("a", "p");

    let (first, second) = tokio::join!(
        command.save(&h.context, &h.token),
        command.save(&h.context, &h.token)
    );

    assert_eq!(
        [first.is_ok(), second.is_ok()]
            .iter()
            .filter(|ok| **ok)
            .count(),
        1
    );
    let failure = first.err().or(second.err()).unwrap();
    assert!(failure.is_invalid_operation());
    assert_eq!(h.store.events().await.len(), 1);
}

#[tokio::test]
async fn validate_alongside_concurrent_saves() {
    let h = harness();
    let command = h.provider.create("a", "p");
    command.item().set("public_message", "racing").unwrap();

    let (validation, first, second) = tokio::join!(
        command.validate(&h.token),
        command.save(&h.context, &h.token),
        command.save(&h.context, &h.token)
    );

    assert!(validation.unwrap().is_valid());
    let saved = match (first, second) {
        (Ok(saved), Err(err)) | (Err(err), Ok(saved)) => {
            assert!(err.is_invalid_operation());
            saved
        }
        _ => panic!("exactly one save should succeed"),
    };
    assert_eq!(saved.item().read(|item| item.base.version).unwrap(), 1);
    assert_eq!(h.store.events().await.len(), 1);
    assert!(command.item().is_read_only().unwrap());
}

#[tokio::test]
async fn stale_update_is_rejected_by_store() {
    let h = harness();
    h.seed("a", "p", "first", 1).await;

    let early = h.provider.update("a", "p", &h.token).await.unwrap().unwrap();
    let late = h.provider.update("a", "p", &h.token).await.unwrap().unwrap();

    early.item().set("public_message", "early").unwrap();
    early.save(&h.context, &h.token).await.unwrap();

    late.item().set("public_message", "late").unwrap();
    let err = late.save(&h.context, &h.token).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::CONFLICT);

    let stored = h.provider.read("a", "p", &h.token).await.unwrap().unwrap();
    assert_eq!(stored.item().get("public_message").unwrap(), Value::from("early"));
}

#[tokio::test]
async fn cancelled_save_writes_nothing() {
    let h = harness();
    let command = h.provider.create("a", "p");
    h.token.cancel();

    let err = command.save(&h.context, &h.token).await.unwrap_err();
    assert!(matches!(err, DataError::Cancelled));
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn base_fields_are_not_settable() {
    let h = harness();
    let command = h.provider.create("a", "p");
    assert!(command.item().set("id", "other").is_err());
    assert!(command.item().set("version", 9).is_err());
    assert!(matches!(
        command.item().set("unknown", "x"),
        Err(DataError::FieldNotFound(_, _))
    ));
}

#[tokio::test]
async fn read_result_validates_stored_item() {
    let h = harness();
    h.seed("a", "p", "hello", 3).await;

    let read = h.provider.read("a", "p", &h.token).await.unwrap().unwrap();
    assert!(read.validate(&h.token).await.unwrap().is_valid());
    let item: TestItem = read.into_item().unwrap();
    assert_eq!(item.priority, 3);
    assert_eq!(item.base.type_name, "test-item");
}
