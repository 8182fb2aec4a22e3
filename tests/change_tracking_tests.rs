mod common;

use common::{harness, harness_with};
use trelnex_data::prelude::*;
use trelnex_data::PropertyChange;

#[tokio::test]
async fn event_records_net_change_of_tracked_fields() {
    let h = harness();
    let command = h.provider.create("a", "p");
    command.item().set("public_message", "A").unwrap();
    command.item().set("private_message", "B").unwrap();
    command.save(&h.context, &h.token).await.unwrap();

    let update = h.provider.update("a", "p", &h.token).await.unwrap().unwrap();
    update.item().set("public_message", "C").unwrap();
    update.save(&h.context, &h.token).await.unwrap();

    let events = h.store.events().await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].save_action, SaveAction::Updated);
    assert_eq!(events[1].item_version, 2);
    assert_eq!(
        events[1].changes,
        vec![PropertyChange {
            property_name: "publicMessage".to_string(),
            old_value: Value::from("A"),
            new_value: Value::from("C"),
        }]
    );
}

#[tokio::test]
async fn writes_back_to_original_value_cancel_out() {
    let h = harness();
    h.seed("a", "p", "original", 1).await;

    let update = h.provider.update("a", "p", &h.token).await.unwrap().unwrap();
    update.item().set("public_message", "temporary").unwrap();
    update.item().set("public_message", "original").unwrap();
    update.item().set("priority", 2).unwrap();
    update.item().set("priority", 7).unwrap();

    let changes = update.item().property_changes().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].property_name, "priority");
    assert_eq!(changes[0].old_value, Value::Integer(1));
    assert_eq!(changes[0].new_value, Value::Integer(7));
}

#[tokio::test]
async fn untracked_fields_are_left_out_by_default() {
    let h = harness();
    let command = h.provider.create("a", "p");
    command.item().set("private_message", "secret").unwrap();
    command.item().set("tag", "visible").unwrap();
    command.save(&h.context, &h.token).await.unwrap();

    let changes = &h.store.events().await[0].changes;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].property_name, "label");
    assert_eq!(changes[0].old_value, Value::Null);
}

#[tokio::test]
async fn all_changes_policy_includes_untracked_fields() {
    let h = harness_with(DataProviderOptions::new().event_policy(EventPolicy::AllChanges));
    let command = h.provider.create("a", "p");
    command.item().set("private_message", "secret").unwrap();
    command.save(&h.context, &h.token).await.unwrap();

    let changes = &h.store.events().await[0].changes;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].property_name, "privateMessage");
}

#[tokio::test]
async fn no_changes_and_disabled_policies() {
    let quiet = harness_with(DataProviderOptions::new().event_policy(EventPolicy::NoChanges));
    let command = quiet.provider.create("a", "p");
    command.item().set("public_message", "hello").unwrap();
    command.save(&quiet.context, &quiet.token).await.unwrap();
    let events = quiet.store.events().await;
    assert_eq!(events.len(), 1);
    assert!(events[0].changes.is_empty());

    let silent = harness_with(DataProviderOptions::new().event_policy(EventPolicy::Disabled));
    silent.seed("a", "p", "hello", 1).await;
    assert!(silent.store.events().await.is_empty());
    assert_eq!(silent.store.len().await, 1);
}

#[tokio::test]
async fn delete_event_has_no_field_changes() {
    let h = harness();
    h.seed("a", "p", "hello", 1).await;

    let delete = h.provider.delete("a", "p", &h.token).await.unwrap().unwrap();
    delete.save(&h.context, &h.token).await.unwrap();

    let events = h.store.events().await;
    assert_eq!(events[1].save_action, SaveAction::Deleted);
    assert!(events[1].changes.is_empty());
    assert_eq!(events[1].related_type_name, "test-item");
}

#[tokio::test]
async fn event_serializes_with_external_names() {
    let h = harness();
    h.seed("a", "p", "hello", 1).await;

    let json = h.store.events().await[0].to_json().unwrap();
    assert_eq!(json["saveAction"], "CREATED");
    assert_eq!(json["relatedId"], "a");
    assert_eq!(json["context"]["objectId"], "test-user");
    assert_eq!(json["changes"][0]["propertyName"], "publicMessage");
}
