#![allow(dead_code)]

use std::sync::Arc;

use trelnex_data::prelude::*;

#[derive(Debug, Clone, Default, PartialEq, TrackedItem)]
#[item(type_name = "test-item")]
pub struct TestItem {
    #[item(base)]
    pub base: BaseItem,
    pub public_message: String,
    #[item(untracked)]
    pub private_message: String,
    pub priority: i64,
    #[item(name = "label")]
    pub tag: Option<String>,
}

pub struct Harness {
    pub store: Arc<InMemoryItemStore<TestItem>>,
    pub provider: DataProvider<TestItem>,
    pub context: RequestContext,
    pub token: CancellationToken,
}

pub fn harness() -> Harness {
    harness_with(DataProviderOptions::new())
}

pub fn harness_with(options: DataProviderOptions) -> Harness {
    let store = Arc::new(InMemoryItemStore::<TestItem>::new());
    let validator = RuleValidator::<TestItem>::new().rule(
        "publicMessage",
        "'publicMessage' must not exceed 32 characters",
        |item: &TestItem| item.public_message.len() <= 32,
    );
    let provider = DataProvider::new(
        Arc::clone(&store) as Arc<dyn ItemStore<TestItem>>,
        Arc::new(validator),
        options,
    )
    .unwrap();

    Harness {
        store,
        provider,
        context: RequestContext::new().with_object_id("test-user"),
        token: CancellationToken::new(),
    }
}

impl Harness {
    /// Creates and saves one item with the given public message and priority.
    pub async fn seed(&self, id: &str, partition_key: &str, message: &str, priority: i64) {
        let command = self.provider.create(id, partition_key);
        command.item().set("public_message", message).unwrap();
        command.item().set("priority", priority).unwrap();
        command.save(&self.context, &self.token).await.unwrap();
    }
}
