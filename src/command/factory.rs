use std::sync::Arc;

use chrono::Utc;

use super::{SaveAction, SaveCommand};
use crate::item::Item;
use crate::provider::EventPolicy;
use crate::store::ItemStore;
use crate::validation::ItemValidator;

/// Everything a new [`SaveCommand`] needs besides its item.
///
/// Shared by the provider and by every query result it yields, so a row can
/// turn itself into an update or delete command later.
pub(crate) struct CommandFactory<T: Item> {
    store: Arc<dyn ItemStore<T>>,
    validator: Arc<dyn ItemValidator<T>>,
    event_policy: EventPolicy,
}

impl<T: Item> CommandFactory<T> {
    pub(crate) fn new(
        store: Arc<dyn ItemStore<T>>,
        validator: Arc<dyn ItemValidator<T>>,
        event_policy: EventPolicy,
    ) -> Self {
        Self {
            store,
            validator,
            event_policy,
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn ItemStore<T>> {
        &self.store
    }

    pub(crate) fn validator(&self) -> &Arc<dyn ItemValidator<T>> {
        &self.validator
    }

    /// Stamps type name and timestamps on a fresh item.
    pub(crate) fn create(&self, mut item: T, id: &str, partition_key: &str) -> SaveCommand<T> {
        let now = Utc::now();
        let base = item.base_mut();
        base.id = id.to_string();
        base.partition_key = partition_key.to_string();
        base.type_name = T::TYPE_NAME.to_string();
        base.created_date_time = now;
        base.updated_date_time = now;
        self.command(item, SaveAction::Created)
    }

    pub(crate) fn update(&self, mut item: T) -> SaveCommand<T> {
        item.base_mut().updated_date_time = Utc::now();
        self.command(item, SaveAction::Updated)
    }

    pub(crate) fn delete(&self, mut item: T) -> SaveCommand<T> {
        let now = Utc::now();
        let base = item.base_mut();
        base.is_deleted = true;
        base.deleted_date_time = Some(now);
        base.updated_date_time = now;
        self.command(item, SaveAction::Deleted)
    }

    fn command(&self, item: T, save_action: SaveAction) -> SaveCommand<T> {
        SaveCommand::new(
            item,
            save_action,
            Arc::clone(&self.store),
            Arc::clone(&self.validator),
            self.event_policy,
        )
    }
}
