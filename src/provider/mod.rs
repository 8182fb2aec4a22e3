//! Entry point for callers: creates commands and queries for one item type.

pub mod config;

pub use config::{DataProviderOptions, EventPolicy, validate_type_name};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

use crate::command::factory::CommandFactory;
use crate::command::{BatchCommand, ReadResult, SaveCommand};
use crate::core::Result;
use crate::item::Item;
use crate::query::{CompareOp, Filter, QueryCommand};
use crate::store::ItemStore;
use crate::validation::{CompositeValidator, ItemValidator, RuleValidator};

pub struct DataProvider<T: Item> {
    factory: Arc<CommandFactory<T>>,
}

impl<T: Item + Default> DataProvider<T> {
    /// `validator` runs after the base-item rules (non-empty id and partition
    /// key, matching type name).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use trelnex_data::prelude::*;
    ///
    /// #[derive(Clone, Default, TrackedItem)]
    /// #[item(type_name = "note")]
    /// struct Note {
    ///     #[item(base)]
    ///     base: BaseItem,
    ///     body: String,
    /// }
    ///
    /// # tokio_test::block_on(async {
    /// let provider = DataProvider::new(
    ///     Arc::new(InMemoryItemStore::<Note>::new()),
    ///     Arc::new(RuleValidator::<Note>::new()),
    ///     DataProviderOptions::new(),
    /// )
    /// .unwrap();
    ///
    /// let command = provider.create("note-1", "user-1");
    /// command.item().set("body", "hello").unwrap();
    /// let saved = command
    ///     .save(&RequestContext::new(), &CancellationToken::new())
    ///     .await
    ///     .unwrap();
    /// assert_eq!(saved.item().read(|note| note.base.version).unwrap(), 1);
    /// # });
    /// ```
    pub fn new(
        store: Arc<dyn ItemStore<T>>,
        validator: Arc<dyn ItemValidator<T>>,
        options: DataProviderOptions,
    ) -> Result<Self> {
        options.validate(T::TYPE_NAME)?;

        let validator = CompositeValidator::<T>::new()
            .with(Arc::new(RuleValidator::<T>::base_item()))
            .with(validator);

        event!(
            Level::DEBUG,
            type_name = T::TYPE_NAME,
            event_policy = %options.event_policy,
            "data provider created"
        );

        Ok(Self {
            factory: Arc::new(CommandFactory::new(
                store,
                Arc::new(validator),
                options.event_policy,
            )),
        })
    }

    /// A mutable command creating a new item.
    pub fn create(&self, id: &str, partition_key: &str) -> SaveCommand<T> {
        self.factory.create(T::default(), id, partition_key)
    }

    /// Deleted items read as absent.
    pub async fn read(
        &self,
        id: &str,
        partition_key: &str,
        token: &CancellationToken,
    ) -> Result<Option<ReadResult<T>>> {
        Ok(self
            .read_live(id, partition_key, token)
            .await?
            .map(|item| ReadResult::new(item, Arc::clone(self.factory.validator()))))
    }

    /// A mutable command over the stored item, or `None` if there is none.
    pub async fn update(
        &self,
        id: &str,
        partition_key: &str,
        token: &CancellationToken,
    ) -> Result<Option<SaveCommand<T>>> {
        Ok(self
            .read_live(id, partition_key, token)
            .await?
            .map(|item| self.factory.update(item)))
    }

    /// A read-only command soft-deleting the stored item, or `None` if there
    /// is none.
    pub async fn delete(
        &self,
        id: &str,
        partition_key: &str,
        token: &CancellationToken,
    ) -> Result<Option<SaveCommand<T>>> {
        Ok(self
            .read_live(id, partition_key, token)
            .await?
            .map(|item| self.factory.delete(item)))
    }

    /// A query over live items of this type.
    pub fn query(&self) -> QueryCommand<T> {
        QueryCommand::new(Arc::clone(&self.factory)).with_filter(
            Filter::compare("typeName", CompareOp::Eq, T::TYPE_NAME)
                .and(Filter::compare("isDeleted", CompareOp::Eq, false)),
        )
    }

    pub fn batch(&self) -> BatchCommand<T> {
        BatchCommand::new(Arc::clone(self.factory.store()))
    }

    async fn read_live(
        &self,
        id: &str,
        partition_key: &str,
        token: &CancellationToken,
    ) -> Result<Option<T>> {
        let item = self.factory.store().read_item(id, partition_key, token).await?;
        Ok(item.filter(|item| !item.base().is_deleted))
    }
}
