use std::fmt;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use super::SaveCommand;
use super::factory::CommandFactory;
use crate::core::{DataError, Result};
use crate::item::{Item, ItemProxy, ProxyManager};
use crate::validation::ValidationResult;

enum QueryResultState<T: Item> {
    Pending(Arc<CommandFactory<T>>),
    Transitioned(&'static str),
}

/// One row of a query: read-only, and convertible exactly once into an
/// update or a delete command.
pub struct QueryResult<T: Item> {
    manager: ProxyManager<T>,
    state: Mutex<QueryResultState<T>>,
}

impl<T: Item> QueryResult<T> {
    pub(crate) fn new(item: T, factory: Arc<CommandFactory<T>>) -> Self {
        let validator = Arc::clone(factory.validator());
        Self {
            manager: ProxyManager::new(item, true, validator),
            state: Mutex::new(QueryResultState::Pending(factory)),
        }
    }

    pub fn item(&self) -> &ItemProxy<T> {
        self.manager.item()
    }

    pub async fn validate(&self, token: &CancellationToken) -> Result<ValidationResult> {
        self.manager.validate(token).await
    }

    /// Returns a read-only command that soft-deletes this row.
    pub fn delete(&self) -> Result<SaveCommand<T>> {
        let factory = self.transition("delete")?;
        Ok(factory.delete(self.manager.item().snapshot()?))
    }

    /// Returns a mutable command over a copy of this row.
    pub fn update(&self) -> Result<SaveCommand<T>> {
        let factory = self.transition("update")?;
        Ok(factory.update(self.manager.item().snapshot()?))
    }

    fn transition(&self, method: &'static str) -> Result<Arc<CommandFactory<T>>> {
        let mut state = self.state.lock()?;
        match std::mem::replace(&mut *state, QueryResultState::Transitioned(method)) {
            QueryResultState::Pending(factory) => {
                self.manager.item().seal()?;
                Ok(factory)
            }
            QueryResultState::Transitioned(previous) => {
                *state = QueryResultState::Transitioned(previous);
                Err(DataError::InvalidOperation(format!(
                    "The QueryResult '{}()' method has already been called",
                    previous
                )))
            }
        }
    }
}

impl<T: Item> fmt::Debug for QueryResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("item", self.item())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{RequestContext, SaveAction};
    use crate::core::Value;
    use crate::provider::EventPolicy;
    use crate::store::InMemoryItemStore;
    use crate::test_support::{TestItem, test_validator};

    fn query_result() -> QueryResult<TestItem> {
        let factory = CommandFactory::new(
            Arc::new(InMemoryItemStore::<TestItem>::new()),
            test_validator(),
            EventPolicy::DecoratedChanges,
        );
        let mut item = TestItem::new("id", "pk");
        item.public_message = "A".into();
        QueryResult::new(item, Arc::new(factory))
    }

    #[test]
    fn test_query_result_is_read_only() {
        let result = query_result();
        assert_eq!(result.item().get("public_message").unwrap(), Value::from("A"));
        assert!(matches!(
            result.item().set("public_message", "B"),
            Err(DataError::ReadOnly(_))
        ));
    }

    #[test]
    fn test_delete_then_update_names_delete() {
        let result = query_result();
        let command = result.delete().unwrap();
        assert_eq!(command.save_action(), SaveAction::Deleted);
        assert_eq!(command.item().get("is_deleted").unwrap(), Value::Boolean(true));
        assert!(command.item().is_read_only().unwrap());

        let err = result.update().unwrap_err();
        assert!(err.is_invalid_operation());
        assert!(err.to_string().contains("'delete()'"));

        // a failed call does not overwrite the recorded method
        let err = result.delete().unwrap_err();
        assert!(err.to_string().contains("'delete()'"));
    }

    #[test]
    fn test_update_then_delete_names_update() {
        let result = query_result();
        let command = result.update().unwrap();
        assert_eq!(command.save_action(), SaveAction::Updated);
        command.item().set("public_message", "B").unwrap();

        // the command owns its own copy
        assert_eq!(result.item().get("public_message").unwrap(), Value::from("A"));

        let err = result.delete().unwrap_err();
        assert!(err.to_string().contains("'update()'"));
    }

    #[tokio::test]
    async fn test_racing_transitions_yield_one_command() {
        let result = Arc::new(query_result());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let result = Arc::clone(&result);
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        result.delete().is_ok()
                    } else {
                        result.update().is_ok()
                    }
                })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }
        assert_eq!(succeeded, 1);
    }

    #[tokio::test]
    async fn test_update_command_saves_against_store() {
        let store = Arc::new(InMemoryItemStore::<TestItem>::new());
        let factory = Arc::new(CommandFactory::new(
            store.clone(),
            test_validator(),
            EventPolicy::DecoratedChanges,
        ));
        let token = CancellationToken::new();

        let created = factory
            .create(TestItem::default(), "id", "pk")
            .save(&RequestContext::new(), &token)
            .await
            .unwrap()
            .into_item()
            .unwrap();

        let result = QueryResult::new(created, factory);
        let command = result.update().unwrap();
        command.item().set("public_message", "changed").unwrap();
        let saved = command.save(&RequestContext::new(), &token).await.unwrap();

        assert_eq!(saved.item().get("version").unwrap(), Value::Integer(2));
        assert_eq!(store.events().await.len(), 2);
    }
}
