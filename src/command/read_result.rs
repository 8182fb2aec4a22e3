use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::Result;
use crate::item::{Item, ItemProxy, ProxyManager};
use crate::validation::{ItemValidator, ValidationResult};

/// Terminal, read-only view of an item: the outcome of a read or a save.
pub struct ReadResult<T: Item> {
    manager: ProxyManager<T>,
}

impl<T: Item> ReadResult<T> {
    pub(crate) fn new(item: T, validator: Arc<dyn ItemValidator<T>>) -> Self {
        Self {
            manager: ProxyManager::new(item, true, validator),
        }
    }

    pub fn item(&self) -> &ItemProxy<T> {
        self.manager.item()
    }

    pub async fn validate(&self, token: &CancellationToken) -> Result<ValidationResult> {
        self.manager.validate(token).await
    }

    pub fn into_item(self) -> Result<T> {
        self.manager.item().snapshot()
    }
}

impl<T: Item> fmt::Debug for ReadResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadResult")
            .field("item", self.item())
            .finish()
    }
}
