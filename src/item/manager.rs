use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{Item, ItemProxy, PropertyChange};
use crate::core::Result;
use crate::validation::{ItemValidator, ValidationResult};

/// Shared core of every item wrapper: the proxy plus the validator that
/// judges the item.
pub struct ProxyManager<T: Item> {
    proxy: ItemProxy<T>,
    validator: Arc<dyn ItemValidator<T>>,
}

impl<T: Item> ProxyManager<T> {
    pub fn new(item: T, read_only: bool, validator: Arc<dyn ItemValidator<T>>) -> Self {
        Self {
            proxy: ItemProxy::new(item, read_only),
            validator,
        }
    }

    pub fn item(&self) -> &ItemProxy<T> {
        &self.proxy
    }

    pub fn validator(&self) -> &Arc<dyn ItemValidator<T>> {
        &self.validator
    }

    pub fn property_changes(&self) -> Result<Vec<PropertyChange>> {
        self.proxy.property_changes()
    }

    /// Validates the item as it is now. Does not touch wrapper state.
    pub async fn validate(&self, token: &CancellationToken) -> Result<ValidationResult> {
        let snapshot = self.proxy.snapshot()?;
        self.validator.validate(&snapshot, token).await
    }
}
