// ============================================================================
// Item Proxy
// ============================================================================
//
// Capability-restricted view over one item. Reads always succeed; writes
// succeed only while the proxy is mutable. Changes are not logged per write:
// the proxy keeps the item as it was when wrapped and diffs against it on
// demand, so a field written twice (or written back to its original value)
// reports its net change only.
//
// ============================================================================

use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::Item;
use crate::core::{DataError, Result, Value};

/// One field-level change recorded in a save event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChange {
    /// External (stored) name of the field.
    pub property_name: String,
    pub old_value: Value,
    pub new_value: Value,
}

struct ProxyState<T> {
    item: T,
    read_only: bool,
}

pub struct ItemProxy<T: Item> {
    state: RwLock<ProxyState<T>>,
    original: T,
}

impl<T: Item> fmt::Debug for ItemProxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ItemProxy");
        debug.field("type_name", &T::TYPE_NAME);
        match self.state.read() {
            Ok(state) => debug
                .field("id", &state.item.base().id)
                .field("read_only", &state.read_only),
            Err(_) => debug.field("state", &"poisoned"),
        };
        debug.finish()
    }
}

impl<T: Item> ItemProxy<T> {
    pub fn new(item: T, read_only: bool) -> Self {
        Self {
            original: item.clone(),
            state: RwLock::new(ProxyState { item, read_only }),
        }
    }

    pub fn is_read_only(&self) -> Result<bool> {
        Ok(self.state.read()?.read_only)
    }

    /// Makes the proxy permanently read-only.
    pub(crate) fn seal(&self) -> Result<()> {
        self.state.write()?.read_only = true;
        Ok(())
    }

    pub fn get(&self, field: &str) -> Result<Value> {
        self.state.read()?.item.get_field(field)
    }

    pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<()> {
        let mut state = self.state.write()?;
        if state.read_only {
            return Err(DataError::ReadOnly(T::TYPE_NAME));
        }
        state.item.set_field(field, value.into())
    }

    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let state = self.state.read()?;
        Ok(f(&state.item))
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut state = self.state.write()?;
        if state.read_only {
            return Err(DataError::ReadOnly(T::TYPE_NAME));
        }
        Ok(f(&mut state.item))
    }

    pub fn snapshot(&self) -> Result<T> {
        Ok(self.state.read()?.item.clone())
    }

    pub fn id(&self) -> Result<String> {
        self.read(|item| item.base().id.clone())
    }

    pub fn partition_key(&self) -> Result<String> {
        self.read(|item| item.base().partition_key.clone())
    }

    /// Net changes of tracked fields since the item was wrapped.
    pub fn property_changes(&self) -> Result<Vec<PropertyChange>> {
        self.diff(false)
    }

    /// Net changes of every domain field, tracked or not.
    pub fn all_property_changes(&self) -> Result<Vec<PropertyChange>> {
        self.diff(true)
    }

    fn diff(&self, include_untracked: bool) -> Result<Vec<PropertyChange>> {
        let state = self.state.read()?;
        let mut changes = Vec::new();

        for field in T::fields() {
            if !field.tracked && !include_untracked {
                continue;
            }

            let old_value = self.original.get_field(field.name)?;
            let new_value = state.item.get_field(field.name)?;
            if !old_value.same_as(&new_value) {
                changes.push(PropertyChange {
                    property_name: field.external_name.to_string(),
                    old_value,
                    new_value,
                });
            }
        }

        Ok(changes)
    }
}
