use std::fmt;

use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ReadResult;
use crate::core::{DataError, Result};
use crate::item::{Item, PropertyChange};

/// Type name under which save events are stored.
pub const EVENT_TYPE_NAME: &str = "event";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SaveAction {
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for SaveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
        };
        write!(f, "{label}")
    }
}

/// Who asked for a save, recorded on its event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub object_id: Option<String>,
    pub http_trace_identifier: Option<String>,
    pub http_request_path: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object_id(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    pub fn with_http_trace_identifier(mut self, trace_identifier: impl Into<String>) -> Self {
        self.http_trace_identifier = Some(trace_identifier.into());
        self
    }

    pub fn with_http_request_path(mut self, path: impl Into<String>) -> Self {
        self.http_request_path = Some(path.into());
        self
    }
}

/// Audit record persisted alongside an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEvent {
    pub id: String,
    pub partition_key: String,
    pub type_name: String,
    pub related_id: String,
    pub related_type_name: String,
    pub save_action: SaveAction,
    pub changes: Vec<PropertyChange>,
    pub context: RequestContext,
    /// Version the related item reached with this save; stamped by the store.
    pub item_version: i64,
    pub created_date_time: DateTime<Utc>,
}

impl ItemEvent {
    pub fn new<T: Item>(
        item: &T,
        save_action: SaveAction,
        changes: Vec<PropertyChange>,
        context: RequestContext,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            partition_key: item.base().partition_key.clone(),
            type_name: EVENT_TYPE_NAME.to_string(),
            related_id: item.base().id.clone(),
            related_type_name: T::TYPE_NAME.to_string(),
            save_action,
            changes,
            context,
            item_version: 0,
            created_date_time: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|err| DataError::TypeMismatch(format!("serialize event: {}", err)))
    }
}

/// Unit of work handed to a store. Built once per command.
#[derive(Debug, Clone)]
pub struct SaveRequest<T: Item> {
    pub item: T,
    pub event: Option<ItemEvent>,
    pub save_action: SaveAction,
}

/// Per-request outcome of a batch save; `item` is set only on success.
#[derive(Debug, Clone)]
pub struct SaveResult<T: Item> {
    pub status: StatusCode,
    pub item: Option<T>,
}

impl<T: Item> SaveResult<T> {
    pub fn ok(item: T) -> Self {
        Self {
            status: StatusCode::OK,
            item: Some(item),
        }
    }

    pub fn failed(status: StatusCode) -> Self {
        Self { status, item: None }
    }
}

/// What a batch caller sees per command, in `add` order.
pub struct BatchResult<T: Item> {
    pub status: StatusCode,
    pub read_result: Option<ReadResult<T>>,
}

impl<T: Item> BatchResult<T> {
    pub fn is_success(&self) -> bool {
        self.status == StatusCode::OK
    }
}

impl<T: Item> fmt::Debug for BatchResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchResult")
            .field("status", &self.status)
            .field("has_read_result", &self.read_result.is_some())
            .finish()
    }
}
