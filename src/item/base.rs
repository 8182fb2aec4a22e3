use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FieldDescriptor;
use crate::core::{Value, ValueKind};

/// Fields every item carries. Owned by the provider and the store; never
/// change-tracked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseItem {
    pub id: String,
    pub partition_key: String,
    pub type_name: String,
    /// Incremented by the store on every successful save; zero before the first.
    pub version: i64,
    #[serde(rename = "_etag")]
    pub etag: Option<String>,
    pub created_date_time: DateTime<Utc>,
    pub updated_date_time: DateTime<Utc>,
    pub deleted_date_time: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}

impl BaseItem {
    pub const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("id", "id", ValueKind::Text).tracked(false),
        FieldDescriptor::new("partition_key", "partitionKey", ValueKind::Text).tracked(false),
        FieldDescriptor::new("type_name", "typeName", ValueKind::Text).tracked(false),
        FieldDescriptor::new("version", "version", ValueKind::Integer).tracked(false),
        FieldDescriptor::new("etag", "_etag", ValueKind::Text)
            .nullable(true)
            .tracked(false),
        FieldDescriptor::new("created_date_time", "createdDateTime", ValueKind::Timestamp)
            .tracked(false),
        FieldDescriptor::new("updated_date_time", "updatedDateTime", ValueKind::Timestamp)
            .tracked(false),
        FieldDescriptor::new("deleted_date_time", "deletedDateTime", ValueKind::Timestamp)
            .nullable(true)
            .tracked(false),
        FieldDescriptor::new("is_deleted", "isDeleted", ValueKind::Boolean).tracked(false),
    ];

    pub fn new(id: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            partition_key: partition_key.into(),
            ..Self::default()
        }
    }

    pub fn get_field(&self, name: &str) -> Option<Value> {
        let value = match name {
            "id" => Value::from(self.id.as_str()),
            "partition_key" => Value::from(self.partition_key.as_str()),
            "type_name" => Value::from(self.type_name.as_str()),
            "version" => Value::Integer(self.version),
            "etag" => Value::from(self.etag.clone()),
            "created_date_time" => Value::Timestamp(self.created_date_time),
            "updated_date_time" => Value::Timestamp(self.updated_date_time),
            "deleted_date_time" => Value::from(self.deleted_date_time),
            "is_deleted" => Value::Boolean(self.is_deleted),
            _ => return None,
        };
        Some(value)
    }
}
