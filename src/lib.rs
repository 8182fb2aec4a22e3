// ============================================================================
// Trelnex Data Library
// ============================================================================

// lets `#[derive(TrackedItem)]` expand to `::trelnex_data::...` inside this crate
extern crate self as trelnex_data;

pub mod command;
pub mod core;
pub mod item;
pub mod prelude;
pub mod provider;
pub mod query;
pub mod store;
pub mod validation;

// Re-export main types for convenience
pub use crate::command::{
    BatchCommand, BatchResult, ItemEvent, QueryResult, ReadResult, RequestContext, SaveAction,
    SaveCommand, SaveRequest, SaveResult,
};
pub use crate::core::{DataError, FieldValue, Result, Value, ValueKind};
pub use crate::item::{BaseItem, FieldDescriptor, Item, ItemProxy, PropertyChange};
pub use crate::provider::{DataProvider, DataProviderOptions, EventPolicy};
pub use crate::query::{ExpressionConverter, Filter, ItemQuery, Predicate, QueryCommand, field, value};
pub use crate::store::{InMemoryItemStore, ItemStore};
pub use crate::validation::{
    CompositeValidator, ItemValidator, RuleValidator, ValidationFailure, ValidationResult,
};

pub use trelnex_data_derive::TrackedItem;
