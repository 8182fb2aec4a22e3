//! Everything a typical caller needs in one import.
//!
//! ```ignore
//! use trelnex_data::prelude::*;
//! ```

pub use crate::{
    BaseItem, BatchCommand, BatchResult, DataError, DataProvider, DataProviderOptions, EventPolicy,
    InMemoryItemStore, Item, ItemStore, ItemValidator, QueryCommand, QueryResult, ReadResult,
    RequestContext, Result, RuleValidator, SaveAction, SaveCommand, TrackedItem, Value, field,
    value,
};
pub use tokio_util::sync::CancellationToken;
