//! One-shot commands over items.
//!
//! A [`SaveCommand`] persists one create, update or delete and can be saved
//! once. A [`BatchCommand`] saves several commands as one partition-scoped
//! transaction. Reads end in a [`ReadResult`]; query rows arrive as
//! [`QueryResult`]s that may each turn into one update or delete command.

mod batch_command;
pub(crate) mod factory;
mod query_result;
mod read_result;
mod request;
mod save_command;

pub use batch_command::BatchCommand;
pub use query_result::QueryResult;
pub use read_result::ReadResult;
pub use request::{
    BatchResult, EVENT_TYPE_NAME, ItemEvent, RequestContext, SaveAction, SaveRequest, SaveResult,
};
pub use save_command::SaveCommand;
