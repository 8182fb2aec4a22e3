//! Storage contract.
//!
//! Commands never talk to a backend directly; they hand [`SaveRequest`]s to an
//! [`ItemStore`]. A store owns optimistic concurrency (ETag compare-and-swap),
//! atomicity of batches and execution of queries.

mod memory;

pub use memory::InMemoryItemStore;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::command::{SaveRequest, SaveResult};
use crate::core::Result;
use crate::item::Item;
use crate::query::ItemQuery;

#[async_trait]
pub trait ItemStore<T: Item>: Send + Sync {
    /// Point read by id within a partition. Soft-deleted items are returned
    /// as stored; callers decide how to treat them.
    async fn read_item(
        &self,
        id: &str,
        partition_key: &str,
        token: &CancellationToken,
    ) -> Result<Option<T>>;

    /// Persists one item and its event.
    ///
    /// Without an ETag the write is insert-only; with one it succeeds only if
    /// the stored ETag still matches. Returns the item as stored, with its new
    /// version and ETag.
    async fn save_item(&self, request: SaveRequest<T>, token: &CancellationToken) -> Result<T>;

    /// Persists every request as one transaction scoped to `partition_key`.
    ///
    /// Returns one result per request, in input order. Either every result is
    /// OK or nothing was written.
    async fn save_batch(
        &self,
        partition_key: &str,
        requests: Vec<SaveRequest<T>>,
        token: &CancellationToken,
    ) -> Result<Vec<SaveResult<T>>>;

    async fn query(
        &self,
        query: ItemQuery,
        token: &CancellationToken,
    ) -> Result<BoxStream<'static, Result<T>>>;
}
