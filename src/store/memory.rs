use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use http::StatusCode;
use log::{debug, warn};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::ItemStore;
use crate::command::{ItemEvent, SaveAction, SaveRequest, SaveResult};
use crate::core::{DataError, Result};
use crate::item::Item;
use crate::query::{ItemQuery, evaluate};

type ItemKey = (String, String);

struct StoreState<T> {
    items: HashMap<ItemKey, T>,
    events: Vec<ItemEvent>,
    injected_failure: Option<StatusCode>,
}

/// Process-local [`ItemStore`] with the same concurrency and atomicity rules
/// as a real backend. Deletes are soft: the item stays, flagged deleted.
pub struct InMemoryItemStore<T> {
    state: RwLock<StoreState<T>>,
}

impl<T: Item> InMemoryItemStore<T> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                items: HashMap::new(),
                events: Vec::new(),
                injected_failure: None,
            }),
        }
    }

    /// Number of stored items, deleted ones included.
    pub async fn len(&self) -> usize {
        self.state.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every event written so far, in write order.
    pub async fn events(&self) -> Vec<ItemEvent> {
        self.state.read().await.events.clone()
    }

    /// Makes the next `save_item` or `save_batch` fail with `status`.
    pub async fn fail_next_save(&self, status: StatusCode) {
        self.state.write().await.injected_failure = Some(status);
    }
}

impl<T: Item> Default for InMemoryItemStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn key_of<T: Item>(item: &T) -> ItemKey {
    let base = item.base();
    (base.partition_key.clone(), base.id.clone())
}

/// Optimistic-concurrency check of one request against the stored item.
fn check<T: Item>(request: &SaveRequest<T>, stored: Option<&T>) -> std::result::Result<(), (StatusCode, String)> {
    let base = request.item.base();
    match (request.save_action, stored) {
        (SaveAction::Created, Some(_)) => Err((
            StatusCode::CONFLICT,
            format!("item '{}' already exists", base.id),
        )),
        (SaveAction::Created, None) => Ok(()),
        (_, None) => Err((
            StatusCode::NOT_FOUND,
            format!("item '{}' does not exist", base.id),
        )),
        (_, Some(stored)) if stored.base().etag != base.etag => Err((
            StatusCode::CONFLICT,
            format!("item '{}' was modified concurrently", base.id),
        )),
        (_, Some(_)) => Ok(()),
    }
}

/// Stamps version and ETag on the item and the version on its event.
fn stamp<T: Item>(request: SaveRequest<T>, stored: Option<&T>) -> (T, Option<ItemEvent>) {
    let SaveRequest {
        mut item, mut event, ..
    } = request;

    let version = stored.map_or(0, |stored| stored.base().version) + 1;
    let base = item.base_mut();
    base.version = version;
    base.etag = Some(Uuid::new_v4().to_string());

    if let Some(event) = event.as_mut() {
        event.item_version = version;
    }
    (item, event)
}

#[async_trait]
impl<T: Item> ItemStore<T> for InMemoryItemStore<T> {
    async fn read_item(
        &self,
        id: &str,
        partition_key: &str,
        token: &CancellationToken,
    ) -> Result<Option<T>> {
        if token.is_cancelled() {
            return Err(DataError::Cancelled);
        }
        let state = self.state.read().await;
        Ok(state
            .items
            .get(&(partition_key.to_string(), id.to_string()))
            .cloned())
    }

    async fn save_item(&self, request: SaveRequest<T>, token: &CancellationToken) -> Result<T> {
        if token.is_cancelled() {
            return Err(DataError::Cancelled);
        }

        let mut state = self.state.write().await;
        if let Some(status) = state.injected_failure.take() {
            warn!("Injected failure for '{}': {}", T::TYPE_NAME, status);
            return Err(DataError::storage(status, "injected failure"));
        }

        let key = key_of(&request.item);
        if let Err((status, message)) = check(&request, state.items.get(&key)) {
            warn!("Rejected {} of '{}': {}", request.save_action, T::TYPE_NAME, message);
            return Err(DataError::storage(status, message));
        }

        let (item, event) = stamp(request, state.items.get(&key));
        debug!(
            "Saved '{}' {:?} at version {}",
            T::TYPE_NAME,
            key,
            item.base().version
        );
        state.items.insert(key, item.clone());
        state.events.extend(event);
        Ok(item)
    }

    async fn save_batch(
        &self,
        partition_key: &str,
        requests: Vec<SaveRequest<T>>,
        token: &CancellationToken,
    ) -> Result<Vec<SaveResult<T>>> {
        if token.is_cancelled() {
            return Err(DataError::Cancelled);
        }

        let mut state = self.state.write().await;

        let failed_at = |index: usize, status: StatusCode| -> Vec<SaveResult<T>> {
            (0..requests.len())
                .map(|i| {
                    SaveResult::failed(if i == index {
                        status
                    } else {
                        StatusCode::FAILED_DEPENDENCY
                    })
                })
                .collect()
        };

        if let Some(status) = state.injected_failure.take() {
            warn!("Injected batch failure for '{}': {}", T::TYPE_NAME, status);
            return Ok(failed_at(0, status));
        }

        if requests
            .iter()
            .any(|request| request.item.base().partition_key != partition_key)
        {
            warn!("Rejected batch for '{}': mixed partition keys", T::TYPE_NAME);
            return Ok(requests
                .iter()
                .map(|_| SaveResult::failed(StatusCode::BAD_REQUEST))
                .collect());
        }

        // every request is checked before anything is written
        let mut seen = HashSet::new();
        for (index, request) in requests.iter().enumerate() {
            let key = key_of(&request.item);
            if !seen.insert(key.clone()) {
                warn!("Rejected batch for '{}': {:?} appears twice", T::TYPE_NAME, key);
                return Ok(failed_at(index, StatusCode::BAD_REQUEST));
            }
            if let Err((status, message)) = check(request, state.items.get(&key)) {
                warn!("Rejected batch for '{}': {}", T::TYPE_NAME, message);
                return Ok(failed_at(index, status));
            }
        }

        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let key = key_of(&request.item);
            let (item, event) = stamp(request, state.items.get(&key));
            state.items.insert(key, item.clone());
            state.events.extend(event);
            results.push(SaveResult::ok(item));
        }

        debug!(
            "Saved batch of {} '{}' items in partition '{}'",
            results.len(),
            T::TYPE_NAME,
            partition_key
        );
        Ok(results)
    }

    async fn query(
        &self,
        query: ItemQuery,
        token: &CancellationToken,
    ) -> Result<BoxStream<'static, Result<T>>> {
        if token.is_cancelled() {
            return Err(DataError::Cancelled);
        }

        let items: Vec<T> = self.state.read().await.items.values().cloned().collect();
        let matched = evaluate::apply(&query, items)?;
        debug!("Query '{}' matched {} items", query, matched.len());
        Ok(stream::iter(matched.into_iter().map(Ok)).boxed())
    }
}
