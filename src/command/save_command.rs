// ============================================================================
// Save Command
// ============================================================================
//
// A one-shot create/update/delete of one item. State machine:
//
//   Active ──save()──────────────────────────────▶ Saved
//     │                                              ▲
//     └──acquire()──▶ Acquired ──finalize(item)──────┘
//                        │
//                        └──drop / release()──▶ Active
//
// The state lives behind an async RwLock: validations share the read side,
// transitions take the write side. A batch holds the write side for as long
// as it owns the command.
//
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Level, event, info_span};

use super::{ItemEvent, ReadResult, RequestContext, SaveAction, SaveRequest};
use crate::core::{DataError, Result};
use crate::item::{Item, ItemProxy, ProxyManager};
use crate::provider::EventPolicy;
use crate::store::ItemStore;
use crate::validation::{ItemValidator, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandState {
    Active,
    Acquired,
    Saved,
}

impl CommandState {
    fn ensure_active(self) -> Result<()> {
        match self {
            Self::Active => Ok(()),
            Self::Acquired => Err(DataError::InvalidOperation(
                "The SaveCommand is acquired by a batch".to_string(),
            )),
            Self::Saved => Err(DataError::InvalidOperation(
                "The SaveCommand has already been saved".to_string(),
            )),
        }
    }
}

/// Waits for `lock` unless `token` fires first.
pub(crate) async fn lock_or_cancel<G>(
    lock: impl Future<Output = G>,
    token: &CancellationToken,
) -> Result<G> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(DataError::Cancelled),
        guard = lock => Ok(guard),
    }
}

struct SaveCommandInner<T: Item> {
    manager: ProxyManager<T>,
    save_action: SaveAction,
    event_policy: EventPolicy,
    store: Arc<dyn ItemStore<T>>,
    state: Arc<RwLock<CommandState>>,
}

/// Handle to a pending save. Clones share one command.
pub struct SaveCommand<T: Item> {
    inner: Arc<SaveCommandInner<T>>,
}

impl<T: Item> Clone for SaveCommand<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Item> fmt::Debug for SaveCommand<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveCommand")
            .field("save_action", &self.inner.save_action)
            .field("item", self.item())
            .finish()
    }
}

impl<T: Item> SaveCommand<T> {
    /// Delete commands wrap a read-only item; create and update are mutable.
    pub(crate) fn new(
        item: T,
        save_action: SaveAction,
        store: Arc<dyn ItemStore<T>>,
        validator: Arc<dyn ItemValidator<T>>,
        event_policy: EventPolicy,
    ) -> Self {
        let read_only = save_action == SaveAction::Deleted;
        Self {
            inner: Arc::new(SaveCommandInner {
                manager: ProxyManager::new(item, read_only, validator),
                save_action,
                event_policy,
                store,
                state: Arc::new(RwLock::new(CommandState::Active)),
            }),
        }
    }

    pub fn item(&self) -> &ItemProxy<T> {
        self.inner.manager.item()
    }

    pub fn save_action(&self) -> SaveAction {
        self.inner.save_action
    }

    /// Validates the current item. Runs alongside other validations but never
    /// alongside a save of this command.
    pub async fn validate(&self, token: &CancellationToken) -> Result<ValidationResult> {
        let _state = lock_or_cancel(self.inner.state.read(), token).await?;
        self.inner.manager.validate(token).await
    }

    /// Validates, persists and returns the stored item. Callable once.
    pub async fn save(
        &self,
        context: &RequestContext,
        token: &CancellationToken,
    ) -> Result<ReadResult<T>> {
        let span = info_span!(
            "save_command.save",
            type_name = T::TYPE_NAME,
            action = %self.inner.save_action
        );

        async move {
            let mut state = lock_or_cancel(self.inner.state.write(), token).await?;
            state.ensure_active()?;

            let request = self.create_save_request(context)?;
            self.inner
                .manager
                .validator()
                .validate(&request.item, token)
                .await?
                .into_result()?;

            let saved = match self.inner.store.save_item(request, token).await {
                Ok(saved) => saved,
                Err(err) => {
                    event!(Level::WARN, error = %err, "save rejected by store");
                    return Err(err);
                }
            };

            *state = CommandState::Saved;
            self.inner.manager.item().seal()?;
            event!(Level::DEBUG, version = saved.base().version, "item saved");

            Ok(ReadResult::new(
                saved,
                Arc::clone(self.inner.manager.validator()),
            ))
        }
        .instrument(span)
        .await
    }

    /// Takes exclusive ownership of the command and builds its request
    /// without persisting it. Used by batches.
    pub(crate) async fn acquire(
        &self,
        context: &RequestContext,
        token: &CancellationToken,
    ) -> Result<AcquiredCommand<T>> {
        let mut guard = lock_or_cancel(Arc::clone(&self.inner.state).write_owned(), token).await?;
        guard.ensure_active()?;

        let request = self.create_save_request(context)?;
        *guard = CommandState::Acquired;

        Ok(AcquiredCommand {
            command: self.clone(),
            guard,
            request: Some(request),
        })
    }

    /// True when both handles refer to one command.
    pub fn same_command(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn validator(&self) -> &Arc<dyn ItemValidator<T>> {
        self.inner.manager.validator()
    }

    fn create_save_request(&self, context: &RequestContext) -> Result<SaveRequest<T>> {
        let proxy = self.inner.manager.item();
        let item = proxy.snapshot()?;

        let changes = match self.inner.event_policy {
            EventPolicy::Disabled | EventPolicy::NoChanges => Vec::new(),
            EventPolicy::DecoratedChanges => proxy.property_changes()?,
            EventPolicy::AllChanges => proxy.all_property_changes()?,
        };

        let event = match self.inner.event_policy {
            EventPolicy::Disabled => None,
            _ => Some(ItemEvent::new(
                &item,
                self.inner.save_action,
                changes,
                context.clone(),
            )),
        };

        Ok(SaveRequest {
            item,
            event,
            save_action: self.inner.save_action,
        })
    }
}

/// A command held exclusively by a batch.
///
/// Dropping it without [`AcquiredCommand::finalize`] returns the command to
/// its active state.
pub(crate) struct AcquiredCommand<T: Item> {
    command: SaveCommand<T>,
    guard: OwnedRwLockWriteGuard<CommandState>,
    request: Option<SaveRequest<T>>,
}

impl<T: Item> AcquiredCommand<T> {
    pub(crate) fn partition_key(&self) -> Option<&str> {
        self.request
            .as_ref()
            .map(|request| request.item.base().partition_key.as_str())
    }

    /// Validates the item snapshot taken at acquisition.
    pub(crate) async fn validate_request(
        &self,
        token: &CancellationToken,
    ) -> Result<ValidationResult> {
        let request = self.request.as_ref().ok_or_else(|| {
            DataError::InvalidOperation("The save request was already taken".to_string())
        })?;
        self.command.validator().validate(&request.item, token).await
    }

    pub(crate) fn take_request(&mut self) -> Result<SaveRequest<T>> {
        self.request.take().ok_or_else(|| {
            DataError::InvalidOperation("The save request was already taken".to_string())
        })
    }

    /// Marks the command saved with the item the store returned.
    pub(crate) fn finalize(mut self, saved: T) -> Result<ReadResult<T>> {
        *self.guard = CommandState::Saved;
        self.command.item().seal()?;
        Ok(ReadResult::new(saved, Arc::clone(self.command.validator())))
    }

    pub(crate) fn release(self) {}
}

impl<T: Item> Drop for AcquiredCommand<T> {
    fn drop(&mut self) {
        if *self.guard == CommandState::Acquired {
            *self.guard = CommandState::Active;
        }
    }
}
