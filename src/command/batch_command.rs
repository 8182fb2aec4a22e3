// ============================================================================
// Batch Command
// ============================================================================
//
// Saves N commands as one atomic, partition-scoped storage transaction.
//
//   1. validate every member (partition keys + item rules), abort on failure
//   2. acquire every member concurrently
//   3. any acquisition fault  -> release all, faulted = 400, others = 424
//   4. re-validate the acquired snapshots -> failure: release all, reopen
//   5. one save_batch call    -> all OK: finalize every member
//                                otherwise: release all, report statuses
//
// Results are always in `add` order. A batch that gets past step 4 is spent.
//
// ============================================================================

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use http::StatusCode;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Level, event, info_span};

use super::save_command::{AcquiredCommand, lock_or_cancel};
use super::{BatchResult, RequestContext, SaveCommand};
use crate::core::{DataError, Result};
use crate::item::Item;
use crate::store::ItemStore;
use crate::validation::{ValidationResult, validate_all, validate_partition_keys};

enum BatchState<T: Item> {
    Open(Vec<SaveCommand<T>>),
    Executed,
}

pub struct BatchCommand<T: Item> {
    store: Arc<dyn ItemStore<T>>,
    state: Mutex<BatchState<T>>,
}

impl<T: Item> fmt::Debug for BatchCommand<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchCommand").finish_non_exhaustive()
    }
}

impl<T: Item> BatchCommand<T> {
    pub(crate) fn new(store: Arc<dyn ItemStore<T>>) -> Self {
        Self {
            store,
            state: Mutex::new(BatchState::Open(Vec::new())),
        }
    }

    /// Appends a command. Fails once the batch has executed.
    ///
    /// A command may appear in a batch only once; acquiring it twice would
    /// wait on itself.
    pub async fn add(&self, command: SaveCommand<T>) -> Result<&Self> {
        let mut state = self.state.lock().await;
        match &mut *state {
            BatchState::Open(commands) => {
                if commands.iter().any(|member| member.same_command(&command)) {
                    return Err(DataError::InvalidOperation(
                        "The SaveCommand is already part of this batch".to_string(),
                    ));
                }
                commands.push(command);
                Ok(self)
            }
            BatchState::Executed => Err(already_executed()),
        }
    }

    pub async fn len(&self) -> usize {
        match &*self.state.lock().await {
            BatchState::Open(commands) => commands.len(),
            BatchState::Executed => 0,
        }
    }

    /// One result per member, in `add` order.
    pub async fn validate(&self, token: &CancellationToken) -> Result<Vec<ValidationResult>> {
        let state = lock_or_cancel(self.state.lock(), token).await?;
        match &*state {
            BatchState::Open(commands) => validate_members(commands, token).await,
            BatchState::Executed => Err(already_executed()),
        }
    }

    /// Saves every member atomically. Callable once.
    pub async fn save(
        &self,
        context: &RequestContext,
        token: &CancellationToken,
    ) -> Result<Vec<BatchResult<T>>> {
        let mut state = lock_or_cancel(self.state.lock(), token).await?;
        let commands = match &*state {
            BatchState::Open(commands) => commands.clone(),
            BatchState::Executed => return Err(already_executed()),
        };

        if commands.is_empty() {
            *state = BatchState::Executed;
            return Ok(Vec::new());
        }

        let span = info_span!(
            "batch_command.save",
            type_name = T::TYPE_NAME,
            size = commands.len()
        );

        async {
            let validations = validate_members(&commands, token).await?;
            validate_all(&validations)?;

            // only a failed re-validation below reopens the batch
            *state = BatchState::Executed;

            let acquisitions = join_all(
                commands
                    .iter()
                    .map(|command| command.acquire(context, token)),
            )
            .await;

            if acquisitions
                .iter()
                .any(|acquired| matches!(acquired, Err(DataError::Cancelled)))
            {
                event!(Level::DEBUG, "batch cancelled during acquisition");
                return Err(DataError::Cancelled);
            }

            if acquisitions.iter().any(Result::is_err) {
                return Ok(revert(acquisitions));
            }

            let acquired: Vec<AcquiredCommand<T>> =
                acquisitions.into_iter().collect::<Result<_>>()?;

            // members may have been edited between validation and acquisition
            let revalidated = validate_acquired(&acquired, token)
                .await
                .and_then(|validations| validate_all(&validations));
            if let Err(err) = revalidated {
                event!(Level::WARN, error = %err, "batch member changed before save");
                acquired.into_iter().for_each(AcquiredCommand::release);
                *state = BatchState::Open(commands.clone());
                return Err(err);
            }

            self.execute(acquired, token).await
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        mut acquired: Vec<AcquiredCommand<T>>,
        token: &CancellationToken,
    ) -> Result<Vec<BatchResult<T>>> {
        let partition_key = acquired
            .first()
            .and_then(|command| command.partition_key())
            .unwrap_or_default()
            .to_string();

        let requests = acquired
            .iter_mut()
            .map(AcquiredCommand::take_request)
            .collect::<Result<Vec<_>>>()?;

        let save_results = match self.store.save_batch(&partition_key, requests, token).await {
            Ok(save_results) => save_results,
            Err(err) => {
                event!(Level::WARN, error = %err, "batch rejected by store");
                return Err(err);
            }
        };

        if save_results.len() != acquired.len() {
            return Err(DataError::storage(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!(
                    "store returned {} results for {} requests",
                    save_results.len(),
                    acquired.len()
                ),
            ));
        }

        let all_saved = save_results
            .iter()
            .all(|result| result.status == StatusCode::OK && result.item.is_some());

        if !all_saved {
            event!(Level::WARN, "batch transaction failed");
            let results = save_results
                .into_iter()
                .map(|result| BatchResult {
                    status: if result.status == StatusCode::OK {
                        StatusCode::FAILED_DEPENDENCY
                    } else {
                        result.status
                    },
                    read_result: None,
                })
                .collect();
            acquired.into_iter().for_each(AcquiredCommand::release);
            return Ok(results);
        }

        let mut results = Vec::with_capacity(acquired.len());
        for (command, result) in acquired.into_iter().zip(save_results) {
            let item = result.item.ok_or_else(|| {
                DataError::storage(StatusCode::INTERNAL_SERVER_ERROR, "saved item missing")
            })?;
            results.push(BatchResult {
                status: StatusCode::OK,
                read_result: Some(command.finalize(item)?),
            });
        }

        event!(Level::DEBUG, "batch saved");
        Ok(results)
    }
}

fn already_executed() -> DataError {
    DataError::InvalidOperation("The BatchCommand has already been saved".to_string())
}

async fn validate_members<T: Item>(
    commands: &[SaveCommand<T>],
    token: &CancellationToken,
) -> Result<Vec<ValidationResult>> {
    let mut partition_keys = Vec::with_capacity(commands.len());
    for command in commands {
        partition_keys.push(command.item().partition_key()?);
    }
    let partition_failure = validate_partition_keys(&partition_keys);

    let mut results = Vec::with_capacity(commands.len());
    for command in commands {
        let mut result = ValidationResult::valid();
        if let Some(failure) = &partition_failure {
            result.push(failure.clone());
        }
        results.push(result.merge(command.validate(token).await?));
    }
    Ok(results)
}

async fn validate_acquired<T: Item>(
    acquired: &[AcquiredCommand<T>],
    token: &CancellationToken,
) -> Result<Vec<ValidationResult>> {
    let partition_keys: Vec<String> = acquired
        .iter()
        .map(|command| command.partition_key().unwrap_or_default().to_string())
        .collect();
    let partition_failure = validate_partition_keys(&partition_keys);

    let mut results = Vec::with_capacity(acquired.len());
    for command in acquired {
        let mut result = ValidationResult::valid();
        if let Some(failure) = &partition_failure {
            result.push(failure.clone());
        }
        results.push(result.merge(command.validate_request(token).await?));
    }
    Ok(results)
}

/// Releases every acquired command and reports the faulted ones as 400.
fn revert<T: Item>(acquisitions: Vec<Result<AcquiredCommand<T>>>) -> Vec<BatchResult<T>> {
    event!(
        Level::WARN,
        faulted = acquisitions.iter().filter(|acquired| acquired.is_err()).count(),
        "batch reverted"
    );

    acquisitions
        .into_iter()
        .map(|acquired| {
            let status = match acquired {
                Ok(command) => {
                    command.release();
                    StatusCode::FAILED_DEPENDENCY
                }
                Err(_) => StatusCode::BAD_REQUEST,
            };
            BatchResult {
                status,
                read_result: None,
            }
        })
        .collect()
}
