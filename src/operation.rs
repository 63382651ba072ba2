//! Async operations and their `requested` / `succeeded` / `failed` lifecycle.
//!
//! An [`AsyncOperation`] describes one UI-triggered task. The store applies
//! [`requested`](AsyncOperation::requested) before the body starts, runs
//! the body as a detached `tokio` task, and then applies exactly one of
//! [`succeeded`](AsyncOperation::succeeded) or
//! [`failed`](AsyncOperation::failed).

use std::future::Future;

use tokio::task::JoinHandle;

use crate::action::Action;
use crate::error::{OperationError, StoreError};
use crate::store::Store;

/// A unit of asynchronous work with a three-phase lifecycle.
///
/// Implementors are plain data (the operation's input). The associated
/// functions map each phase onto the action the store applies.
///
/// # Contract
///
/// - `requested` is applied before `run` is polled.
/// - Exactly one of `succeeded` / `failed` is applied after `run` resolves.
/// - `run` may dispatch side actions through the `store` it receives.
pub trait AsyncOperation: Send + Sized + 'static {
    /// Value produced by a successful run.
    type Output: Clone + Send + 'static;

    /// Operation name used in logs, e.g. `"auth/login"`.
    const NAME: &'static str;

    /// Action applied when the operation starts.
    fn requested(&self) -> Action;

    /// The operation body.
    fn run(self, store: Store) -> impl Future<Output = Result<Self::Output, OperationError>> + Send;

    /// Action applied with the successful output.
    fn succeeded(output: &Self::Output) -> Action;

    /// Action applied with the failure reason.
    fn failed(error: &OperationError) -> Action;
}

/// Outcome reported through a [`TaskHandle`].
///
/// The outer `Result` fails only when the store itself could not apply the
/// terminal transition; the inner one is the operation's own outcome.
pub type TaskOutcome<T> = Result<Result<T, OperationError>, StoreError>;

/// Handle to a running operation.
///
/// Await [`join`](TaskHandle::join) for the outcome, or drop the handle.
/// Dropping never cancels the task: the terminal transition is still
/// applied to the store.
#[derive(Debug)]
#[must_use = "dropping a TaskHandle detaches the operation; call `join` to observe its outcome"]
pub struct TaskHandle<T> {
    name: &'static str,
    inner: JoinHandle<TaskOutcome<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(name: &'static str, inner: JoinHandle<TaskOutcome<T>>) -> Self {
        Self { name, inner }
    }

    /// Wait for the operation to finish and its terminal transition to be
    /// applied.
    ///
    /// # Errors
    ///
    /// - [`StoreError::StoreGone`] if the store exited before the terminal
    ///   transition could be applied.
    /// - [`StoreError::TaskPanicked`] if the operation body panicked.
    pub async fn join(self) -> TaskOutcome<T> {
        match self.inner.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(operation = self.name, error = %e, "operation task failed");
                Err(StoreError::TaskPanicked)
            }
        }
    }

    /// Whether the task has finished.
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Name of the operation this handle tracks.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Drive an operation body and apply its terminal transition.
///
/// Runs inside the spawned task created by [`Store::run`].
pub(crate) async fn drive<O: AsyncOperation>(operation: O, store: Store) -> TaskOutcome<O::Output> {
    let result = operation.run(store.clone()).await;
    let terminal = match &result {
        Ok(output) => O::succeeded(output),
        Err(error) => {
            tracing::info!(operation = O::NAME, reason = error.reason(), "operation failed");
            O::failed(error)
        }
    };
    store.dispatch(terminal).await?;
    Ok(result)
}
