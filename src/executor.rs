//! Cancellable Timeboxed Executor
//!
//! Runs one query or action at a time per stream under a deadline. Issuing a
//! new call cancels the previous call's token and bumps a generation counter;
//! a call only reaches its callbacks if its generation is still current when
//! it settles. Commits on a stream are serialized, so a slow earlier call can
//! never overwrite the result of a faster later one, even on a multi-thread
//! runtime.
//!
//! Cancellation is advisory: it stops the client from acting on a response, it
//! cannot undo a write the server already committed.

use crate::config::ExecutorConfig;
use crate::error::ApiError;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a call ended, from the executor's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// `on_success` ran
    Succeeded,
    /// `on_error` ran with the task's error
    Failed,
    /// The deadline fired first; `on_error` ran with `Timeout`
    TimedOut,
    /// A later call or `cancel()` took over; no callback ran
    Superseded,
}

struct StreamState {
    generation: u64,
    token: Option<CancellationToken>,
}

/// Handle to a running call.
pub struct ExecutionHandle {
    generation: u64,
    token: CancellationToken,
    task: JoinHandle<Settlement>,
}

impl ExecutionHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the call to settle.
    pub async fn settled(self) -> Settlement {
        match self.task.await {
            Ok(settlement) => settlement,
            Err(e) => {
                // A panicking callback or an aborted runtime; nothing was committed after it.
                warn!(generation = self.generation, error = %e, "Execution task did not complete");
                Settlement::Superseded
            }
        }
    }
}

/// One logical query/action stream.
///
/// Cloning yields another handle to the same stream.
#[derive(Clone)]
pub struct CancellableExecutor {
    state: Arc<Mutex<StreamState>>,
    /// Held across the generation re-check and the callback, so commits on
    /// one stream never interleave. Never taken while `state` is held.
    commit: Arc<Mutex<()>>,
    default_timeout: Duration,
}

impl CancellableExecutor {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(StreamState {
                generation: 0,
                token: None,
            })),
            commit: Arc::new(Mutex::new(())),
            default_timeout,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(Duration::from_millis(config.timeout_ms))
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn current_generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Run `task` with the default deadline.
    pub fn run<T, Task, Fut, S, E>(&self, task: Task, on_success: S, on_error: E) -> ExecutionHandle
    where
        Task: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
        T: Send + 'static,
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        self.execute(task, on_success, on_error, self.default_timeout)
    }

    /// Start `task`, superseding any call still in flight on this stream.
    ///
    /// Exactly one of `on_success` / `on_error` runs, and only if no later call
    /// was issued before this one settled. Must be called inside a tokio runtime.
    pub fn execute<T, Task, Fut, S, E>(
        &self,
        task: Task,
        on_success: S,
        on_error: E,
        timeout: Duration,
    ) -> ExecutionHandle
    where
        Task: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
        T: Send + 'static,
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        let token = CancellationToken::new();
        let generation = {
            let mut state = self.state.lock();
            if let Some(previous) = state.token.replace(token.clone()) {
                previous.cancel();
            }
            state.generation += 1;
            state.generation
        };
        debug!(generation, timeout_ms = timeout.as_millis() as u64, "Executing call");

        let work = task(token.clone());
        let state = Arc::clone(&self.state);
        let commit = Arc::clone(&self.commit);
        let call_token = token.clone();

        let task = tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = call_token.cancelled() => None,
                _ = tokio::time::sleep(timeout) => {
                    call_token.cancel();
                    Some(Err(ApiError::Timeout(timeout)))
                }
                result = work => Some(result),
            };

            let Some(outcome) = outcome else {
                debug!(generation, "Dropping superseded call");
                return Settlement::Superseded;
            };

            let _commit = commit.lock();
            {
                let mut state = state.lock();
                if state.generation != generation {
                    debug!(generation, current = state.generation, "Dropping superseded result");
                    return Settlement::Superseded;
                }
                state.token = None;
            }

            match outcome {
                Ok(value) => {
                    on_success(value);
                    Settlement::Succeeded
                }
                Err(err @ ApiError::Timeout(_)) => {
                    warn!(generation, error = %err, "Call exceeded its deadline");
                    on_error(err);
                    Settlement::TimedOut
                }
                Err(err) => {
                    on_error(err);
                    Settlement::Failed
                }
            }
        });

        ExecutionHandle {
            generation,
            token,
            task,
        }
    }

    /// Abandon the call in flight, if any. Its settlement is dropped.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        if let Some(token) = state.token.take() {
            token.cancel();
        }
    }
}
