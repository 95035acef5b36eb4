//! Operation poller - drives a submitted operation to a terminal state.
//!
//! The poller is a small state machine:
//!
//! ```text
//! Submitted -> Polling -> ... -> Done
//!                  \-> TimedOut | Failed
//! ```
//!
//! Each iteration fetches the current status once and, if the job is still
//! running and the deadline has not passed, suspends for exactly one poll
//! interval. The deadline is measured from the start of polling and checked
//! after every fetch, so a fetch that completes just past the deadline still
//! returns a finished operation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::GenAiError;
use super::transport::MediaTransport;
use super::types::Operation;

/// Default interval between status checks (7 seconds).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(7);

/// Default deadline for a video job (15 minutes).
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Time source and suspend point used by the poller.
#[async_trait]
pub trait PollClock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl PollClock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[async_trait]
impl<T: PollClock + ?Sized> PollClock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

/// Where a polling run currently stands.
#[derive(Debug)]
pub enum PollState {
    /// Handle returned by submission, not yet fetched.
    Submitted(Operation),
    /// At least one fetch returned `done == false`.
    Polling { operation: Operation, attempts: u32 },
    /// The service reported a terminal operation.
    Done(Operation),
    /// The deadline passed while the job was still running.
    TimedOut { operation: String, elapsed: Duration },
    /// A fetch failed or polling was cancelled.
    Failed(GenAiError),
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Done(_) | PollState::TimedOut { .. } | PollState::Failed(_)
        )
    }
}

/// Polls an operation at a fixed cadence until it is done, times out, or is
/// cancelled.
pub struct OperationPoller<C = TokioClock> {
    interval: Duration,
    timeout: Duration,
    clock: C,
    cancel: CancellationToken,
}

impl OperationPoller<TokioClock> {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self::with_clock(interval, timeout, TokioClock)
    }
}

impl Default for OperationPoller<TokioClock> {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT)
    }
}

impl<C: PollClock> OperationPoller<C> {
    pub fn with_clock(interval: Duration, timeout: Duration, clock: C) -> Self {
        Self {
            interval,
            timeout,
            clock,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts polling when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll `operation` until the service reports it done.
    ///
    /// A done operation carrying a remote error is still returned as `Ok`;
    /// interpreting it is the resolver's job.
    ///
    /// # Errors
    ///
    /// - `GenAiError::PollTimeout` if the deadline passes first
    /// - `GenAiError::Cancelled` if the cancellation token fires
    /// - any error raised by `fetch_status`, unmodified
    pub async fn poll_until_done(
        &self,
        transport: &dyn MediaTransport,
        operation: Operation,
    ) -> Result<Operation, GenAiError> {
        let started = self.clock.now();
        log::info!(
            "Polling {} every {:?} (timeout: {:?})",
            operation.name,
            self.interval,
            self.timeout
        );

        let mut state = PollState::Submitted(operation);
        loop {
            state = match state {
                PollState::Done(operation) => {
                    log::info!("Operation {} is done", operation.name);
                    return Ok(operation);
                }
                PollState::TimedOut { operation, elapsed } => {
                    log::error!("Operation {} timed out after {:?}", operation, elapsed);
                    return Err(GenAiError::PollTimeout { elapsed, operation });
                }
                PollState::Failed(error) => return Err(error),
                running => self.step(transport, running, started).await,
            };
        }
    }

    /// Advance one non-terminal state by a single fetch and at most one wait.
    async fn step(&self, transport: &dyn MediaTransport, state: PollState, started: Instant) -> PollState {
        let (current, attempts) = match state {
            PollState::Submitted(operation) => (operation, 0),
            PollState::Polling { operation, attempts } => (operation, attempts),
            terminal => return terminal,
        };

        let cancelled = || {
            PollState::Failed(GenAiError::Cancelled {
                operation: current.name.clone(),
            })
        };
        if self.cancel.is_cancelled() {
            return cancelled();
        }

        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return cancelled(),
            result = transport.fetch_status(&current.name) => result,
        };
        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(error) => return PollState::Failed(error),
        };
        if fetched.name != current.name {
            return PollState::Failed(GenAiError::MalformedResponse(format!(
                "operation name changed from '{}' to '{}'",
                current.name, fetched.name
            )));
        }

        let attempts = attempts + 1;
        if fetched.done {
            return PollState::Done(fetched);
        }

        let elapsed = self.clock.now().saturating_duration_since(started);
        if elapsed > self.timeout {
            return PollState::TimedOut {
                operation: fetched.name,
                elapsed,
            };
        }

        log::debug!(
            "Operation {} still running (poll {}, {:?} elapsed)",
            fetched.name,
            attempts,
            elapsed
        );
        tokio::select! {
            _ = self.cancel.cancelled() => cancelled(),
            _ = self.clock.sleep(self.interval) => PollState::Polling {
                operation: fetched,
                attempts,
            },
        }
    }
}
