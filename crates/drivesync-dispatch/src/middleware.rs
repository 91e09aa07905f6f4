//! Handler middleware
//!
//! Each layer wraps an [`ICommandHandler`] and is itself one, so layers
//! compose freely and can be tested alone.
//!
//! ## Components
//!
//! - [`Throttled`] - admits at most `rate` commands per second
//! - [`Recovering`] - turns a handler panic into an error
//! - [`Retrying`] - re-invokes a failing handler with exponential backoff
//! - [`ConcurrencyLimited`] - bounds simultaneous handler executions
//!
//! [`build_chain`] assembles them in the order the dispatcher uses:
//! throttle, recover, retry, concurrency limit, handler.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use drivesync_core::{domain::Command, ports::ICommandHandler};
use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::{throttle::TokenBucket, DispatchError, DispatchSettings};

// ============================================================================
// Retry policy
// ============================================================================

/// Exponential backoff policy for [`Retrying`]
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total invocations including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            self.max_backoff
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

// ============================================================================
// Layers
// ============================================================================

/// Waits for a throttle token before every command
pub struct Throttled {
    inner: Arc<dyn ICommandHandler>,
    bucket: Arc<TokenBucket>,
}

impl Throttled {
    pub fn new(inner: Arc<dyn ICommandHandler>, bucket: Arc<TokenBucket>) -> Self {
        Self { inner, bucket }
    }
}

#[async_trait]
impl ICommandHandler for Throttled {
    async fn handle(&self, command: &Command) -> anyhow::Result<()> {
        self.bucket.acquire().await;
        self.inner.handle(command).await
    }
}

/// Converts a panic in the wrapped handler into [`DispatchError::HandlerPanicked`]
pub struct Recovering {
    inner: Arc<dyn ICommandHandler>,
}

impl Recovering {
    pub fn new(inner: Arc<dyn ICommandHandler>) -> Self {
        Self { inner }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[async_trait]
impl ICommandHandler for Recovering {
    async fn handle(&self, command: &Command) -> anyhow::Result<()> {
        match AssertUnwindSafe(self.inner.handle(command))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(&*payload);
                error!(kind = command.kind(), panic = %message, "Handler panicked");
                Err(DispatchError::HandlerPanicked(message).into())
            }
        }
    }
}

/// Re-invokes the wrapped handler until it succeeds or attempts run out
///
/// Attempts are sequential; a command never has two executions in flight.
pub struct Retrying {
    inner: Arc<dyn ICommandHandler>,
    policy: RetryPolicy,
}

impl Retrying {
    pub fn new(inner: Arc<dyn ICommandHandler>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl ICommandHandler for Retrying {
    async fn handle(&self, command: &Command) -> anyhow::Result<()> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match self.inner.handle(command).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            if attempt >= max_attempts {
                return Err(error.context(format!("gave up after {attempt} attempts")));
            }

            let delay = self.policy.backoff(attempt);
            warn!(
                kind = command.kind(),
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %format!("{error:#}"),
                "Handler failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Holds a semaphore permit for the duration of each handler call
pub struct ConcurrencyLimited {
    inner: Arc<dyn ICommandHandler>,
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimited {
    pub fn new(inner: Arc<dyn ICommandHandler>, semaphore: Arc<Semaphore>) -> Self {
        Self { inner, semaphore }
    }
}

#[async_trait]
impl ICommandHandler for ConcurrencyLimited {
    async fn handle(&self, command: &Command) -> anyhow::Result<()> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| anyhow!("handler concurrency limiter closed"))?;
        self.inner.handle(command).await
    }
}

/// Wraps `handler` in the full middleware chain described by `settings`
pub fn build_chain(
    handler: Arc<dyn ICommandHandler>,
    settings: &DispatchSettings,
) -> Arc<dyn ICommandHandler> {
    let limited = Arc::new(ConcurrencyLimited::new(
        handler,
        Arc::new(Semaphore::new(settings.max_concurrent_handlers)),
    ));
    let retrying = Arc::new(Retrying::new(limited, settings.retry.clone()));
    let recovering = Arc::new(Recovering::new(retrying));
    Arc::new(Throttled::new(
        recovering,
        Arc::new(TokenBucket::per_second(settings.throttle_rate)),
    ))
}

// ============================================================================
// Unit tests
// ============================================================================
