//! drivesync Dispatch - Concurrent queue consumption
//!
//! Moves messages from the broker to the handler registry:
//!
//! ```text
//! listeners (N) --> bounded staging queue --> workers (M) --> middleware --> handler
//! ```
//!
//! A message is acknowledged only after its handler returns `Ok`. Anything
//! else (decode failure, exhausted retries, a panic) leaves it on the broker
//! for redelivery.
//!
//! ## Modules
//!
//! - [`dispatcher`] - Owns the staging queue and the listener/worker tasks
//! - [`listener`] - Long-polls the broker into the staging queue
//! - [`worker`] - Decodes, dispatches and acknowledges staged messages
//! - [`middleware`] - Throttle, panic recovery, retry and concurrency layers
//! - [`throttle`] - Token bucket used by the throttle layer

pub mod dispatcher;
pub mod listener;
pub mod middleware;
pub mod throttle;
pub mod worker;

#[cfg(test)]
mod test_support;

use std::time::Duration;

use drivesync_core::config::{DispatchConfig, QueueConfig};
use thiserror::Error;

pub use dispatcher::Dispatcher;
pub use middleware::{build_chain, RetryPolicy};

/// Errors raised by the dispatch pipeline itself
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A handler panicked; the panic was contained
    #[error("handler panicked: {0}")]
    HandlerPanicked(String),

    /// Settings that cannot produce a working pipeline
    #[error("invalid dispatch settings: {0}")]
    InvalidSettings(String),

    /// Tasks were still running when the shutdown grace period ended
    #[error("dispatch tasks did not stop within {0:?}")]
    ShutdownTimeout(Duration),
}

/// Runtime parameters of the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    pub subscriber_count: usize,
    pub worker_count: usize,
    pub staging_capacity: usize,
    pub max_concurrent_handlers: usize,
    /// Messages admitted per second
    pub throttle_rate: f64,
    pub retry: RetryPolicy,
    /// Messages requested per receive call
    pub max_messages: u32,
    /// Long-poll duration of each receive call
    pub wait_time: Duration,
    /// Pause after a failed receive call
    pub receive_retry_delay: Duration,
    pub shutdown_grace: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default(), &QueueConfig::default())
    }
}

impl DispatchSettings {
    pub fn from_config(dispatch: &DispatchConfig, queue: &QueueConfig) -> Self {
        Self {
            subscriber_count: dispatch.subscriber_count,
            worker_count: dispatch.worker_count,
            staging_capacity: dispatch.staging_capacity,
            max_concurrent_handlers: dispatch.max_concurrent_handlers,
            throttle_rate: dispatch.throttle_rate,
            retry: RetryPolicy {
                max_attempts: dispatch.retry.max_attempts,
                initial_backoff: dispatch.retry.initial_backoff(),
                max_backoff: dispatch.retry.max_backoff(),
                multiplier: dispatch.retry.multiplier,
            },
            max_messages: queue.max_messages,
            wait_time: queue.wait_time(),
            receive_retry_delay: queue.receive_retry_delay(),
            shutdown_grace: dispatch.shutdown_grace(),
        }
    }

    /// Rejects settings that would stall or panic the pipeline
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidSettings`] naming the first bad field.
    pub fn validate(&self) -> Result<(), DispatchError> {
        let counts = [
            ("subscriber_count", self.subscriber_count),
            ("worker_count", self.worker_count),
            ("staging_capacity", self.staging_capacity),
            ("max_concurrent_handlers", self.max_concurrent_handlers),
            ("max_messages", self.max_messages as usize),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, n)| *n == 0) {
            return Err(DispatchError::InvalidSettings(format!(
                "{name} must be at least 1"
            )));
        }
        if !(self.throttle_rate.is_finite() && self.throttle_rate > 0.0) {
            return Err(DispatchError::InvalidSettings(
                "throttle_rate must be greater than 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(DispatchError::InvalidSettings(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
