//! Dispatcher
//!
//! Owns the staging queue and the listener and worker tasks for one
//! broker queue.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use drivesync_core::ports::{ICommandHandler, IMessageQueue};
//! use drivesync_dispatch::{DispatchSettings, Dispatcher};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(
//! #     queue: Arc<dyn IMessageQueue>,
//! #     handler: Arc<dyn ICommandHandler>,
//! # ) -> Result<(), drivesync_dispatch::DispatchError> {
//! let dispatcher = Dispatcher::new(queue, handler, DispatchSettings::default());
//! let cancel = CancellationToken::new();
//! dispatcher.run(cancel).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use drivesync_core::ports::{ICommandHandler, IMessageQueue};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{listener::run_listener, middleware::build_chain, worker::run_worker};
use crate::{DispatchError, DispatchSettings};

/// Drives messages from a broker queue through a command handler
pub struct Dispatcher {
    queue: Arc<dyn IMessageQueue>,
    handler: Arc<dyn ICommandHandler>,
    settings: DispatchSettings,
}

impl Dispatcher {
    /// Creates a dispatcher
    ///
    /// # Arguments
    /// * `queue` - Broker the listeners receive from and workers acknowledge to
    /// * `handler` - Innermost handler; the middleware chain is added in [`run`](Self::run)
    /// * `settings` - Pool sizes, throttle, retry and shutdown parameters
    pub fn new(
        queue: Arc<dyn IMessageQueue>,
        handler: Arc<dyn ICommandHandler>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            queue,
            handler,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Runs listeners and workers until `cancel` fires
    ///
    /// After cancellation no new receives or dispatches start. Handlers
    /// already running get `settings.shutdown_grace` to finish.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::InvalidSettings`] before anything is spawned
    /// - [`DispatchError::ShutdownTimeout`] when tasks outlive the grace period;
    ///   they are aborted
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), DispatchError> {
        self.settings.validate()?;

        let chain = build_chain(self.handler.clone(), &self.settings);
        let (tx, rx) = mpsc::channel(self.settings.staging_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let mut tasks = JoinSet::new();

        for id in 0..self.settings.subscriber_count {
            tasks.spawn(run_listener(
                id,
                self.queue.clone(),
                tx.clone(),
                self.settings.clone(),
                cancel.clone(),
            ));
        }
        drop(tx);

        for id in 0..self.settings.worker_count {
            tasks.spawn(run_worker(
                id,
                rx.clone(),
                self.queue.clone(),
                chain.clone(),
                cancel.clone(),
            ));
        }

        info!(
            listeners = self.settings.subscriber_count,
            workers = self.settings.worker_count,
            staging_capacity = self.settings.staging_capacity,
            max_concurrent_handlers = self.settings.max_concurrent_handlers,
            throttle_rate = self.settings.throttle_rate,
            "Dispatcher started"
        );

        cancel.cancelled().await;
        info!(
            grace_secs = self.settings.shutdown_grace.as_secs(),
            "Shutdown requested, waiting for in-flight handlers"
        );

        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    if e.is_panic() {
                        error!(error = %e, "Dispatch task panicked");
                    }
                }
            }
        };

        match tokio::time::timeout(self.settings.shutdown_grace, drain).await {
            Ok(()) => {
                info!("Dispatcher stopped");
                Ok(())
            }
            Err(_) => {
                warn!(
                    remaining = tasks.len(),
                    "Grace period elapsed, aborting dispatch tasks"
                );
                tasks.abort_all();
                Err(DispatchError::ShutdownTimeout(self.settings.shutdown_grace))
            }
        }
    }
}
