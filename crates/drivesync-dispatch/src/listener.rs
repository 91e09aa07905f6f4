//! Broker listener
//!
//! Long-polls the broker and pushes every received message into the staging
//! queue. A full staging queue suspends the push, so a slow worker pool
//! throttles receiving instead of dropping messages.

use std::sync::Arc;

use drivesync_core::ports::{IMessageQueue, QueueMessage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::DispatchSettings;

/// Runs one listener until `cancel` fires or the staging queue closes
///
/// Receive failures are logged and retried after
/// `settings.receive_retry_delay`; they never end the listener. Messages
/// still held when cancellation arrives are dropped unacknowledged and come
/// back through broker redelivery.
pub async fn run_listener(
    id: usize,
    queue: Arc<dyn IMessageQueue>,
    staging: mpsc::Sender<QueueMessage>,
    settings: DispatchSettings,
    cancel: CancellationToken,
) {
    debug!(listener = id, "Listener started");

    'receive: loop {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            r = queue.receive_batch(settings.max_messages, settings.wait_time) => r,
        };

        let messages = match received {
            Ok(messages) => messages,
            Err(e) => {
                warn!(
                    listener = id,
                    error = %format!("{e:#}"),
                    retry_in_ms = settings.receive_retry_delay.as_millis() as u64,
                    "Failed to receive messages"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(settings.receive_retry_delay) => continue,
                }
            }
        };

        if messages.is_empty() {
            trace!(listener = id, "Receive returned no messages");
            continue;
        }
        debug!(listener = id, count = messages.len(), "Received messages");

        for message in messages {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'receive,
                sent = staging.send(message) => {
                    if sent.is_err() {
                        info!(listener = id, "Staging queue closed");
                        break 'receive;
                    }
                }
            }
        }
    }

    debug!(listener = id, "Listener stopped");
}

// ============================================================================
// Unit tests
// ============================================================================
