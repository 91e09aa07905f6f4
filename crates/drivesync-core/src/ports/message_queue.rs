//! Message queue port (driven/secondary port)
//!
//! The dispatch pipeline only needs two broker operations: receive a batch
//! with a bounded long-poll, and acknowledge (delete) a handled message.
//! Redelivery of unacknowledged messages is the broker's responsibility.

use std::time::Duration;

/// One message as delivered by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Broker-assigned message id, for logging
    pub message_id: String,
    /// Handle used to acknowledge this delivery
    pub receipt_handle: String,
    pub body: String,
}

/// Port trait for the message broker
#[async_trait::async_trait]
pub trait IMessageQueue: Send + Sync {
    /// Receives up to `max_messages`, waiting at most `wait` for the first one
    ///
    /// An empty vector means the long-poll elapsed without messages.
    async fn receive_batch(
        &self,
        max_messages: u32,
        wait: Duration,
    ) -> anyhow::Result<Vec<QueueMessage>>;

    /// Removes a handled message from the broker
    async fn acknowledge(&self, message: &QueueMessage) -> anyhow::Result<()>;
}
