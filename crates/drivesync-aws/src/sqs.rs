//! Amazon SQS message queue adapter
//!
//! Receives with long polling and acknowledges by deleting the message via
//! its receipt handle. Unacknowledged messages become visible again after
//! the queue's visibility timeout.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::{error::DisplayErrorContext, types::Message, Client};
use drivesync_core::{
    config::QueueConfig,
    ports::{IMessageQueue, QueueMessage},
};
use tracing::{debug, warn};

use crate::{
    sdk::{load_sdk_config, StaticCredentials},
    AwsError,
};

/// SQS allows at most 10 messages per ReceiveMessage call
pub const MAX_BATCH: u32 = 10;

/// SQS caps the long-poll wait at 20 seconds
pub const MAX_WAIT: Duration = Duration::from_secs(20);

/// [`IMessageQueue`] backed by an SQS queue
pub struct SqsMessageQueue {
    client: Client,
    queue_url: String,
}

impl SqsMessageQueue {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// Builds the adapter from the `queue` configuration section
    pub async fn from_config(config: &QueueConfig, credentials: Option<&StaticCredentials>) -> Self {
        let sdk_config =
            load_sdk_config(&config.region, config.endpoint.as_deref(), credentials).await;
        tracing::info!(queue_url = %config.queue_url, "SQS queue adapter initialized");
        Self::new(Client::new(&sdk_config), &config.queue_url)
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

/// Converts an SQS message, skipping deliveries that cannot be handled or acknowledged
fn to_queue_message(message: Message) -> Option<QueueMessage> {
    let message_id = message.message_id.unwrap_or_default();
    let Some(receipt_handle) = message.receipt_handle else {
        warn!(message_id = %message_id, "Skipping message without receipt handle");
        return None;
    };
    let Some(body) = message.body else {
        warn!(message_id = %message_id, "Skipping message without body");
        return None;
    };
    Some(QueueMessage {
        message_id,
        receipt_handle,
        body,
    })
}

#[async_trait]
impl IMessageQueue for SqsMessageQueue {
    async fn receive_batch(
        &self,
        max_messages: u32,
        wait: Duration,
    ) -> anyhow::Result<Vec<QueueMessage>> {
        let max_messages = max_messages.clamp(1, MAX_BATCH);
        let wait = wait.min(MAX_WAIT);

        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages as i32)
            .wait_time_seconds(wait.as_secs() as i32)
            .send()
            .await
            .map_err(|e| AwsError::Receive {
                queue_url: self.queue_url.clone(),
                detail: DisplayErrorContext(&e).to_string(),
            })?;

        let messages: Vec<QueueMessage> = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(to_queue_message)
            .collect();

        if !messages.is_empty() {
            debug!(count = messages.len(), "Received messages");
        }
        Ok(messages)
    }

    async fn acknowledge(&self, message: &QueueMessage) -> anyhow::Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&message.receipt_handle)
            .send()
            .await
            .map_err(|e| AwsError::Delete {
                message_id: message.message_id.clone(),
                detail: DisplayErrorContext(&e).to_string(),
            })?;

        debug!(message_id = %message.message_id, "Acknowledged message");
        Ok(())
    }
}
