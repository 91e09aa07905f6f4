//! In-memory broker and handler fakes shared by the unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use drivesync_core::{
    domain::Command,
    ports::{ICommandHandler, IMessageQueue, QueueMessage},
};
use serde_json::json;

/// Broker fake: hands out pending messages and records acknowledgements
#[derive(Default)]
pub struct MemoryQueue {
    pending: Mutex<VecDeque<QueueMessage>>,
    acked: Mutex<Vec<String>>,
    receive_calls: AtomicUsize,
    failing_receives: AtomicUsize,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_body(&self, id: &str, body: String) {
        self.pending.lock().unwrap().push_back(QueueMessage {
            message_id: id.to_string(),
            receipt_handle: format!("rh-{id}"),
            body,
        });
    }

    /// Makes the next `n` receive calls fail
    pub fn fail_receives(&self, n: usize) {
        self.failing_receives.store(n, Ordering::SeqCst);
    }

    pub fn acked(&self) -> Vec<String> {
        self.acked.lock().unwrap().clone()
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

#[async_trait]
impl IMessageQueue for MemoryQueue {
    async fn receive_batch(
        &self,
        max_messages: u32,
        wait: Duration,
    ) -> anyhow::Result<Vec<QueueMessage>> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_receives.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_receives.store(failing - 1, Ordering::SeqCst);
            anyhow::bail!("broker unavailable");
        }

        let batch: Vec<QueueMessage> = {
            let mut pending = self.pending.lock().unwrap();
            let n = pending.len().min(max_messages as usize);
            pending.drain(..n).collect()
        };
        if batch.is_empty() {
            tokio::time::sleep(wait).await;
        }
        Ok(batch)
    }

    async fn acknowledge(&self, message: &QueueMessage) -> anyhow::Result<()> {
        self.acked.lock().unwrap().push(message.message_id.clone());
        Ok(())
    }
}

/// Records the commands it receives and succeeds, unless the user id is
/// `"fail"` (error) or `"panic"` (panic)
#[derive(Default)]
pub struct RecordingHandler {
    pub handled: Mutex<Vec<Command>>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ICommandHandler for RecordingHandler {
    async fn handle(&self, command: &Command) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Command::Authorize(auth) = command {
            match auth.user_id.as_str() {
                "fail" => anyhow::bail!("handler failure"),
                "panic" => panic!("handler exploded"),
                _ => {}
            }
        }
        self.handled.lock().unwrap().push(command.clone());
        Ok(())
    }
}

/// Envelope body of an authorization message for `user_id`
pub fn authorization_body(owner_id: i64, user_id: &str) -> String {
    json!({
        "event_type": "onedrive_authorization",
        "payload": {
            "owner_id": owner_id,
            "user_id": user_id,
            "refresh_token": "rt"
        }
    })
    .to_string()
}
