//! Staging queue worker
//!
//! Pops one message at a time, decodes it, runs it through the handler
//! chain and acknowledges it on success.

use std::sync::Arc;

use drivesync_core::{
    messages,
    ports::{ICommandHandler, IMessageQueue, QueueMessage},
};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Receiving half of the staging queue, shared by all workers
pub type SharedReceiver = Arc<Mutex<mpsc::Receiver<QueueMessage>>>;

/// What happened to one staged message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handled and removed from the broker
    Acknowledged,
    /// The body did not decode; left for redelivery
    Undecodable,
    /// The handler chain failed; left for redelivery
    Failed,
    /// Handled, but the acknowledgement failed; the broker will redeliver
    AckFailed,
}

/// Decodes, handles and acknowledges a single message
pub async fn process_message(
    message: &QueueMessage,
    queue: &dyn IMessageQueue,
    handler: &dyn ICommandHandler,
) -> Outcome {
    let command = match messages::decode(message.body.as_bytes()) {
        Ok(command) => command,
        Err(e) => {
            warn!(
                message_id = %message.message_id,
                error = %e,
                "Discarding undecodable message without acknowledgement"
            );
            return Outcome::Undecodable;
        }
    };

    let kind = command.kind();
    debug!(message_id = %message.message_id, kind, "Dispatching message");

    if let Err(e) = handler.handle(&command).await {
        error!(
            message_id = %message.message_id,
            kind,
            error = %format!("{e:#}"),
            "Message handling failed, leaving it for redelivery"
        );
        return Outcome::Failed;
    }

    match queue.acknowledge(message).await {
        Ok(()) => {
            info!(message_id = %message.message_id, kind, "Message handled");
            Outcome::Acknowledged
        }
        Err(e) => {
            warn!(
                message_id = %message.message_id,
                kind,
                error = %format!("{e:#}"),
                "Failed to acknowledge handled message"
            );
            Outcome::AckFailed
        }
    }
}

/// Runs one worker until `cancel` fires or the staging queue is closed and empty
///
/// Cancellation is only observed between messages; a handler already running
/// is never interrupted.
pub async fn run_worker(
    id: usize,
    staging: SharedReceiver,
    queue: Arc<dyn IMessageQueue>,
    handler: Arc<dyn ICommandHandler>,
    cancel: CancellationToken,
) {
    debug!(worker = id, "Worker started");

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            m = async { staging.lock().await.recv().await } => m,
        };
        let Some(message) = next else {
            break;
        };

        process_message(&message, queue.as_ref(), handler.as_ref()).await;
    }

    debug!(worker = id, "Worker stopped");
}

// ============================================================================
// Unit tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{
        middleware::{build_chain, RetryPolicy},
        test_support::{authorization_body, MemoryQueue, RecordingHandler},
        DispatchSettings,
    };

    fn message(id: &str, body: String) -> QueueMessage {
        QueueMessage {
            message_id: id.to_string(),
            receipt_handle: format!("rh-{id}"),
            body,
        }
    }

    fn fast_settings() -> DispatchSettings {
        DispatchSettings {
            throttle_rate: 1000.0,
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
                multiplier: 2.0,
            },
            ..DispatchSettings::default()
        }
    }

    #[tokio::test]
    async fn test_successful_message_is_acknowledged() {
        let queue = MemoryQueue::new();
        let handler = RecordingHandler::default();

        let outcome = process_message(&message("m1", authorization_body(1, "u")), &queue, &handler).await;

        assert_eq!(outcome, Outcome::Acknowledged);
        assert_eq!(queue.acked(), vec!["m1".to_string()]);
        assert_eq!(handler.handled.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_type_never_dispatched_or_acked() {
        let queue = MemoryQueue::new();
        let handler = RecordingHandler::default();
        let body = json!({"event_type": "calendar_sync", "payload": {}}).to_string();

        let outcome = process_message(&message("m1", body), &queue, &handler).await;

        assert_eq!(outcome, Outcome::Undecodable);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert!(queue.acked().is_empty());
    }

    #[tokio::test]
    async fn test_s3_test_event_is_acknowledged() {
        let queue = MemoryQueue::new();
        let handler = RecordingHandler::default();
        let body = json!({"Service": "Amazon S3", "Event": "s3:TestEvent", "Bucket": "uploads"}).to_string();

        let outcome = process_message(&message("m1", body), &queue, &handler).await;

        assert_eq!(outcome, Outcome::Acknowledged);
        assert_eq!(queue.acked(), vec!["m1".to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_body_not_acked() {
        let queue = MemoryQueue::new();
        let handler = RecordingHandler::default();

        let outcome = process_message(&message("m1", "not json".into()), &queue, &handler).await;

        assert_eq!(outcome, Outcome::Undecodable);
        assert!(queue.acked().is_empty());
    }

    #[tokio::test]
    async fn test_always_failing_handler_retried_then_left() {
        let queue = MemoryQueue::new();
        let recorder = Arc::new(RecordingHandler::default());
        let chain = build_chain(recorder.clone(), &fast_settings());

        let outcome =
            process_message(&message("m1", authorization_body(1, "fail")), &queue, chain.as_ref()).await;

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 3);
        assert!(queue.acked().is_empty());
    }

    #[tokio::test]
    async fn test_worker_survives_handler_panic() {
        let queue = Arc::new(MemoryQueue::new());
        let recorder = Arc::new(RecordingHandler::default());
        let chain = build_chain(recorder.clone(), &fast_settings());
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        tx.send(message("boom", authorization_body(1, "panic"))).await.unwrap();
        tx.send(message("ok", authorization_body(2, "u"))).await.unwrap();
        drop(tx);

        run_worker(
            0,
            Arc::new(Mutex::new(rx)),
            queue.clone(),
            chain,
            cancel,
        )
        .await;

        assert_eq!(queue.acked(), vec!["ok".to_string()]);
        assert_eq!(recorder.handled.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_worker_stops_on_cancel() {
        let queue = Arc::new(MemoryQueue::new());
        let handler = Arc::new(RecordingHandler::default());
        let (_tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_worker(
            0,
            Arc::new(Mutex::new(rx)),
            queue,
            handler,
            cancel.clone(),
        ));
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
