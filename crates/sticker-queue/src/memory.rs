//! In-process queue backend.
//!
//! Used by tests and single-process deployments. Rejected deliveries go back
//! to the front of the queue immediately instead of waiting to be reclaimed.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::{QueueError, QueueResult};
use crate::queue::{Delivery, RejectOutcome, TaskQueue};

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<(String, Vec<u8>, bool)>,
    pending: HashMap<String, Vec<u8>>,
    attempts: HashMap<String, u32>,
    dead: Vec<Vec<u8>>,
    cap: Option<usize>,
}

/// In-memory [`TaskQueue`].
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, QueueState>>,
    notify: Notify,
    next_id: AtomicU64,
    max_retries: u32,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(3)
    }
}

impl MemoryQueue {
    pub fn new(max_retries: u32) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            next_id: AtomicU64::new(1),
            max_retries,
        }
    }

    /// Cap a queue at `maxlen` entries, dropping the oldest on overflow.
    pub fn with_cap(self, queue: &str, maxlen: usize) -> Self {
        self.lock()
            .entry(queue.to_string())
            .or_default()
            .cap = Some(maxlen);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, QueueState>> {
        // A poisoned lock only means a test panicked mid-operation
        self.queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remove and return every waiting payload of a queue.
    pub fn drain(&self, queue: &str) -> Vec<Vec<u8>> {
        self.lock()
            .get_mut(queue)
            .map(|state| state.ready.drain(..).map(|(_, payload, _)| payload).collect())
            .unwrap_or_default()
    }

    /// Payloads waiting on a queue, without removing them.
    pub fn peek(&self, queue: &str) -> Vec<Vec<u8>> {
        self.lock()
            .get(queue)
            .map(|state| state.ready.iter().map(|(_, payload, _)| payload.clone()).collect())
            .unwrap_or_default()
    }

    /// Deliveries handed out but not yet acked or rejected.
    pub fn pending_count(&self, queue: &str) -> usize {
        self.lock().get(queue).map(|s| s.pending.len()).unwrap_or(0)
    }

    /// Payloads moved to the dead letter list.
    pub fn dead_letters(&self, queue: &str) -> Vec<Vec<u8>> {
        self.lock()
            .get(queue)
            .map(|s| s.dead.clone())
            .unwrap_or_default()
    }

    fn take(&self, queue: &str, prefetch: usize) -> QueueResult<Vec<Delivery>> {
        let mut queues = self.lock();
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| QueueError::UnknownQueue(queue.to_string()))?;

        let mut deliveries = Vec::new();
        while deliveries.len() < prefetch.max(1) {
            let Some((id, payload, redelivered)) = state.ready.pop_front() else {
                break;
            };
            state.pending.insert(id.clone(), payload.clone());
            deliveries.push(Delivery {
                id,
                queue: queue.to_string(),
                payload,
                redelivered,
            });
        }
        Ok(deliveries)
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn declare(&self, queue: &str) -> QueueResult<()> {
        self.lock().entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> QueueResult<String> {
        let id = format!("{}-0", self.next_id.fetch_add(1, Ordering::Relaxed));
        {
            let mut queues = self.lock();
            let state = queues
                .get_mut(queue)
                .ok_or_else(|| QueueError::UnknownQueue(queue.to_string()))?;
            state.ready.push_back((id.clone(), payload.to_vec(), false));
            if let Some(cap) = state.cap {
                while state.ready.len() > cap {
                    state.ready.pop_front();
                }
            }
        }
        self.notify.notify_waiters();
        Ok(id)
    }

    async fn consume(
        &self,
        queue: &str,
        _consumer: &str,
        prefetch: usize,
        block: Duration,
    ) -> QueueResult<Vec<Delivery>> {
        let notified = self.notify.notified();
        let deliveries = self.take(queue, prefetch)?;
        if !deliveries.is_empty() || block.is_zero() {
            return Ok(deliveries);
        }

        let _ = tokio::time::timeout(block, notified).await;
        self.take(queue, prefetch)
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        let mut queues = self.lock();
        let state = queues
            .get_mut(&delivery.queue)
            .ok_or_else(|| QueueError::UnknownQueue(delivery.queue.clone()))?;
        state
            .pending
            .remove(&delivery.id)
            .ok_or_else(|| QueueError::UnknownDelivery {
                queue: delivery.queue.clone(),
                id: delivery.id.clone(),
            })?;
        state.attempts.remove(&delivery.id);
        Ok(())
    }

    async fn reject(&self, delivery: &Delivery, _reason: &str) -> QueueResult<RejectOutcome> {
        let outcome = {
            let mut queues = self.lock();
            let state = queues
                .get_mut(&delivery.queue)
                .ok_or_else(|| QueueError::UnknownQueue(delivery.queue.clone()))?;
            let payload = state.pending.remove(&delivery.id).ok_or_else(|| {
                QueueError::UnknownDelivery {
                    queue: delivery.queue.clone(),
                    id: delivery.id.clone(),
                }
            })?;

            let attempt = {
                let counter = state.attempts.entry(delivery.id.clone()).or_insert(0);
                *counter += 1;
                *counter
            };

            if attempt >= self.max_retries {
                state.attempts.remove(&delivery.id);
                state.dead.push(payload);
                RejectOutcome::DeadLettered
            } else {
                state.ready.push_front((delivery.id.clone(), payload, true));
                RejectOutcome::Requeued { attempt }
            }
        };
        self.notify.notify_waiters();
        Ok(outcome)
    }

    async fn claim_stale(
        &self,
        _queue: &str,
        _consumer: &str,
        _min_idle: Duration,
        _count: usize,
    ) -> QueueResult<Vec<Delivery>> {
        // Rejections requeue immediately and there is no other consumer to crash.
        Ok(Vec::new())
    }

    async fn len(&self, queue: &str) -> QueueResult<u64> {
        Ok(self
            .lock()
            .get(queue)
            .map(|s| (s.ready.len() + s.pending.len()) as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{publish_json, PREFETCH};

    async fn declared(name: &str) -> MemoryQueue {
        let queue = MemoryQueue::new(2);
        queue.declare(name).await.unwrap();
        queue
    }

    #[tokio::test]
    async fn test_publish_consume_ack() {
        let queue = declared("a").await;
        queue.publish("a", b"one").await.unwrap();
        queue.publish("a", b"two").await.unwrap();

        let batch = queue
            .consume("a", "c1", PREFETCH, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].payload, b"one");
        assert_eq!(queue.pending_count("a"), 1);

        queue.ack(&batch[0]).await.unwrap();
        assert_eq!(queue.pending_count("a"), 0);
        assert_eq!(queue.len("a").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_publish_to_undeclared_queue_fails() {
        let queue = MemoryQueue::default();
        let err = queue.publish("missing", b"x").await.unwrap_err();
        assert!(matches!(err, QueueError::UnknownQueue(_)));
    }

    #[tokio::test]
    async fn test_reject_requeues_then_dead_letters() {
        let queue = declared("a").await;
        queue.publish("a", b"bad").await.unwrap();

        let first = queue.consume("a", "c", 1, Duration::ZERO).await.unwrap();
        let outcome = queue.reject(&first[0], "malformed").await.unwrap();
        assert_eq!(outcome, RejectOutcome::Requeued { attempt: 1 });

        let second = queue.consume("a", "c", 1, Duration::ZERO).await.unwrap();
        assert!(second[0].redelivered);
        assert_eq!(second[0].id, first[0].id);
        let outcome = queue.reject(&second[0], "malformed").await.unwrap();
        assert_eq!(outcome, RejectOutcome::DeadLettered);

        assert_eq!(queue.dead_letters("a"), vec![b"bad".to_vec()]);
        assert_eq!(queue.len("a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_consume_times_out_when_empty() {
        let queue = declared("a").await;
        let batch = queue
            .consume("a", "c", 1, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_consume_wakes_on_publish() {
        let queue = std::sync::Arc::new(declared("a").await);
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .consume("a", "c", 1, Duration::from_secs(5))
                    .await
                    .unwrap()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        publish_json(queue.as_ref(), "a", &serde_json::json!({"k": 1}))
            .await
            .unwrap();

        let batch = consumer.await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].payload, br#"{"k":1}"#);
    }

    #[tokio::test]
    async fn test_capped_queue_drops_oldest() {
        let queue = MemoryQueue::new(3).with_cap("t", 2);
        for payload in [b"1", b"2", b"3"] {
            queue.publish("t", payload).await.unwrap();
        }
        assert_eq!(queue.drain("t"), vec![b"2".to_vec(), b"3".to_vec()]);
    }
}
