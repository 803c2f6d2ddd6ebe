//! The durable queue abstraction shared by every stage.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::QueueResult;

/// Deliveries handed to a consumer per read. A worker does not receive a new
/// delivery until it has acked or rejected the previous one.
pub const PREFETCH: usize = 1;

/// A message received from a queue, owned by one consumer until acked or
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned message id
    pub id: String,
    /// Queue the message was read from
    pub queue: String,
    /// Raw payload bytes
    pub payload: Vec<u8>,
    /// True when the message was reclaimed after an earlier attempt
    pub redelivered: bool,
}

impl Delivery {
    /// Decode the payload as JSON.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// What happened to a rejected delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectOutcome {
    /// Left for redelivery by the broker
    Requeued { attempt: u32 },
    /// Retry budget spent, moved to the dead letter stream
    DeadLettered,
}

/// At-least-once task queue.
///
/// Queues are declared idempotently at startup. Rejecting a delivery hands it
/// back to the broker's retry policy; it is never silently acknowledged.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Create the queue and its consumer group if missing.
    async fn declare(&self, queue: &str) -> QueueResult<()>;

    /// Append a persistent message, returning its id.
    async fn publish(&self, queue: &str, payload: &[u8]) -> QueueResult<String>;

    /// Wait up to `block` for at most `prefetch` new deliveries.
    async fn consume(
        &self,
        queue: &str,
        consumer: &str,
        prefetch: usize,
        block: Duration,
    ) -> QueueResult<Vec<Delivery>>;

    /// Mark a delivery as done and drop it from the queue.
    async fn ack(&self, delivery: &Delivery) -> QueueResult<()>;

    /// Hand a delivery back to the broker.
    async fn reject(&self, delivery: &Delivery, reason: &str) -> QueueResult<RejectOutcome>;

    /// Take over deliveries left pending for longer than `min_idle`.
    async fn claim_stale(
        &self,
        queue: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> QueueResult<Vec<Delivery>>;

    /// Number of messages currently held by the queue.
    async fn len(&self, queue: &str) -> QueueResult<u64>;
}

/// Serialize `value` as JSON and publish it.
pub async fn publish_json<T: Serialize + Sync>(
    queue: &dyn TaskQueue,
    name: &str,
    value: &T,
) -> QueueResult<String> {
    let payload = serde_json::to_vec(value)?;
    queue.publish(name, &payload).await
}
