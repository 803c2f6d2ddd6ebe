//! Durable task queues connecting the pipeline stages.
//!
//! This crate provides:
//! - The [`TaskQueue`] abstraction (declare/publish/consume/ack/reject)
//! - A Redis Streams backend with consumer groups, retry counting and DLQ
//! - An in-process backend for tests and single-process runs

pub mod config;
pub mod error;
pub mod memory;
pub mod queue;
pub mod redis_queue;

pub use config::QueueConfig;
pub use error::{QueueError, QueueResult};
pub use memory::MemoryQueue;
pub use queue::{publish_json, Delivery, RejectOutcome, TaskQueue, PREFETCH};
pub use redis_queue::RedisQueue;
