//! Queue configuration.

use std::time::Duration;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream carrying conversion tasks (queue A)
    pub convert_queue: String,
    /// Stream carrying delivery tasks (queue B)
    pub deliver_queue: String,
    /// Stream carrying telemetry events (queue C)
    pub telemetry_queue: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Suffix appended to a queue name to form its dead letter stream
    pub dlq_suffix: String,
    /// Rejections of one delivery before it is dead-lettered
    pub max_retries: u32,
    /// Idle time after which a pending delivery may be reclaimed
    pub claim_min_idle: Duration,
    /// Approximate length cap of the telemetry stream
    pub telemetry_maxlen: usize,
    /// Upper bound of a blocking read
    pub block: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            convert_queue: "sticker:convert".to_string(),
            deliver_queue: "sticker:deliver".to_string(),
            telemetry_queue: "sticker:telemetry".to_string(),
            consumer_group: "sticker:workers".to_string(),
            dlq_suffix: ":dlq".to_string(),
            max_retries: 3,
            claim_min_idle: Duration::from_secs(300),
            telemetry_maxlen: 100_000,
            block: Duration::from_secs(1),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            convert_queue: std::env::var("CONVERT_QUEUE").unwrap_or(defaults.convert_queue),
            deliver_queue: std::env::var("DELIVER_QUEUE").unwrap_or(defaults.deliver_queue),
            telemetry_queue: std::env::var("TELEMETRY_QUEUE").unwrap_or(defaults.telemetry_queue),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            dlq_suffix: std::env::var("QUEUE_DLQ_SUFFIX").unwrap_or(defaults.dlq_suffix),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            claim_min_idle: std::env::var("QUEUE_CLAIM_MIN_IDLE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.claim_min_idle),
            telemetry_maxlen: std::env::var("TELEMETRY_QUEUE_MAXLEN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.telemetry_maxlen),
            block: defaults.block,
        }
    }

    /// Reject configurations that cannot route tasks.
    pub fn validate(&self) -> Result<(), String> {
        let names = [
            ("CONVERT_QUEUE", &self.convert_queue),
            ("DELIVER_QUEUE", &self.deliver_queue),
            ("TELEMETRY_QUEUE", &self.telemetry_queue),
        ];
        for (var, name) in names {
            if name.trim().is_empty() {
                return Err(format!("{} must not be empty", var));
            }
        }
        if self.convert_queue == self.deliver_queue
            || self.deliver_queue == self.telemetry_queue
            || self.convert_queue == self.telemetry_queue
        {
            return Err("queue names must be distinct".to_string());
        }
        if self.dlq_suffix.is_empty() {
            return Err("QUEUE_DLQ_SUFFIX must not be empty".to_string());
        }
        Ok(())
    }

    /// Dead letter stream for a queue.
    pub fn dlq_name(&self, queue: &str) -> String {
        format!("{}{}", queue, self.dlq_suffix)
    }
}
