//! Intake jobs spawned by the webhook handler.
//!
//! The platform gets its 200 before intake runs, so every job is tracked here
//! and drained on shutdown instead of being dropped with the runtime.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use sticker_worker::{IntakeOutcome, IntakeRequest, IntakeValidator, PipelineResult};

/// Tracker for in-flight intake jobs.
#[derive(Clone, Default)]
pub struct IntakeJobs {
    jobs: Arc<Mutex<JoinSet<PipelineResult<IntakeOutcome>>>>,
}

impl IntakeJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one request in the background.
    pub fn spawn(&self, intake: Arc<IntakeValidator>, request: IntakeRequest) {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        // Reap finished jobs so the set only holds running ones.
        while let Some(result) = jobs.try_join_next() {
            report(result);
        }
        jobs.spawn(async move { intake.submit(request).await });
    }

    /// Jobs not yet reaped.
    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for every tracked job, aborting whatever is still running after
    /// `timeout`. Returns how many jobs were aborted.
    pub async fn drain(&self, timeout: Duration) -> usize {
        let mut jobs = {
            let mut tracked = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *tracked)
        };
        if jobs.is_empty() {
            return 0;
        }
        info!(in_flight = jobs.len(), "Draining intake jobs");

        let finished = tokio::time::timeout(timeout, async {
            while let Some(result) = jobs.join_next().await {
                report(result);
            }
        })
        .await;

        if finished.is_ok() {
            return 0;
        }
        let aborted = jobs.len();
        warn!(aborted, "Intake jobs still running at shutdown, aborting");
        jobs.shutdown().await;
        aborted
    }
}

fn report(result: Result<PipelineResult<IntakeOutcome>, JoinError>) {
    match result {
        Ok(Ok(IntakeOutcome::Accepted(task))) => {
            debug!(task_id = %task.task_id, media_path = %task.media_path, "Intake accepted")
        }
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            let retryable = if e.is_retryable() { "true" } else { "false" };
            counter!("stickerize_intake_errors_total", "retryable" => retryable).increment(1);
            error!(error = %e, retryable, "Intake failed");
        }
        Err(e) => {
            counter!("stickerize_intake_errors_total", "retryable" => "false").increment(1);
            error!(error = %e, "Intake job panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_state;
    use sticker_models::{ConversationRef, MediaRef, TaskId};
    use sticker_queue::TaskQueue;

    fn request(task_id: &str, media_id: &str) -> IntakeRequest {
        IntakeRequest {
            task_id: TaskId::from_string(task_id),
            media: MediaRef {
                media_id: media_id.to_string(),
                platform_type: "image".to_string(),
                mime_type: Some("image/jpeg".to_string()),
                declared_byte_length: Some(100),
                declared_duration_seconds: None,
            },
            conversation_ref: ConversationRef::new(b"447700900000".to_vec()),
            is_group_conversation: false,
            sender_id: "447700900000".to_string(),
            requested_at: "2024-01-01T00:00:00+00:00".to_string(),
            message_id: Some(task_id.to_string()),
        }
    }

    #[tokio::test]
    async fn test_drain_waits_for_spawned_intake() {
        let state = test_state().await;
        let jobs = IntakeJobs::new();

        jobs.spawn(state.app.intake.clone(), request("wamid.J1", "img-1"));
        jobs.spawn(state.app.intake.clone(), request("wamid.J2", "img-2"));

        let aborted = jobs.drain(Duration::from_secs(5)).await;

        assert_eq!(aborted, 0);
        assert!(jobs.is_empty());
        assert_eq!(state.queue.len(&state.convert_queue).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_drain_with_nothing_in_flight() {
        let jobs = IntakeJobs::new();
        assert_eq!(jobs.drain(Duration::from_millis(10)).await, 0);
    }
}
