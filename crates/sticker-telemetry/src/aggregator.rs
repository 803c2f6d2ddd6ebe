//! Telemetry aggregator: turns outcome events into scrapeable counters.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::{counter, histogram};
use tracing::{debug, warn};

use sticker_models::TelemetryEvent;
use sticker_queue::Delivery;
use sticker_worker::{PipelineResult, StageHandler};

use crate::locale::LocaleLookup;
use crate::recorder::names;

/// Lossy counter sink for the telemetry queue.
///
/// Counters only ever increase and live until the process restarts; the
/// scraper is the durable store.
pub struct TelemetryAggregator {
    queue: String,
    lookup: Arc<dyn LocaleLookup>,
}

impl TelemetryAggregator {
    pub fn new(queue: impl Into<String>, lookup: Arc<dyn LocaleLookup>) -> Self {
        Self {
            queue: queue.into(),
            lookup,
        }
    }

    /// Fold one event into the counters.
    pub fn record(&self, event: &TelemetryEvent) {
        let media_kind = event.media_label();

        counter!(
            names::REQUESTS_TOTAL,
            "media_kind" => media_kind,
            "conversation" => event.conversation_label(),
            "outcome" => event.outcome_label()
        )
        .increment(1);

        let country = self.lookup.locale(&event.sender_id);
        if !country.is_empty() {
            counter!(names::SENDER_COUNTRY_TOTAL, "country" => country).increment(1);
        }

        histogram!(names::INITIAL_BYTES, "media_kind" => media_kind)
            .record(event.initial_byte_length as f64);
        if event.validated {
            histogram!(names::FINAL_BYTES, "media_kind" => media_kind)
                .record(event.final_byte_length as f64);
        }

        counter!(names::EVENTS_TOTAL, "result" => "recorded").increment(1);
    }
}

#[async_trait]
impl StageHandler for TelemetryAggregator {
    fn stage(&self) -> &'static str {
        "telemetry"
    }

    fn queue(&self) -> &str {
        &self.queue
    }

    async fn handle(&self, delivery: &Delivery) -> PipelineResult<()> {
        // A bad event is dropped here rather than dead-lettered.
        match delivery.decode::<TelemetryEvent>() {
            Ok(event) => {
                debug!(
                    media_kind = event.media_label(),
                    validated = event.validated,
                    "Recording telemetry event"
                );
                self.record(&event);
            }
            Err(e) => {
                counter!(names::EVENTS_TOTAL, "result" => "malformed").increment(1);
                warn!(id = %delivery.id, error = %e, "Dropping malformed telemetry event");
            }
        }
        Ok(())
    }
}
