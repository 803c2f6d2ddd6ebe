//! Sticker pipeline stages.
//!
//! This crate provides:
//! - Intake validation and conversion task construction
//! - The conversion engine walking the quality ladder
//! - The delivery worker uploading and sending stickers
//! - A stage executor consuming queues with a prefetch of one
//! - The shared pipeline context, config and task logging

pub mod config;
pub mod context;
pub mod conversion;
pub mod delivery;
pub mod error;
pub mod executor;
pub mod intake;
pub mod logging;

#[cfg(test)]
mod testing;

pub use config::{rules_from_env, ConversionConfig, DeliveryConfig, WorkerConfig};
pub use context::{PipelineContext, QueueNames, FAILURE_NOTICE};
pub use conversion::{ConversionEngine, ConversionReport};
pub use delivery::{DeliveryWorker, COMPLETION_NOTICE};
pub use error::{PipelineError, PipelineResult};
pub use executor::{ExecutorConfig, StageExecutor, StageHandler};
pub use intake::{IntakeOutcome, IntakeRequest, IntakeValidator, UNSUPPORTED_MEDIA_NOTICE};
pub use logging::{init_tracing, TaskLogger};
