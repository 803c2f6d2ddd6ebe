//! Telemetry side channel.
//!
//! This crate provides:
//! - The aggregator folding outcome events into Prometheus counters
//! - Sender locale lookup from calling codes
//! - The `/metrics` scrape endpoint

pub mod aggregator;
pub mod config;
pub mod locale;
pub mod recorder;
pub mod routes;

pub use aggregator::TelemetryAggregator;
pub use config::TelemetryConfig;
pub use locale::{CallingCodeLookup, LocaleLookup};
pub use recorder::{init_metrics, names, BYTE_BUCKETS};
pub use routes::create_router;
