//! Webhook gateway for the sticker pipeline.
//!
//! This crate provides:
//! - Webhook verification and inbound message intake
//! - Trigger commands, quoted replies and the sender allow-list
//! - Health and Prometheus endpoints

pub mod config;
pub mod error;
pub mod handlers;
pub mod intake;
pub mod routes;
pub mod state;
pub mod trigger;

#[cfg(test)]
mod testing;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use intake::IntakeJobs;
pub use routes::create_router;
pub use state::AppState;
pub use trigger::{RecentMedia, Skip, TriggerFilter};
