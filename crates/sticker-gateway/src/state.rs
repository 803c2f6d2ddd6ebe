//! Application state.

use std::sync::{Arc, Mutex};

use sticker_worker::IntakeValidator;

use crate::config::GatewayConfig;
use crate::intake::IntakeJobs;
use crate::trigger::{RecentMedia, TriggerFilter};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub intake: Arc<IntakeValidator>,
    pub jobs: IntakeJobs,
    pub triggers: TriggerFilter,
    pub recent: Arc<Mutex<RecentMedia>>,
}

impl AppState {
    pub fn new(config: GatewayConfig, intake: IntakeValidator) -> Self {
        let triggers = TriggerFilter::from_config(&config);
        let recent = RecentMedia::new(config.recent_media_capacity);
        Self {
            config,
            intake: Arc::new(intake),
            jobs: IntakeJobs::new(),
            triggers,
            recent: Arc::new(Mutex::new(recent)),
        }
    }
}
