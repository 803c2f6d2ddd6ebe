//! Gateway configuration.

use std::time::Duration;

/// Webhook gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Token the platform echoes during webhook verification
    pub verify_token: Option<String>,
    /// Only this sender is served when set
    pub allowed_sender: Option<String>,
    /// Captions or reply texts that request a sticker, lowercased
    pub trigger_commands: Vec<String>,
    /// Media messages remembered for quoted replies
    pub recent_media_capacity: usize,
    /// Max request body size
    pub max_body_size: usize,
    /// Expose `/metrics`
    pub metrics_enabled: bool,
    /// How long in-flight intake jobs may run after a shutdown signal
    pub shutdown_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            verify_token: None,
            allowed_sender: None,
            trigger_commands: vec!["stickerize".to_string()],
            recent_media_capacity: 1024,
            max_body_size: 1024 * 1024, // 1MB
            metrics_enabled: true,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("GATEWAY_HOST").unwrap_or(defaults.host),
            port: std::env::var("GATEWAY_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            verify_token: non_empty("VERIFY_TOKEN"),
            allowed_sender: non_empty("ALLOWED_SENDER")
                .map(|s| s.trim_start_matches('+').to_string()),
            trigger_commands: std::env::var("TRIGGER_COMMANDS")
                .ok()
                .map(|s| parse_commands(&s))
                .filter(|commands| !commands.is_empty())
                .unwrap_or(defaults.trigger_commands),
            recent_media_capacity: std::env::var("RECENT_MEDIA_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.recent_media_capacity),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
            shutdown_timeout: std::env::var("SHUTDOWN_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Comma separated commands, trimmed and lowercased.
pub fn parse_commands(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
