//! Telemetry service configuration.

/// Scrape endpoint configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9091,
        }
    }
}

impl TelemetryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("TELEMETRY_HOST").unwrap_or(defaults.host),
            port: std::env::var("TELEMETRY_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
