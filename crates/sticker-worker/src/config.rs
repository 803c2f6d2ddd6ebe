//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use sticker_media::QualityLadder;
use sticker_models::{ImageRules, MediaRules, VideoRules};

use crate::error::{PipelineError, PipelineResult};

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

/// Load the media ceilings from `IMAGE_MAX_BYTES`, `VIDEO_MAX_BYTES` and
/// `VIDEO_MAX_SECONDS`.
pub fn rules_from_env() -> MediaRules {
    let defaults = MediaRules::default();
    MediaRules {
        image: ImageRules {
            max_bytes: env_parse("IMAGE_MAX_BYTES").unwrap_or(defaults.image.max_bytes),
        },
        video: VideoRules {
            max_bytes: env_parse("VIDEO_MAX_BYTES").unwrap_or(defaults.video.max_bytes),
            max_seconds: env_parse("VIDEO_MAX_SECONDS").unwrap_or(defaults.video.max_seconds),
        },
    }
}

/// Conversion stage configuration.
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    pub ladder: QualityLadder,
    /// Wall-clock limit of one codec invocation
    pub codec_timeout_secs: u64,
    /// Scratch directory for codec input and output files
    pub work_dir: PathBuf,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            ladder: QualityLadder::default(),
            codec_timeout_secs: 120,
            work_dir: std::env::temp_dir().join("stickerize"),
        }
    }
}

impl ConversionConfig {
    /// Create config from environment variables.
    pub fn from_env(rules: &MediaRules) -> Self {
        let defaults = Self::default();
        let ladder = QualityLadder {
            canvas: env_parse("STICKER_CANVAS").unwrap_or(defaults.ladder.canvas),
            fps: env_parse("STICKER_FPS").unwrap_or(defaults.ladder.fps),
            image_quality: env_parse("IMAGE_QUALITY").unwrap_or(defaults.ladder.image_quality),
            video_max_attempts: env_parse("VIDEO_MAX_ATTEMPTS")
                .unwrap_or(defaults.ladder.video_max_attempts),
            step: env_parse("QUALITY_STEP").unwrap_or(defaults.ladder.step),
            video_max_seconds: rules.video.max_seconds,
            ..defaults.ladder
        };
        Self {
            ladder,
            codec_timeout_secs: env_parse("CODEC_TIMEOUT_SECS")
                .unwrap_or(defaults.codec_timeout_secs),
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
        }
    }
}

/// Delivery and reply policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Send the completion notice in direct conversations
    pub notify_direct: bool,
    /// Send the completion notice in group conversations
    pub notify_group: bool,
    /// Quote the originating message in every reply
    pub reply_to: bool,
    /// Tell the user when conversion or delivery failed
    pub notify_on_failure: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            notify_direct: false,
            notify_group: true,
            reply_to: true,
            notify_on_failure: false,
        }
    }
}

impl DeliveryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            notify_direct: env_flag("NOTIFY_DIRECT", defaults.notify_direct),
            notify_group: env_flag("NOTIFY_GROUP", defaults.notify_group),
            reply_to: env_flag("REPLY_TO", defaults.reply_to),
            notify_on_failure: env_flag("NOTIFY_ON_FAILURE", defaults.notify_on_failure),
        }
    }

    /// Whether a completion notice follows the sticker.
    pub fn completion_notice(&self, is_group_conversation: bool) -> bool {
        if is_group_conversation {
            self.notify_group
        } else {
            self.notify_direct
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub rules: MediaRules,
    pub conversion: ConversionConfig,
    pub delivery: DeliveryConfig,
    /// How often the executor scans for stale pending deliveries
    pub claim_interval: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            rules: MediaRules::default(),
            conversion: ConversionConfig::default(),
            delivery: DeliveryConfig::default(),
            claim_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let rules = rules_from_env();
        Self {
            conversion: ConversionConfig::from_env(&rules),
            delivery: DeliveryConfig::from_env(),
            claim_interval: Duration::from_secs(
                env_parse("WORKER_CLAIM_INTERVAL_SECS").unwrap_or(30),
            ),
            shutdown_timeout: Duration::from_secs(
                env_parse("WORKER_SHUTDOWN_TIMEOUT").unwrap_or(30),
            ),
            rules,
        }
    }

    /// Check the ceilings and the ladder once at startup.
    pub fn validate(&self) -> PipelineResult<()> {
        self.rules
            .validate()
            .map_err(|e| PipelineError::config(e.to_string()))?;
        self.conversion
            .ladder
            .validate()
            .map_err(PipelineError::config)?;
        if self.conversion.codec_timeout_secs == 0 {
            return Err(PipelineError::config("CODEC_TIMEOUT_SECS must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rules.image.max_bytes, 2_097_000);
        assert_eq!(config.rules.video.max_bytes, 1_024_000);
        assert_eq!(config.conversion.codec_timeout_secs, 120);
        assert_eq!(config.conversion.ladder.video_max_attempts, 2);
    }

    #[test]
    fn test_zero_ceiling_is_rejected() {
        let mut config = WorkerConfig::default();
        config.rules.video.max_bytes = 0;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_completion_notice_policy() {
        let policy = DeliveryConfig::default();
        assert!(policy.completion_notice(true));
        assert!(!policy.completion_notice(false));

        let both = DeliveryConfig {
            notify_direct: true,
            ..policy
        };
        assert!(both.completion_notice(false));
    }
}
