//! Media kinds and the ceilings a sticker artifact must satisfy.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default image ceiling: 2MB.
pub const DEFAULT_IMAGE_MAX_BYTES: u64 = 2_097_000;
/// Default video ceiling. Animated stickers above ~1000KiB stop animating.
pub const DEFAULT_VIDEO_MAX_BYTES: u64 = 1_024_000;
/// Default video duration ceiling in seconds.
pub const DEFAULT_VIDEO_MAX_SECONDS: u32 = 7;

/// Extension of every converted artifact.
pub const WEBP_EXTENSION: &str = ".webp";

/// Kind of media a sticker is produced from.
///
/// GIFs are delivered by chat platforms as short videos and are treated as
/// [`MediaKind::Video`] throughout the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Parse a platform media type name. Returns `None` for unsupported media.
    pub fn from_platform_type(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "image" => Some(MediaKind::Image),
            "video" | "gif" => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// Whether artifacts of this kind are animated.
    pub fn is_animated(&self) -> bool {
        !matches!(self, MediaKind::Image)
    }

    /// Top-level staging directory for this kind (`images`, `videos`).
    pub fn staging_dir(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        }
    }

    /// Extension used when the platform mime type is unknown.
    pub fn canonical_extension(&self) -> &'static str {
        match self {
            MediaKind::Image => ".jpg",
            MediaKind::Video => ".mp4",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a mime type to a file extension (with leading dot).
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    match essence.to_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/webp" => Some(".webp"),
        "image/gif" => Some(".gif"),
        "video/mp4" => Some(".mp4"),
        "video/3gpp" => Some(".3gp"),
        "video/quicktime" => Some(".mov"),
        "video/webm" => Some(".webm"),
        _ => None,
    }
}

/// Reference to media held by the chat platform, as reported before any
/// download happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MediaRef {
    /// Platform media id
    pub media_id: String,
    /// Platform message type (`image`, `video`, `gif`, `document`, ...)
    pub platform_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Size reported by the platform, when the message carries it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_byte_length: Option<u64>,
    /// Duration reported by the platform (video only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_duration_seconds: Option<u32>,
}

impl MediaRef {
    /// Supported kind of this media, `None` when unsupported.
    pub fn media_kind(&self) -> Option<MediaKind> {
        MediaKind::from_platform_type(&self.platform_type)
    }

    /// Extension for the staged raw file: from the mime type when known,
    /// otherwise the kind's canonical extension.
    pub fn extension(&self, kind: MediaKind) -> &'static str {
        self.mime_type
            .as_deref()
            .and_then(extension_for_mime)
            .unwrap_or_else(|| kind.canonical_extension())
    }
}

/// Ceiling for still images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ImageRules {
    pub max_bytes: u64,
}

/// Ceilings for animated media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VideoRules {
    pub max_bytes: u64,
    pub max_seconds: u32,
}

/// Per-kind ceilings. Loaded once at startup, immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MediaRules {
    pub image: ImageRules,
    pub video: VideoRules,
}

impl Default for MediaRules {
    fn default() -> Self {
        Self {
            image: ImageRules {
                max_bytes: DEFAULT_IMAGE_MAX_BYTES,
            },
            video: VideoRules {
                max_bytes: DEFAULT_VIDEO_MAX_BYTES,
                max_seconds: DEFAULT_VIDEO_MAX_SECONDS,
            },
        }
    }
}

/// Invalid rule configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RulesError {
    #[error("{0} max_bytes must be greater than zero")]
    ZeroBytes(MediaKind),

    #[error("video max_seconds must be greater than zero")]
    ZeroSeconds,
}

/// A business-rule violation detected at intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    TooLarge {
        kind: MediaKind,
        actual_bytes: u64,
        max_bytes: u64,
    },
    TooLong {
        actual_seconds: u32,
        max_seconds: u32,
    },
}

impl RuleViolation {
    /// Human-readable reply sent back to the conversation.
    pub fn user_message(&self) -> String {
        match self {
            RuleViolation::TooLarge {
                kind: MediaKind::Image,
                max_bytes,
                ..
            } => format!("Your image is larger than {}", format_megabytes(*max_bytes)),
            RuleViolation::TooLarge {
                kind: MediaKind::Video,
                actual_bytes,
                max_bytes,
            } => format!(
                "Your video size {}Kb is greater than {}Kb",
                actual_bytes / 1024,
                max_bytes / 1024
            ),
            RuleViolation::TooLong { max_seconds, .. } => {
                format!("Your video is longer than {} seconds", max_seconds)
            }
        }
    }
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleViolation::TooLarge {
                kind,
                actual_bytes,
                max_bytes,
            } => write!(f, "{} of {} bytes exceeds {} bytes", kind, actual_bytes, max_bytes),
            RuleViolation::TooLong {
                actual_seconds,
                max_seconds,
            } => write!(f, "video of {}s exceeds {}s", actual_seconds, max_seconds),
        }
    }
}

fn format_megabytes(bytes: u64) -> String {
    let mb = bytes as f64 / 1_000_000.0;
    if (mb - mb.round()).abs() < 0.1 {
        format!("{}MB", mb.round() as u64)
    } else {
        format!("{:.1}MB", mb)
    }
}

impl MediaRules {
    /// Reject zero ceilings.
    pub fn validate(&self) -> Result<(), RulesError> {
        if self.image.max_bytes == 0 {
            return Err(RulesError::ZeroBytes(MediaKind::Image));
        }
        if self.video.max_bytes == 0 {
            return Err(RulesError::ZeroBytes(MediaKind::Video));
        }
        if self.video.max_seconds == 0 {
            return Err(RulesError::ZeroSeconds);
        }
        Ok(())
    }

    /// Byte ceiling for a media kind.
    pub fn max_bytes(&self, kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Image => self.image.max_bytes,
            MediaKind::Video => self.video.max_bytes,
        }
    }

    /// Whether an artifact of `bytes` fits the ceiling for `kind`.
    pub fn fits(&self, kind: MediaKind, bytes: u64) -> bool {
        bytes <= self.max_bytes(kind)
    }

    /// Check declared size and duration against the ceilings.
    ///
    /// Duration is only checked for video; a missing duration is accepted.
    pub fn check(
        &self,
        kind: MediaKind,
        byte_length: u64,
        duration_seconds: Option<u32>,
    ) -> Result<(), RuleViolation> {
        if kind == MediaKind::Video {
            if let Some(seconds) = duration_seconds {
                if seconds > self.video.max_seconds {
                    return Err(RuleViolation::TooLong {
                        actual_seconds: seconds,
                        max_seconds: self.video.max_seconds,
                    });
                }
            }
        }

        let max_bytes = self.max_bytes(kind);
        if byte_length > max_bytes {
            return Err(RuleViolation::TooLarge {
                kind,
                actual_bytes: byte_length,
                max_bytes,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_type_parsing() {
        assert_eq!(MediaKind::from_platform_type("image"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_platform_type("VIDEO"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_platform_type("gif"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_platform_type("document"), None);
    }

    #[test]
    fn test_image_over_ceiling_is_rejected() {
        let rules = MediaRules {
            image: ImageRules { max_bytes: 2_000_000 },
            ..Default::default()
        };
        let violation = rules.check(MediaKind::Image, 3_000_000, None).unwrap_err();
        assert!(matches!(violation, RuleViolation::TooLarge { .. }));
        assert_eq!(violation.user_message(), "Your image is larger than 2MB");
        assert!(rules.check(MediaKind::Image, 1_500_000, None).is_ok());
    }

    #[test]
    fn test_ceiling_is_inclusive() {
        let rules = MediaRules::default();
        assert!(rules.check(MediaKind::Video, DEFAULT_VIDEO_MAX_BYTES, Some(7)).is_ok());
        assert!(rules.fits(MediaKind::Video, DEFAULT_VIDEO_MAX_BYTES));
        assert!(!rules.fits(MediaKind::Video, DEFAULT_VIDEO_MAX_BYTES + 1));
    }

    #[test]
    fn test_video_duration_checked_before_size() {
        let rules = MediaRules::default();
        let violation = rules
            .check(MediaKind::Video, DEFAULT_VIDEO_MAX_BYTES * 2, Some(30))
            .unwrap_err();
        assert_eq!(
            violation,
            RuleViolation::TooLong {
                actual_seconds: 30,
                max_seconds: DEFAULT_VIDEO_MAX_SECONDS
            }
        );
        assert_eq!(violation.user_message(), "Your video is longer than 7 seconds");
    }

    #[test]
    fn test_video_size_message_in_kilobytes() {
        let rules = MediaRules::default();
        let violation = rules.check(MediaKind::Video, 2_048_000, Some(3)).unwrap_err();
        assert_eq!(
            violation.user_message(),
            "Your video size 2000Kb is greater than 1000Kb"
        );
    }

    #[test]
    fn test_duration_ignored_for_images() {
        let rules = MediaRules::default();
        assert!(rules.check(MediaKind::Image, 10, Some(1000)).is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_ceilings() {
        let mut rules = MediaRules::default();
        assert!(rules.validate().is_ok());
        rules.video.max_seconds = 0;
        assert_eq!(rules.validate(), Err(RulesError::ZeroSeconds));
        rules.image.max_bytes = 0;
        assert_eq!(rules.validate(), Err(RulesError::ZeroBytes(MediaKind::Image)));
    }

    #[test]
    fn test_media_ref_extension_fallback() {
        let media = MediaRef {
            media_id: "1".to_string(),
            platform_type: "gif".to_string(),
            mime_type: Some("application/x-unknown".to_string()),
            declared_byte_length: None,
            declared_duration_seconds: None,
        };
        assert_eq!(media.media_kind(), Some(MediaKind::Video));
        assert_eq!(media.extension(MediaKind::Video), ".mp4");
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("image/jpeg"), Some(".jpg"));
        assert_eq!(extension_for_mime("video/mp4; codecs=avc1"), Some(".mp4"));
        assert_eq!(extension_for_mime("application/pdf"), None);
    }
}
