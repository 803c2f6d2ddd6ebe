//! Quality ladder: encoding parameters as a pure function of
//! `(media_kind, source_byte_length, attempt)`.

use serde::{Deserialize, Serialize};
use sticker_models::MediaKind;

/// Parameters of a single codec invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeParams {
    pub media_kind: MediaKind,
    /// Zero-based attempt index
    pub attempt: u32,
    /// libwebp quality, 0-100
    pub quality: u8,
    /// libwebp compression effort, 0-6
    pub compression_level: u8,
    /// Square output edge in pixels
    pub canvas: u32,
    /// Output frame rate (animated only)
    pub fps: u32,
    /// Output duration cap (animated only)
    pub max_seconds: Option<u32>,
}

impl EncodeParams {
    pub fn is_fallback(&self) -> bool {
        self.attempt > 0
    }
}

/// Source size bucket: sources strictly below `below_bytes` start at
/// `quality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityBucket {
    pub below_bytes: u64,
    pub quality: u8,
}

/// Ordered encoding parameter sets tried until the ceiling is met.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityLadder {
    pub canvas: u32,
    pub fps: u32,
    /// Fixed quality of the single image pass
    pub image_quality: u8,
    /// Total video attempts, initial pass included
    pub video_max_attempts: u32,
    /// Quality decrement per fallback attempt
    pub step: u8,
    /// Lowest quality a fallback may reach
    pub floor: u8,
    pub initial_compression: u8,
    pub fallback_compression: u8,
    pub video_max_seconds: u32,
    /// Ascending buckets; sources above the last bucket use `default_quality`
    pub buckets: Vec<QualityBucket>,
    pub default_quality: u8,
}

impl Default for QualityLadder {
    fn default() -> Self {
        Self {
            canvas: 512,
            fps: 20,
            image_quality: 75,
            video_max_attempts: 2,
            step: 5,
            floor: 1,
            initial_compression: 0,
            fallback_compression: 6,
            video_max_seconds: sticker_models::DEFAULT_VIDEO_MAX_SECONDS,
            buckets: vec![
                QualityBucket {
                    below_bytes: 300_000,
                    quality: 20,
                },
                QualityBucket {
                    below_bytes: 400_000,
                    quality: 10,
                },
            ],
            default_quality: 5,
        }
    }
}

impl QualityLadder {
    /// Starting video quality for a source size. Smaller sources start
    /// higher since the same relative compression yields less output.
    pub fn starting_quality(&self, source_byte_length: u64) -> u8 {
        self.buckets
            .iter()
            .find(|b| source_byte_length < b.below_bytes)
            .map(|b| b.quality)
            .unwrap_or(self.default_quality)
    }

    /// Attempt budget for a media kind. Images get a single pass.
    pub fn max_attempts(&self, kind: MediaKind) -> u32 {
        match kind {
            MediaKind::Image => 1,
            MediaKind::Video => self.video_max_attempts.max(1),
        }
    }

    /// Parameters for `attempt`, or `None` once the budget is spent.
    pub fn params(
        &self,
        kind: MediaKind,
        source_byte_length: u64,
        attempt: u32,
    ) -> Option<EncodeParams> {
        if attempt >= self.max_attempts(kind) {
            return None;
        }

        let params = match kind {
            MediaKind::Image => EncodeParams {
                media_kind: kind,
                attempt,
                quality: self.image_quality,
                compression_level: self.fallback_compression,
                canvas: self.canvas,
                fps: self.fps,
                max_seconds: None,
            },
            MediaKind::Video => {
                let start = self.starting_quality(source_byte_length);
                let decrement = u32::from(self.step).saturating_mul(attempt);
                let quality = u32::from(start)
                    .saturating_sub(decrement)
                    .max(u32::from(self.floor)) as u8;
                EncodeParams {
                    media_kind: kind,
                    attempt,
                    quality,
                    compression_level: if attempt == 0 {
                        self.initial_compression
                    } else {
                        self.fallback_compression
                    },
                    canvas: self.canvas,
                    fps: self.fps,
                    max_seconds: Some(self.video_max_seconds),
                }
            }
        };
        Some(params)
    }

    /// Every rung for a task, in order.
    pub fn rungs(&self, kind: MediaKind, source_byte_length: u64) -> Vec<EncodeParams> {
        (0..self.max_attempts(kind))
            .filter_map(|attempt| self.params(kind, source_byte_length, attempt))
            .collect()
    }

    /// Reject ladders that cannot produce a valid invocation.
    pub fn validate(&self) -> Result<(), String> {
        if self.canvas == 0 || self.fps == 0 {
            return Err("canvas and fps must be greater than zero".to_string());
        }
        if self.image_quality > 100 || self.default_quality > 100 {
            return Err("quality must be within 0-100".to_string());
        }
        if self.initial_compression > 6 || self.fallback_compression > 6 {
            return Err("compression level must be within 0-6".to_string());
        }
        if self.video_max_attempts == 0 {
            return Err("VIDEO_MAX_ATTEMPTS must be at least 1".to_string());
        }
        if self
            .buckets
            .windows(2)
            .any(|w| w[0].below_bytes >= w[1].below_bytes)
        {
            return Err("quality buckets must be ascending".to_string());
        }
        Ok(())
    }
}
