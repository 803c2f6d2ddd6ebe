//! FFmpeg CLI wrapper for sticker encoding.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with a wall-clock timeout
//! - The quality ladder mapping `(media_kind, source_byte_length, attempt)`
//!   to encoding parameters
//! - The [`Codec`] seam and its FFmpeg implementation
//! - FFprobe duration lookup
//! - Sticker-pack EXIF embedding for WebP artifacts

pub mod codec;
pub mod command;
pub mod error;
pub mod exif;
pub mod filters;
pub mod ladder;
pub mod probe;

pub use codec::{Codec, FfmpegCodec};
pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use exif::{MetadataWriter, StickerPackMetadata};
pub use ladder::{EncodeParams, QualityBucket, QualityLadder};
pub use probe::probe_duration;
