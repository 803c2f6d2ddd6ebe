//! External codec invocation.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use sticker_models::MediaKind;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{filter_animated_canvas, filter_square_canvas};
use crate::ladder::EncodeParams;
use crate::probe::probe_duration;

/// The media toolchain used by the pipeline.
#[async_trait]
pub trait Codec: Send + Sync {
    /// A blocking encode of `input` into a WebP at `output`.
    ///
    /// Success means the process exited cleanly and `output` exists; size
    /// checking is left to the caller.
    async fn encode(&self, input: &Path, output: &Path, params: &EncodeParams) -> MediaResult<()>;

    /// Container duration of `input` in seconds.
    async fn duration(&self, input: &Path) -> MediaResult<f64>;
}

/// FFmpeg/libwebp codec.
pub struct FfmpegCodec {
    timeout_secs: u64,
}

impl FfmpegCodec {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    /// Build the command line for one attempt.
    pub fn command(input: &Path, output: &Path, params: &EncodeParams) -> FfmpegCommand {
        let cmd = FfmpegCommand::new(input, output).video_codec("libwebp");
        match params.media_kind {
            MediaKind::Image => cmd
                .video_filter(filter_square_canvas(params.canvas))
                .quality(params.quality)
                .compression_level(params.compression_level)
                .single_frame(),
            MediaKind::Video => {
                let cmd = cmd
                    .video_filter(filter_animated_canvas(params.canvas, params.fps))
                    .output_args(["-lossless", "0"])
                    .compression_level(params.compression_level)
                    .quality(params.quality)
                    .loop_count(0)
                    .output_args(["-preset", "picture"])
                    .no_audio()
                    .output_args(["-vsync", "0"]);
                match params.max_seconds {
                    Some(seconds) => cmd.max_duration(seconds),
                    None => cmd,
                }
            }
        }
    }
}

#[async_trait]
impl Codec for FfmpegCodec {
    async fn encode(&self, input: &Path, output: &Path, params: &EncodeParams) -> MediaResult<()> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let cmd = Self::command(input, output, params);
        debug!(
            media_kind = %params.media_kind,
            attempt = params.attempt,
            quality = params.quality,
            "Encoding sticker"
        );

        let start = Instant::now();
        FfmpegRunner::new()
            .with_timeout(self.timeout_secs)
            .run(&cmd)
            .await?;
        histogram!(
            "stickerize_codec_duration_seconds",
            "media_kind" => params.media_kind.as_str()
        )
        .record(start.elapsed().as_secs_f64());

        if !output.exists() {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited cleanly but produced no output",
                None,
                Some(0),
            ));
        }
        Ok(())
    }

    async fn duration(&self, input: &Path) -> MediaResult<f64> {
        probe_duration(input, self.timeout_secs).await
    }
}
