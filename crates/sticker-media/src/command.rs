//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Lines of stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after -i)
    output_args: Vec<String>,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
        }
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Limit output duration.
    pub fn max_duration(self, seconds: u32) -> Self {
        self.output_arg("-t").output_arg(seconds.to_string())
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set codec quality (`-q:v`).
    pub fn quality(self, q: u8) -> Self {
        self.output_arg("-q:v").output_arg(q.to_string())
    }

    /// Set WebP compression effort (0-6).
    pub fn compression_level(self, level: u8) -> Self {
        self.output_arg("-compression_level").output_arg(level.to_string())
    }

    /// Set loop count; 0 loops forever.
    pub fn loop_count(self, count: u32) -> Self {
        self.output_arg("-loop").output_arg(count.to_string())
    }

    /// Drop the audio track.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Extract single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        // Overwrite, errors only
        let mut args = vec!["-y".to_string(), "-v".to_string(), "error".to_string()];

        // Input file
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        // Output args
        args.extend(self.output_args.clone());

        // Output file
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with a wall-clock timeout.
pub struct FfmpegRunner {
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self { timeout_secs: None }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let ffmpeg = check_ffmpeg()?;
        self.run_program(&ffmpeg, &cmd.build_args()).await
    }

    /// Run an arbitrary program with the runner's timeout and stderr capture.
    pub async fn run_program(&self, program: &Path, args: &[String]) -> MediaResult<()> {
        debug!("Running {} {}", program.display(), args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("stderr not captured", None, None))?;

        // Keep the tail of stderr for the error report
        let stderr_handle = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            while let Ok(Some(line)) = reader.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let result = self.wait_for_completion(&mut child).await;
        let stderr_tail = stderr_handle.await.unwrap_or_default();

        match result {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(MediaError::ffmpeg_failed(
                format!("{} exited with non-zero status", program.display()),
                (!stderr_tail.is_empty()).then_some(stderr_tail),
                status.code(),
            )),
            Err(e) => Err(e),
        }
    }

    /// Wait for child process, killing it on timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<std::process::ExitStatus> {
        let Some(timeout_secs) = self.timeout_secs else {
            return Ok(child.wait().await?);
        };

        match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                warn!("FFmpeg timed out after {} seconds, killing process", timeout_secs);
                let _ = child.kill().await;
                Err(MediaError::Timeout(timeout_secs))
            }
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.webp")
            .video_codec("libwebp")
            .quality(20)
            .compression_level(0)
            .loop_count(0)
            .no_audio()
            .max_duration(7);

        let args = cmd.build_args();
        assert_eq!(args[0], "-y");
        assert_eq!(args.last().map(String::as_str), Some("output.webp"));

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert!(pos("-i") < pos("-c:v"));
        assert_eq!(args[pos("-q:v") + 1], "20");
        assert_eq!(args[pos("-loop") + 1], "0");
        assert_eq!(args[pos("-t") + 1], "7");
        assert!(args.contains(&"-an".to_string()));
    }

    #[test]
    fn test_single_frame() {
        let args = FfmpegCommand::new("a.png", "b.webp").single_frame().build_args();
        let pos = args.iter().position(|a| a == "-frames:v").unwrap();
        assert_eq!(args[pos + 1], "1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_kills_on_timeout() {
        let runner = FfmpegRunner::new().with_timeout(1);
        let result = runner
            .run_program(Path::new("sleep"), &["5".to_string()])
            .await;
        assert!(matches!(result, Err(MediaError::Timeout(1))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_reports_exit_code_and_stderr() {
        let runner = FfmpegRunner::new();
        let result = runner
            .run_program(
                Path::new("sh"),
                &["-c".to_string(), "echo broken input >&2; exit 3".to_string()],
            )
            .await;

        match result {
            Err(MediaError::FfmpegFailed {
                stderr, exit_code, ..
            }) => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr.as_deref(), Some("broken input"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
