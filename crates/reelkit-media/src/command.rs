//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;

/// Number of trailing stderr lines kept for error reporting.
const STDERR_TAIL_LINES: usize = 40;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: Option<PathBuf>,
    /// Arguments placed before -i
    input_args: Vec<String>,
    /// Arguments placed after -i
    output_args: Vec<String>,
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a command producing `output` from `input`.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: Some(output.as_ref().to_path_buf()),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Create an analysis-only command with a null sink (`-f null -`).
    pub fn analysis(input: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: None,
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: false,
        }
    }

    /// Add an input argument (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add an output argument (after -i).
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

    /// Seek position (before input, frame-accurate enough for cuts).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{seconds:.3}"))
    }

    /// Limit the output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format!("{seconds:.3}"))
    }

    /// Set the video filter chain.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Copy the audio stream through unmodified.
    pub fn copy_audio(self) -> Self {
        self.output_arg("-c:a").output_arg("copy")
    }

    /// Build the full argument vector.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.overwrite {
            args.push("-y".to_string());
        }
        args.push("-v".to_string());
        args.push("error".to_string());
        // Progress key/value stream interleaves with stderr.
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());
        args.extend(self.input_args.clone());
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());
        args.extend(self.output_args.clone());
        match &self.output {
            Some(output) => args.push(output.to_string_lossy().to_string()),
            None => {
                args.push("-f".to_string());
                args.push("null".to_string());
                args.push("-".to_string());
            }
        }
        args
    }
}

/// Runner for FFmpeg commands with progress tracking, timeout and
/// cancellation.
pub struct FfmpegRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self {
            cancel_rx: None,
            timeout_secs: None,
        }
    }

    /// Kill the child when this channel flips to true.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command, invoking `progress_callback` as the encoder
    /// reports output-time advances.
    pub async fn run_with_progress<F>(
        &self,
        cmd: &FfmpegCommand,
        progress_callback: F,
    ) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("running: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::InvalidVideo("stderr not captured".to_string()))?;

        // Drain stderr as it arrives: progress key/value pairs feed the
        // callback, everything else lands in a bounded tail for diagnostics.
        let tail_handle = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut current = FfmpegProgress::default();
            while let Ok(Some(line)) = reader.next_line().await {
                match parse_progress_line(&line, &mut current) {
                    StderrLine::Snapshot(progress) => progress_callback(progress),
                    StderrLine::Consumed => {}
                    StderrLine::Other => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let result = self.wait_for_completion(&mut child).await;
        let stderr_tail = tail_handle.await.unwrap_or_default();

        match result {
            Err(MediaError::FfmpegFailed {
                message, exit_code, ..
            }) => Err(MediaError::FfmpegFailed {
                message,
                stderr: Some(stderr_tail),
                exit_code,
            }),
            other => other,
        }
    }

    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<()> {
        let deadline = self
            .timeout_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        let mut cancel_rx = self.cancel_rx.clone();

        let status = loop {
            tokio::select! {
                status = child.wait() => break status?,
                _ = deadline_elapsed(deadline) => {
                    let secs = self.timeout_secs.unwrap_or_default();
                    warn!("FFmpeg timed out after {secs}s, killing process");
                    let _ = child.kill().await;
                    return Err(MediaError::Timeout(secs));
                }
                _ = cancel_requested(&mut cancel_rx) => {
                    warn!("FFmpeg cancelled, killing process");
                    let _ = child.kill().await;
                    return Err(MediaError::Cancelled);
                }
            }
        };

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                None,
                status.code(),
            ))
        }
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn cancel_requested(rx: &mut Option<watch::Receiver<bool>>) {
    match rx {
        Some(rx) => loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender dropped without cancelling; wait forever.
                std::future::pending::<()>().await;
            }
        },
        None => std::future::pending().await,
    }
}

/// Classification of one stderr line from FFmpeg.
enum StderrLine {
    /// A progress key that updated the running snapshot.
    Consumed,
    /// End of a progress block; emit the snapshot.
    Snapshot(FfmpegProgress),
    /// Genuine stderr output.
    Other,
}

/// Parse one line of FFmpeg's `-progress` stream.
fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> StderrLine {
    let Some((key, value)) = line.trim().split_once('=') else {
        return StderrLine::Other;
    };
    match key {
        "out_time_ms" | "out_time_us" => {
            // Despite the name, both keys carry microseconds.
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
            StderrLine::Consumed
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
            StderrLine::Consumed
        }
        "fps" => {
            if let Ok(fps) = value.parse() {
                current.fps = fps;
            }
            StderrLine::Consumed
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.parse().ok()) {
                current.speed = speed;
            }
            StderrLine::Consumed
        }
        "bitrate" | "total_size" | "out_time" | "dup_frames" | "drop_frames" | "stream_0_0_q" => {
            StderrLine::Consumed
        }
        "progress" => {
            current.is_complete = value == "end";
            StderrLine::Snapshot(current.clone())
        }
        _ => StderrLine::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_args_orders_sections() {
        let cmd = FfmpegCommand::new("in.mp4", "out.mp4")
            .seek(3.0)
            .duration(10.0)
            .video_filter("scale=720:1280")
            .copy_audio();
        let args = cmd.build_args();

        let i_pos = args.iter().position(|a| a == "-i").unwrap();
        let ss_pos = args.iter().position(|a| a == "-ss").unwrap();
        let vf_pos = args.iter().position(|a| a == "-vf").unwrap();
        assert!(ss_pos < i_pos);
        assert!(i_pos < vf_pos);
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn analysis_command_uses_null_sink() {
        let args = FfmpegCommand::analysis("in.mp4").build_args();
        assert!(!args.contains(&"-y".to_string()));
        let tail: Vec<_> = args.iter().rev().take(3).collect();
        assert_eq!(tail, ["-", "null", "-f"]);
    }

    #[test]
    fn progress_block_emits_snapshot() {
        let mut current = FfmpegProgress::default();
        assert!(matches!(
            parse_progress_line("frame=42", &mut current),
            StderrLine::Consumed
        ));
        assert!(matches!(
            parse_progress_line("out_time_us=1500000", &mut current),
            StderrLine::Consumed
        ));
        assert!(matches!(
            parse_progress_line("speed=2.0x", &mut current),
            StderrLine::Consumed
        ));

        let StderrLine::Snapshot(snap) = parse_progress_line("progress=continue", &mut current)
        else {
            panic!("expected snapshot");
        };
        assert_eq!(snap.frame, 42);
        assert_eq!(snap.out_time_ms, 1500);
        assert!(!snap.is_complete);

        let StderrLine::Snapshot(done) = parse_progress_line("progress=end", &mut current) else {
            panic!("expected snapshot");
        };
        assert!(done.is_complete);
    }

    #[test]
    fn real_stderr_lines_are_not_progress() {
        let mut current = FfmpegProgress::default();
        assert!(matches!(
            parse_progress_line("Error opening input file", &mut current),
            StderrLine::Other
        ));
    }
}
