//! Media encoder invocation.
//!
//! Each invocation is an awaitable future carrying a cancellation token.
//! The controller cancels the token when the run's budget expires; the
//! encoder then sends the child a termination signal, waits a short grace
//! period, and kills it if it is still alive.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use slidecast_common::config::PipelineConfig;
use slidecast_common::error::EncoderError;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Captured result of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Something that can run encoder and probe commands.
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    /// Run an encode with the given arguments.
    async fn invoke(
        &self,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<EncoderOutput, EncoderError>;

    /// Run a metadata query and return its standard output.
    async fn probe(&self, args: &[String], cancel: &CancellationToken) -> Result<String, EncoderError>;

    fn name(&self) -> &str;
}

/// Query a media file's container duration in seconds.
pub async fn probe_duration(
    encoder: &dyn MediaEncoder,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<f64, EncoderError> {
    let args = vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        path.display().to_string(),
    ];
    let output = encoder.probe(&args, cancel).await?;
    parse_probe_duration(&output)
}

/// Parse the first numeric line of a duration probe.
pub fn parse_probe_duration(output: &str) -> Result<f64, EncoderError> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| EncoderError::BadProbe {
            output: output.trim().to_string(),
        })
}

/// Arguments prepended to every ffmpeg invocation.
const FFMPEG_GLOBAL_ARGS: [&str; 5] = ["-hide_banner", "-nostdin", "-progress", "pipe:1", "-nostats"];

/// Runs `ffmpeg` and `ffprobe` as child processes.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: String,
    ffprobe: String,
    global_args: Vec<String>,
    timeout: Duration,
    kill_grace: Duration,
}

impl FfmpegEncoder {
    pub fn new(timeout: Duration, kill_grace: Duration) -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            global_args: FFMPEG_GLOBAL_ARGS.iter().map(|s| s.to_string()).collect(),
            timeout,
            kill_grace,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            Duration::from_secs(config.encoder_timeout_secs),
            config.kill_grace(),
        )
    }

    /// Use different binaries (absolute paths or names on `PATH`).
    pub fn with_binaries(mut self, ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self.ffprobe = ffprobe.into();
        self
    }

    /// Replace the arguments prepended to every encode.
    pub fn with_global_args(mut self, args: Vec<String>) -> Self {
        self.global_args = args;
        self
    }

    /// Whether both binaries can be found.
    pub fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg) && command_exists(&self.ffprobe)
    }

    async fn run(
        &self,
        program: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<EncoderOutput, EncoderError> {
        if cancel.is_cancelled() {
            return Err(EncoderError::Cancelled);
        }

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| EncoderError::Spawn {
            program: program.to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(pid = child.id(), program, args = ?args, "Encoder process started");

        // Drain both pipes concurrently so the child never blocks on a full pipe.
        let stdout_task = tokio::spawn(read_progress(child.stdout.take()));
        let stderr_task = tokio::spawn(read_all(child.stderr.take()));

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            _ = tokio::time::sleep(self.timeout) => Outcome::TimedOut,
            _ = cancel.cancelled() => Outcome::Cancelled,
        };

        let status = match outcome {
            Outcome::Exited(status) => status.map_err(|e| EncoderError::Spawn {
                program: program.to_string(),
                message: format!("failed to wait: {e}"),
            })?,
            Outcome::TimedOut => {
                tracing::warn!(program, timeout_secs = self.timeout.as_secs(), "Encoder timed out");
                self.terminate(&mut child).await;
                return Err(EncoderError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
            Outcome::Cancelled => {
                tracing::warn!(program, "Encoder cancelled, terminating");
                self.terminate(&mut child).await;
                return Err(EncoderError::Cancelled);
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(EncoderError::non_zero_exit(status.code(), &stderr));
        }
        Ok(EncoderOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }

    /// SIGTERM, bounded wait, then kill.
    async fn terminate(&self, child: &mut Child) {
        if send_terminate(child)
            && tokio::time::timeout(self.kill_grace, child.wait())
                .await
                .is_ok()
        {
            return;
        }
        if let Err(e) = child.kill().await {
            tracing::warn!(error = %e, "Failed to kill encoder process");
        }
    }
}

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

#[async_trait]
impl MediaEncoder for FfmpegEncoder {
    async fn invoke(
        &self,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<EncoderOutput, EncoderError> {
        let mut full = self.global_args.clone();
        full.extend_from_slice(args);
        self.run(&self.ffmpeg, &full, cancel).await
    }

    async fn probe(&self, args: &[String], cancel: &CancellationToken) -> Result<String, EncoderError> {
        Ok(self.run(&self.ffprobe, args, cancel).await?.stdout)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

#[cfg(unix)]
fn send_terminate(child: &Child) -> bool {
    match child.id() {
        Some(pid) => {
            // SAFETY: signalling a child process we spawned and still own.
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            rc == 0
        }
        None => false,
    }
}

#[cfg(not(unix))]
fn send_terminate(_child: &Child) -> bool {
    false
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let Some(mut reader) = reader else {
        return String::new();
    };
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf).await {
        return format!("<failed to read encoder output: {e}>");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Collect stdout while logging `-progress` updates.
async fn read_progress<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let Some(reader) = reader else {
        return String::new();
    };
    let mut reader = BufReader::new(reader);
    let mut output = String::new();
    let mut state = ProgressState::default();
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Stopped reading encoder stdout");
                break;
            }
        }
        // Non-UTF-8 bytes must not stop the drain while the child still writes.
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches(['\n', '\r']);
        if let Some((key, value)) = line.trim().split_once('=') {
            state.update(key, value);
            if key == "progress" {
                tracing::trace!(out_time_secs = state.out_time_secs, done = state.complete, "Encoder progress");
            }
        }
        output.push_str(line);
        output.push('\n');
    }
    output
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }
}

fn command_exists(binary: &str) -> bool {
    std::process::Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_reader_drains_past_invalid_utf8() {
        let stdout: &[u8] = b"frame=1\n\xff\xfe garbage\r\nout_time_us=2500000\nprogress=end\n";
        let output = read_progress(Some(stdout)).await;
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "frame=1");
        assert!(lines[1].ends_with(" garbage"));
        assert_eq!(lines[3], "progress=end");
    }

    #[test]
    fn test_parse_probe_duration() {
        assert_eq!(parse_probe_duration("12.480000\n").unwrap(), 12.48);
        assert_eq!(parse_probe_duration("\n 3\n").unwrap(), 3.0);
        assert!(matches!(
            parse_probe_duration("N/A"),
            Err(EncoderError::BadProbe { .. })
        ));
    }

    #[test]
    fn test_progress_state() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "2500000");
        state.update("progress", "continue");
        assert!((state.out_time_secs - 2.5).abs() < 1e-9);
        assert!(!state.complete);
        state.update("progress", "end");
        assert!(state.complete);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let encoder = FfmpegEncoder::new(Duration::from_secs(5), Duration::from_millis(100))
            .with_binaries("/nonexistent/slidecast-ffmpeg", "/nonexistent/slidecast-ffprobe");
        let err = encoder
            .invoke(&[], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EncoderError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let encoder = FfmpegEncoder::new(Duration::from_secs(5), Duration::from_millis(100));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = encoder.invoke(&[], &cancel).await.unwrap_err();
        assert_eq!(err, EncoderError::Cancelled);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let encoder = FfmpegEncoder::new(Duration::from_secs(5), Duration::from_millis(100))
            .with_binaries("sh", "sh")
            .with_global_args(Vec::new());
        let args = vec!["-c".to_string(), "echo broken >&2; exit 3".to_string()];
        let err = encoder
            .invoke(&args, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EncoderError::NonZeroExit {
                code: Some(3),
                stderr: "broken".to_string()
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_terminates_child() {
        let encoder = FfmpegEncoder::new(Duration::from_secs(30), Duration::from_millis(500))
            .with_binaries("sleep", "sleep")
            .with_global_args(Vec::new());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = encoder
            .invoke(&["10".to_string()], &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, EncoderError::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invocation_timeout() {
        let encoder = FfmpegEncoder::new(Duration::from_millis(100), Duration::from_millis(500))
            .with_binaries("sleep", "sleep")
            .with_global_args(Vec::new());
        let err = encoder
            .invoke(&["10".to_string()], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EncoderError::Timeout { .. }));
    }
}
