//! Error types shared across slidecast crates.

use std::path::PathBuf;

/// Top-level error type for slidecast operations.
#[derive(Debug, thiserror::Error)]
pub enum SlidecastError {
    #[error("Asset fetch failed for {uri}: {source}")]
    AssetFetch {
        uri: String,
        #[source]
        source: FetchError,
    },

    #[error("Encoder invocation failed during {stage}: {source}")]
    EncoderInvocation {
        stage: String,
        #[source]
        source: EncoderError,
    },

    #[error("Subtitle synthesis error: {message}")]
    SubtitleSynthesis { message: String },

    #[error("Run exceeded its time budget of {budget_secs:.1}s")]
    Timeout { budget_secs: f64 },

    #[error("Invalid job: {message}")]
    InvalidJob { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SlidecastError.
pub type SlidecastResult<T> = Result<T, SlidecastError>;

impl SlidecastError {
    pub fn asset_fetch(uri: impl Into<String>, source: FetchError) -> Self {
        Self::AssetFetch {
            uri: uri.into(),
            source,
        }
    }

    pub fn encoder(stage: impl Into<String>, source: EncoderError) -> Self {
        Self::EncoderInvocation {
            stage: stage.into(),
            source,
        }
    }

    pub fn subtitle(msg: impl Into<String>) -> Self {
        Self::SubtitleSynthesis {
            message: msg.into(),
        }
    }

    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}

/// Failure reported by a resource fetcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// A missing resource will not appear on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

/// Failure reported by a media encoder invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncoderError {
    #[error("exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("killed after {secs}s")]
    Timeout { secs: u64 },

    #[error("terminated by cancellation")]
    Cancelled,

    #[error("unreadable probe output: {output:?}")]
    BadProbe { output: String },
}

impl EncoderError {
    /// Keep only the tail of a long stderr transcript.
    pub fn non_zero_exit(code: Option<i32>, stderr: &str) -> Self {
        const MAX_STDERR_CHARS: usize = 2000;
        let trimmed = stderr.trim();
        let count = trimmed.chars().count();
        let stderr = if count > MAX_STDERR_CHARS {
            trimmed.chars().skip(count - MAX_STDERR_CHARS).collect()
        } else {
            trimmed.to_string()
        };
        Self::NonZeroExit { code, stderr }
    }
}

/// Non-fatal problem found while removing a run's transient files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceCleanupWarning {
    pub path: PathBuf,
    pub message: String,
}

impl std::fmt::Display for ResourceCleanupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cleanup of {} failed: {}", self.path.display(), self.message)
    }
}
