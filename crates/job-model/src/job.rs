//! Job submission contract and run result.
//!
//! A job names its assets by URI (http(s), `file://`, or a plain local
//! path); the pipeline fetches them into a per-job workspace before
//! rendering.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A narrated slideshow to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Caller-unique identifier; keys the workspace and output file.
    pub id: String,

    /// Ordered image URIs, one per scene.
    pub images: Vec<String>,

    /// Display duration of each image in seconds.
    pub durations: Vec<f64>,

    /// Narration track URI.
    #[serde(alias = "voiceUrl")]
    pub voice: String,

    /// Optional background music URI.
    #[serde(default, alias = "bgUrl", skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,

    /// Optional transcript URI (JSON word timings, SRT, VTT, or ASS).
    #[serde(default, alias = "subtitleUrl", skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,

    /// Optional title shown at the start of the video.
    #[serde(default, alias = "titleText", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Job {
    /// Load a job description from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, JobError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| JobError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| JobError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Check the structural rules a job must satisfy before any work starts.
    pub fn validate(&self) -> Result<(), JobError> {
        let invalid = |message: String| Err(JobError::ValidationError { message });

        if self.id.trim().is_empty() {
            return invalid("job id is empty".to_string());
        }
        if self.id.contains(['/', '\\']) || self.id.contains("..") {
            return invalid(format!("job id '{}' must not contain path components", self.id));
        }
        if self.images.is_empty() {
            return invalid("job has no images".to_string());
        }
        if self.images.len() != self.durations.len() {
            return invalid(format!(
                "{} images but {} durations",
                self.images.len(),
                self.durations.len()
            ));
        }
        if let Some((i, d)) = self
            .durations
            .iter()
            .enumerate()
            .find(|(_, d)| !d.is_finite() || **d <= 0.0)
        {
            return invalid(format!("duration #{} is {d}; must be positive", i + 1));
        }
        if self.voice.trim().is_empty() {
            return invalid("voice source is empty".to_string());
        }
        Ok(())
    }

    /// Title as rendered on screen, if one was requested.
    pub fn display_title(&self) -> Option<String> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_uppercase)
    }

    /// Sum of the requested scene durations.
    pub fn total_duration_secs(&self) -> f64 {
        self.durations.iter().sum()
    }
}

/// Stages of a pipeline run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Init,
    ResourcesReady,
    ScenesRendered,
    Concatenated,
    AudioMixed,
    SubtitleApplied,
    Finalized,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ResourcesReady => "resources_ready",
            Self::ScenesRendered => "scenes_rendered",
            Self::Concatenated => "concatenated",
            Self::AudioMixed => "audio_mixed",
            Self::SubtitleApplied => "subtitle_applied",
            Self::Finalized => "finalized",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Error,
}

/// Result handed back to the caller when a run ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stage that was being attempted when the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<PipelineStage>,
    pub elapsed_secs: f64,
    /// Completion time (ISO 8601).
    pub finished_at: String,
}

impl JobResult {
    pub fn success(
        job_id: impl Into<String>,
        output_path: PathBuf,
        elapsed_secs: f64,
        finished_at: String,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Success,
            output_path: Some(output_path),
            error: None,
            failed_stage: None,
            elapsed_secs,
            finished_at,
        }
    }

    pub fn failure(
        job_id: impl Into<String>,
        stage: PipelineStage,
        error: impl Into<String>,
        elapsed_secs: f64,
        finished_at: String,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Error,
            output_path: None,
            error: Some(error.into()),
            failed_stage: Some(stage),
            elapsed_secs,
            finished_at,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }
}

/// Errors that can occur when loading or checking a job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid job: {message}")]
    ValidationError { message: String },
}
