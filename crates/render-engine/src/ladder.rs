//! Subtitle degradation ladder.
//!
//! 1. Synthesize karaoke subtitles from the transcript and burn them in.
//! 2. If that fails, burn the transcript file as-is.
//! 3. If that fails too, keep the video without subtitles.
//!
//! Each step down is logged and recorded as an event. Subtitle failures
//! never fail the run; only cancellation does.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_job_model::transcript::{Transcript, TranscriptFormat};

use crate::commands::{burn_ass_args, burn_subtitles_args};
use crate::pipeline::{PipelineController, PipelineRun};

/// Which rung of the ladder produced the subtitle stage's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SubtitleOutcome {
    Synthesized { cues: usize },
    RawTrack,
    Skipped,
}

impl SubtitleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synthesized { .. } => "synthesized",
            Self::RawTrack => "raw_track",
            Self::Skipped => "skipped",
        }
    }
}

impl PipelineController {
    pub(crate) async fn apply_subtitles(
        &self,
        run: &mut PipelineRun,
        input: &Path,
        transcript: Option<&Path>,
    ) -> SlidecastResult<(PathBuf, SubtitleOutcome)> {
        let Some(transcript) = transcript else {
            tracing::debug!("No transcript supplied, skipping subtitles");
            return Ok((input.to_path_buf(), SubtitleOutcome::Skipped));
        };

        let err = match self.synthesize(run, input, transcript).await {
            Ok((output, cues)) => return Ok((output, SubtitleOutcome::Synthesized { cues })),
            Err(err) => err,
        };
        run.check_cancelled()?;
        self.fall_back(run, "raw_track", &err);

        let err = match self.burn_raw(run, input, transcript).await {
            Ok(output) => return Ok((output, SubtitleOutcome::RawTrack)),
            Err(err) => err,
        };
        run.check_cancelled()?;
        self.fall_back(run, "skipped", &err);

        Ok((input.to_path_buf(), SubtitleOutcome::Skipped))
    }

    async fn synthesize(
        &self,
        run: &mut PipelineRun,
        input: &Path,
        transcript: &Path,
    ) -> SlidecastResult<(PathBuf, usize)> {
        let content = tokio::fs::read_to_string(transcript)
            .await
            .map_err(|e| SlidecastError::subtitle(format!("cannot read transcript: {e}")))?;
        let parsed = Transcript::parse(&content, transcript_format(transcript))
            .map_err(|e| SlidecastError::subtitle(format!("cannot parse transcript: {e}")))?;

        let cues = self.segmenter.segment(&parsed.words);
        if cues.is_empty() {
            return Err(SlidecastError::subtitle("transcript produced no cues"));
        }
        tracing::debug!(words = parsed.len(), cues = cues.len(), "Transcript segmented");

        let document = self.renderer.render(&parsed.words, &cues, None);
        let ass = run.ledger.allocate("subtitles.ass");
        document
            .write_to(&ass)
            .map_err(|e| SlidecastError::subtitle(format!("cannot write subtitle document: {e}")))?;

        let output = run.ledger.allocate("subtitled.mp4");
        let args = burn_ass_args(&self.planner, input, &ass, &output);
        self.encoder
            .invoke(&args, &run.cancel)
            .await
            .map_err(|e| SlidecastError::subtitle(format!("burning synthesized subtitles failed: {e}")))?;
        Ok((output, cues.len()))
    }

    async fn burn_raw(&self, run: &mut PipelineRun, input: &Path, transcript: &Path) -> SlidecastResult<PathBuf> {
        let format = match transcript_format(transcript) {
            Some(format) => Some(format),
            None => tokio::fs::read_to_string(transcript)
                .await
                .ok()
                .and_then(|content| TranscriptFormat::sniff(&content)),
        };
        if !matches!(
            format,
            Some(TranscriptFormat::Srt | TranscriptFormat::Vtt | TranscriptFormat::Ass)
        ) {
            return Err(SlidecastError::subtitle(
                "transcript is not a subtitle track the encoder can burn",
            ));
        }

        let output = run.ledger.allocate("subtitled_raw.mp4");
        let args = burn_subtitles_args(&self.planner, input, transcript, &output);
        self.encoder
            .invoke(&args, &run.cancel)
            .await
            .map_err(|e| SlidecastError::subtitle(format!("burning raw subtitles failed: {e}")))?;
        Ok(output)
    }

    fn fall_back(&self, run: &PipelineRun, to: &str, err: &SlidecastError) {
        tracing::warn!(fallback = to, error = %err, "Subtitle step failed, degrading");
        self.events.record(
            run.job_id(),
            "subtitle_fallback",
            json!({ "to": to, "reason": err.to_string() }),
        );
    }
}

fn transcript_format(path: &Path) -> Option<TranscriptFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(TranscriptFormat::from_extension)
}
