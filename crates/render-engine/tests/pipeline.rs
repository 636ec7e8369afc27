//! End-to-end pipeline runs against a scripted encoder and an in-memory
//! fetcher. No external binaries are needed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use slidecast_common::config::{AppConfig, ConcatStrategyKind};
use slidecast_common::error::{EncoderError, FetchError};
use slidecast_job_model::job::{Job, JobStatus, PipelineStage};
use slidecast_render_engine::{
    EncoderOutput, MediaEncoder, MemoryEventSink, PipelineController, ResourceFetcher,
};
use tokio_util::sync::CancellationToken;

/// Writes the last argument as the output file, or fails/hangs when an
/// argument contains a configured pattern.
#[derive(Default)]
struct ScriptedEncoder {
    calls: Mutex<Vec<Vec<String>>>,
    probes: AtomicUsize,
    fail_on: Vec<&'static str>,
    hang_on: Option<&'static str>,
    /// Ignores cancellation and completes after the delay.
    slow_on: Option<(&'static str, Duration)>,
    terminated: AtomicBool,
}

impl ScriptedEncoder {
    fn failing_on(patterns: &[&'static str]) -> Self {
        Self {
            fail_on: patterns.to_vec(),
            ..Self::default()
        }
    }

    fn hanging_on(pattern: &'static str) -> Self {
        Self {
            hang_on: Some(pattern),
            ..Self::default()
        }
    }

    fn slow_on(pattern: &'static str, delay: Duration) -> Self {
        Self {
            slow_on: Some((pattern, delay)),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_containing(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|args| args.iter().any(|a| a.contains(needle)))
            .count()
    }
}

#[async_trait]
impl MediaEncoder for ScriptedEncoder {
    async fn invoke(
        &self,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<EncoderOutput, EncoderError> {
        self.calls.lock().unwrap().push(args.to_vec());
        let joined = args.join(" ");

        if let Some(pattern) = self.hang_on {
            if joined.contains(pattern) {
                cancel.cancelled().await;
                self.terminated.store(true, Ordering::SeqCst);
                return Err(EncoderError::Cancelled);
            }
        }
        if let Some((pattern, delay)) = self.slow_on {
            if joined.contains(pattern) {
                tokio::time::sleep(delay).await;
            }
        }
        if self.fail_on.iter().any(|p| joined.contains(p)) {
            return Err(EncoderError::non_zero_exit(Some(1), "scripted failure"));
        }
        if let Some(output) = args.last() {
            std::fs::write(output, b"video").unwrap();
        }
        Ok(EncoderOutput::default())
    }

    async fn probe(&self, _args: &[String], _cancel: &CancellationToken) -> Result<String, EncoderError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok("5.000000\n".to_string())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Serves fixed bytes per URI.
struct MapFetcher {
    contents: HashMap<String, Vec<u8>>,
}

impl MapFetcher {
    fn for_job(job: &Job, transcript: Option<&str>) -> Self {
        let mut contents = HashMap::new();
        for image in &job.images {
            contents.insert(image.clone(), b"jpeg".to_vec());
        }
        contents.insert(job.voice.clone(), b"mp3".to_vec());
        if let Some(bg) = &job.background {
            contents.insert(bg.clone(), b"mp3".to_vec());
        }
        if let (Some(uri), Some(body)) = (&job.transcript, transcript) {
            contents.insert(uri.clone(), body.as_bytes().to_vec());
        }
        Self { contents }
    }

    fn without(mut self, uri: &str) -> Self {
        self.contents.remove(uri);
        self
    }
}

#[async_trait]
impl ResourceFetcher for MapFetcher {
    async fn fetch(&self, uri: &str, dest: &Path) -> Result<PathBuf, FetchError> {
        let body = self
            .contents
            .get(uri)
            .ok_or_else(|| FetchError::NotFound(uri.to_string()))?;
        std::fs::write(dest, body).map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(dest.to_path_buf())
    }
}

const WORDS_JSON: &str = r#"[
  {"word": "Welcome", "start": 0.0, "end": 0.4},
  {"word": "to", "start": 0.45, "end": 0.6},
  {"word": "the", "start": 0.62, "end": 0.75},
  {"word": "quarterly", "start": 0.8, "end": 1.3},
  {"word": "review", "start": 1.35, "end": 1.8},
  {"word": "deck", "start": 1.85, "end": 2.2}
]"#;

const TRACK_SRT: &str = "1\n00:00:00,000 --> 00:00:02,000\nwelcome to the review\n";

fn job(transcript: Option<&str>) -> Job {
    Job {
        id: "t1".to_string(),
        images: vec![
            "img/1.jpg".to_string(),
            "img/2.jpg".to_string(),
            "img/3.jpg".to_string(),
        ],
        durations: vec![2.0, 3.0, 1.5],
        voice: "audio/voice.mp3".to_string(),
        background: None,
        transcript: transcript.map(str::to_string),
        title: None,
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    config: AppConfig,
    encoder: Arc<ScriptedEncoder>,
    events: Arc<MemoryEventSink>,
}

impl Harness {
    fn new(encoder: ScriptedEncoder) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.workspace_root = dir.path().join("work");
        config.output_dir = dir.path().join("out");
        config.events_dir = dir.path().join("events");
        config.pipeline.run_timeout_secs = 30.0;
        config.pipeline.kill_grace_ms = 1000;
        Self {
            _dir: dir,
            config,
            encoder: Arc::new(encoder),
            events: Arc::new(MemoryEventSink::new()),
        }
    }

    fn controller(&self, fetcher: MapFetcher) -> PipelineController {
        PipelineController::new(
            self.config.clone(),
            self.encoder.clone(),
            Arc::new(fetcher),
            self.events.clone(),
        )
    }

    fn workspace(&self, job: &Job) -> PathBuf {
        self.config.workspace_root.join(format!("job_{}", job.id))
    }

    fn fallbacks(&self) -> usize {
        self.events
            .stages()
            .iter()
            .filter(|s| *s == "subtitle_fallback")
            .count()
    }
}

#[tokio::test]
async fn test_successful_run_reaches_finalized() {
    let harness = Harness::new(ScriptedEncoder::default());
    let job = job(Some("subs/words.json"));
    let fetcher = MapFetcher::for_job(&job, Some(WORDS_JSON));

    let result = harness.controller(fetcher).run(&job).await;

    assert!(result.is_success(), "{:?}", result.error);
    let output = result.output_path.unwrap();
    assert_eq!(output, harness.config.output_dir.join("output_t1.mp4"));
    assert!(output.exists());
    assert!(!harness.workspace(&job).exists());

    let stages = harness.events.stages();
    let expected = [
        "input",
        "init",
        "resources_ready",
        "scenes_rendered",
        "concatenated",
        "audio_mixed",
        "subtitle_applied",
        "finalized",
        "output",
    ];
    assert_eq!(stages, expected);

    // 3 scenes, 2 pairwise joins, mix, subtitle burn.
    assert_eq!(harness.encoder.calls().len(), 7);
    assert_eq!(harness.encoder.probes.load(Ordering::SeqCst), 2);
    assert_eq!(harness.encoder.calls_containing("ass="), 1);
}

#[tokio::test]
async fn test_unparseable_transcript_still_succeeds_without_subtitles() {
    let harness = Harness::new(ScriptedEncoder::default());
    let job = job(Some("subs/words.json"));
    let fetcher = MapFetcher::for_job(&job, Some("{not json"));

    let result = harness.controller(fetcher).run(&job).await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(harness.fallbacks(), 2);
    assert_eq!(harness.encoder.calls_containing("ass="), 0);
    assert_eq!(harness.encoder.calls_containing("subtitles="), 0);
}

#[tokio::test]
async fn test_malformed_srt_burns_raw_track() {
    let harness = Harness::new(ScriptedEncoder::default());
    let job = job(Some("subs/track.srt"));
    let fetcher = MapFetcher::for_job(&job, Some("this is not a subtitle file"));

    let result = harness.controller(fetcher).run(&job).await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(harness.fallbacks(), 1);
    assert_eq!(harness.encoder.calls_containing("subtitles="), 1);
}

#[tokio::test]
async fn test_failed_synthesized_burn_degrades_to_raw_track() {
    let harness = Harness::new(ScriptedEncoder::failing_on(&["ass="]));
    let job = job(Some("subs/track.srt"));
    let fetcher = MapFetcher::for_job(&job, Some(TRACK_SRT));

    let result = harness.controller(fetcher).run(&job).await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(harness.fallbacks(), 1);
    assert_eq!(harness.encoder.calls_containing("ass="), 1);
    assert_eq!(harness.encoder.calls_containing("subtitles="), 1);
}

#[tokio::test]
async fn test_every_subtitle_step_failing_still_succeeds() {
    let harness = Harness::new(ScriptedEncoder::failing_on(&["ass=", "subtitles="]));
    let job = job(Some("subs/track.srt"));
    let fetcher = MapFetcher::for_job(&job, Some(TRACK_SRT));

    let result = harness.controller(fetcher).run(&job).await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(harness.fallbacks(), 2);
    assert!(result.output_path.unwrap().exists());
}

#[tokio::test]
async fn test_scene_failure_is_fatal() {
    let harness = Harness::new(ScriptedEncoder::failing_on(&["image_002"]));
    let job = job(None);
    let fetcher = MapFetcher::for_job(&job, None);

    let result = harness.controller(fetcher).run(&job).await;

    assert_eq!(result.status, JobStatus::Error);
    assert_eq!(result.failed_stage, Some(PipelineStage::ScenesRendered));
    assert!(result.error.unwrap().contains("scripted failure"));
    assert!(!harness.config.output_dir.join("output_t1.mp4").exists());
    assert!(!harness.workspace(&job).exists());
    assert_eq!(harness.events.stages().last().unwrap(), "error");
}

#[tokio::test]
async fn test_missing_asset_fails_fetch() {
    let harness = Harness::new(ScriptedEncoder::default());
    let job = job(None);
    let fetcher = MapFetcher::for_job(&job, None).without("audio/voice.mp3");

    let result = harness.controller(fetcher).run(&job).await;

    assert_eq!(result.failed_stage, Some(PipelineStage::ResourcesReady));
    assert!(result.error.unwrap().contains("audio/voice.mp3"));
    assert!(harness.encoder.calls().is_empty());
    assert!(!harness.workspace(&job).exists());
}

#[tokio::test]
async fn test_invalid_job_fails_at_init() {
    let harness = Harness::new(ScriptedEncoder::default());
    let mut job = job(None);
    job.durations.pop();
    let fetcher = MapFetcher::for_job(&job, None);

    let result = harness.controller(fetcher).run(&job).await;

    assert_eq!(result.failed_stage, Some(PipelineStage::Init));
    assert!(result.error.unwrap().contains("3 images but 2 durations"));
    assert!(!harness.workspace(&job).exists());
}

#[tokio::test]
async fn test_timeout_terminates_encoder_and_cleans_up() {
    let mut harness = Harness::new(ScriptedEncoder::hanging_on("image_002"));
    harness.config.pipeline.run_timeout_secs = 0.3;
    let job = job(None);
    let fetcher = MapFetcher::for_job(&job, None);

    let started = std::time::Instant::now();
    let result = harness.controller(fetcher).run(&job).await;

    assert_eq!(result.status, JobStatus::Error);
    assert_eq!(result.failed_stage, Some(PipelineStage::ScenesRendered));
    assert!(result.error.unwrap().contains("time budget"));
    assert!(harness.encoder.terminated.load(Ordering::SeqCst));
    assert!(!harness.workspace(&job).exists());
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[tokio::test]
async fn test_stage_finishing_inside_grace_period_publishes_nothing() {
    let mut harness = Harness::new(ScriptedEncoder::slow_on(
        "dynaudnorm",
        Duration::from_millis(400),
    ));
    harness.config.pipeline.run_timeout_secs = 0.2;
    harness.config.pipeline.kill_grace_ms = 2000;
    let job = job(None);
    let fetcher = MapFetcher::for_job(&job, None);

    let result = harness.controller(fetcher).run(&job).await;

    assert_eq!(result.status, JobStatus::Error);
    assert_eq!(result.failed_stage, Some(PipelineStage::AudioMixed));
    assert!(result.output_path.is_none());
    assert!(!harness.config.output_dir.join("output_t1.mp4").exists());
    assert!(!harness.workspace(&job).exists());
    assert!(!harness.events.stages().contains(&"output".to_string()));
}

#[tokio::test]
async fn test_cleanup_disabled_keeps_workspace() {
    let mut harness = Harness::new(ScriptedEncoder::default());
    harness.config.pipeline.cleanup = false;
    let job = job(None);
    let fetcher = MapFetcher::for_job(&job, None);

    let result = harness.controller(fetcher).run(&job).await;

    assert!(result.is_success());
    assert!(harness.workspace(&job).join("scene_001.mp4").exists());
}

#[tokio::test]
async fn test_title_is_burned_after_subtitles() {
    let harness = Harness::new(ScriptedEncoder::default());
    let mut job = job(None);
    job.title = Some("quarterly review".to_string());
    let fetcher = MapFetcher::for_job(&job, None);

    let result = harness.controller(fetcher).run(&job).await;

    assert!(result.is_success(), "{:?}", result.error);
    let calls = harness.encoder.calls();
    assert!(calls.last().unwrap().iter().any(|a| a.contains("title.ass")));
}

#[tokio::test]
async fn test_title_failure_is_fatal() {
    let harness = Harness::new(ScriptedEncoder::failing_on(&["title.ass"]));
    let mut job = job(None);
    job.title = Some("quarterly review".to_string());
    let fetcher = MapFetcher::for_job(&job, None);

    let result = harness.controller(fetcher).run(&job).await;

    assert_eq!(result.failed_stage, Some(PipelineStage::Finalized));
}

#[tokio::test]
async fn test_background_music_is_ducked_into_mix() {
    let harness = Harness::new(ScriptedEncoder::default());
    let mut job = job(None);
    job.background = Some("audio/bed.mp3".to_string());
    let fetcher = MapFetcher::for_job(&job, None);

    let result = harness.controller(fetcher).run(&job).await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(harness.encoder.calls_containing("sidechaincompress"), 1);
}

#[tokio::test]
async fn test_cumulative_strategy_joins_in_one_pass() {
    let mut harness = Harness::new(ScriptedEncoder::default());
    harness.config.compose.concat_strategy = ConcatStrategyKind::Cumulative;
    let job = job(None);
    let fetcher = MapFetcher::for_job(&job, None);

    let result = harness.controller(fetcher).run(&job).await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(harness.encoder.calls_containing("xfade"), 1);
    assert_eq!(harness.encoder.probes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_single_image_needs_no_join() {
    let harness = Harness::new(ScriptedEncoder::default());
    let mut job = job(None);
    job.images.truncate(1);
    job.durations.truncate(1);
    let fetcher = MapFetcher::for_job(&job, None);

    let result = harness.controller(fetcher).run(&job).await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(harness.encoder.calls_containing("xfade"), 0);
    // Scene, then mix.
    assert_eq!(harness.encoder.calls().len(), 2);
}
