//! Pipeline controller.
//!
//! Drives a job through
//! `Init → ResourcesReady → ScenesRendered → Concatenated → AudioMixed →
//! SubtitleApplied → Finalized`, with `Failed` reachable from every
//! non-terminal stage. A run-wide budget races the whole run; when it
//! expires the cancellation token is tripped, in-flight encoders are
//! terminated and the run fails with a timeout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use slidecast_common::clock::RunClock;
use slidecast_common::config::AppConfig;
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_job_model::job::{Job, JobResult, PipelineStage};
use slidecast_processing_core::scene_plan::ScenePlanConfig;
use slidecast_processing_core::{ScenePlanner, SegmenterConfig, TranscriptSegmenter};
use slidecast_subtitles::{CueRenderer, SubtitleRenderConfig};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::commands::{burn_ass_args, mix_args};
use crate::concat::{strategy_for, ConcatContext, ScenePlanStrategy};
use crate::encoder::MediaEncoder;
use crate::events::EventSink;
use crate::fetcher::{uri_extension, ResourceFetcher};
use crate::ledger::ResourceLedger;

/// Local copies of a job's assets.
#[derive(Debug, Clone)]
pub struct FetchedAssets {
    pub images: Vec<PathBuf>,
    pub voice: PathBuf,
    pub background: Option<PathBuf>,
    pub transcript: Option<PathBuf>,
}

/// State of one run.
pub(crate) struct PipelineRun {
    job_id: String,
    /// Stage currently being attempted; reported if the run fails.
    attempting: PipelineStage,
    pub(crate) ledger: ResourceLedger,
    clock: RunClock,
    pub(crate) cancel: CancellationToken,
}

impl PipelineRun {
    fn new(job_id: &str, ledger: ResourceLedger, clock: RunClock) -> Self {
        Self {
            job_id: job_id.to_string(),
            attempting: PipelineStage::ResourcesReady,
            ledger,
            clock,
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn job_id(&self) -> &str {
        &self.job_id
    }

    pub(crate) fn check_cancelled(&self) -> SlidecastResult<()> {
        if self.cancel.is_cancelled() {
            return Err(SlidecastError::encoder(
                self.attempting.as_str(),
                slidecast_common::error::EncoderError::Cancelled,
            ));
        }
        Ok(())
    }
}

/// Runs jobs end to end.
pub struct PipelineController {
    pub(crate) config: AppConfig,
    pub(crate) encoder: Arc<dyn MediaEncoder>,
    fetcher: Arc<dyn ResourceFetcher>,
    pub(crate) events: Arc<dyn EventSink>,
    strategy: Box<dyn ScenePlanStrategy>,
    pub(crate) planner: ScenePlanner,
    pub(crate) segmenter: TranscriptSegmenter,
    pub(crate) renderer: CueRenderer,
}

impl PipelineController {
    pub fn new(
        config: AppConfig,
        encoder: Arc<dyn MediaEncoder>,
        fetcher: Arc<dyn ResourceFetcher>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let planner = ScenePlanner::new(ScenePlanConfig::from_configs(&config.compose, &config.pipeline));
        let segmenter = TranscriptSegmenter::new(SegmenterConfig::from(&config.compose));
        let renderer = CueRenderer::new(SubtitleRenderConfig::from_app(&config));
        Self {
            strategy: strategy_for(config.compose.concat_strategy),
            config,
            encoder,
            fetcher,
            events,
            planner,
            segmenter,
            renderer,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn planner(&self) -> &ScenePlanner {
        &self.planner
    }

    /// Run a job to a terminal state. Never panics on job errors; the
    /// outcome is always reported through the returned [`JobResult`].
    pub async fn run(&self, job: &Job) -> JobResult {
        let span = tracing::info_span!("job", job_id = %job.id);
        self.run_inner(job).instrument(span).await
    }

    async fn run_inner(&self, job: &Job) -> JobResult {
        let clock = RunClock::start();
        self.events.record(
            &job.id,
            "input",
            serde_json::to_value(job).unwrap_or(serde_json::Value::Null),
        );
        tracing::info!(
            images = job.images.len(),
            background = job.background.is_some(),
            transcript = job.transcript.is_some(),
            title = job.title.is_some(),
            "Starting job"
        );

        if let Err(e) = job.validate() {
            let err = SlidecastError::invalid_job(e.to_string());
            return self.failure(&job.id, PipelineStage::Init, &err, &clock);
        }
        let ledger = match ResourceLedger::create(
            &self.config.workspace_root,
            &job.id,
            self.config.pipeline.cleanup,
        ) {
            Ok(ledger) => ledger,
            Err(e) => return self.failure(&job.id, PipelineStage::Init, &SlidecastError::Io(e), &clock),
        };
        self.record_stage(&job.id, PipelineStage::Init, &clock);

        let mut run = PipelineRun::new(&job.id, ledger, clock);
        // Only a run that beat its budget publishes.
        let outcome = match self.execute_with_budget(job, &mut run).await {
            Ok(finished) => self.publish(&run.job_id, &finished).await,
            Err(err) => Err(err),
        };

        let result = match outcome {
            Ok(output) => {
                self.advance(&mut run, PipelineStage::Finalized, PipelineStage::Finalized);
                tracing::info!(
                    output = %output.display(),
                    elapsed_secs = run.clock.elapsed_secs(),
                    "Job finished"
                );
                self.events.record(
                    &run.job_id,
                    "output",
                    json!({ "path": output, "elapsed_secs": run.clock.elapsed_secs() }),
                );
                JobResult::success(
                    &run.job_id,
                    output,
                    run.clock.elapsed_secs(),
                    slidecast_common::clock::now_rfc3339(),
                )
            }
            Err(err) => self.failure(&run.job_id, run.attempting, &err, &run.clock),
        };

        let PipelineRun { job_id, ledger, .. } = run;
        for warning in ledger.finish() {
            tracing::warn!(%warning, "Cleanup warning");
            self.events.record(
                &job_id,
                "cleanup_warning",
                json!({ "path": warning.path, "message": warning.message }),
            );
        }
        result
    }

    /// Race the run against the budget. Yields the finished video still
    /// inside the workspace; anything the run produces after the budget
    /// expired is discarded with the workspace.
    async fn execute_with_budget(&self, job: &Job, run: &mut PipelineRun) -> SlidecastResult<PathBuf> {
        let budget = self.config.pipeline.run_timeout();
        let grace = self.config.pipeline.kill_grace();
        let cancel = run.cancel.clone();

        let fut = self.execute(job, run);
        tokio::pin!(fut);

        let finished = tokio::select! {
            res = &mut fut => Some(res),
            _ = tokio::time::sleep(budget) => None,
        };
        match finished {
            Some(res) => res,
            None => {
                tracing::error!(budget_secs = budget.as_secs_f64(), "Run exceeded its time budget, cancelling");
                cancel.cancel();
                if tokio::time::timeout(grace, &mut fut).await.is_err() {
                    tracing::warn!("In-flight stage did not stop within the grace period");
                }
                Err(SlidecastError::Timeout {
                    budget_secs: budget.as_secs_f64(),
                })
            }
        }
    }

    async fn execute(&self, job: &Job, run: &mut PipelineRun) -> SlidecastResult<PathBuf> {
        let assets = self.fetch_assets(job, run).await?;
        self.advance(run, PipelineStage::ResourcesReady, PipelineStage::ScenesRendered);

        let scenes = self
            .planner
            .plan_scenes(&assets.images, &job.durations)
            .map_err(|e| SlidecastError::invalid_job(e.to_string()))?;
        let mut clips = Vec::with_capacity(scenes.len());
        for scene in &scenes {
            run.check_cancelled()?;
            let clip = run.ledger.allocate(&format!("scene_{:03}.mp4", scene.index));
            tracing::debug!(scene = scene.index, variant = scene.variant.name(), frames = scene.frames, "Rendering scene");
            let args = self.planner.scene_encode_args(scene, &clip);
            self.encoder
                .invoke(&args, &run.cancel)
                .await
                .map_err(|e| SlidecastError::encoder(PipelineStage::ScenesRendered.as_str(), e))?;
            clips.push(clip);
        }
        self.advance(run, PipelineStage::ScenesRendered, PipelineStage::Concatenated);

        run.check_cancelled()?;
        let concatenated = {
            let mut ctx = ConcatContext {
                planner: &self.planner,
                scenes: &scenes,
                encoder: self.encoder.as_ref(),
                ledger: &mut run.ledger,
                cancel: &run.cancel,
            };
            self.strategy.concatenate(&mut ctx, &clips).await?
        };
        tracing::debug!(strategy = self.strategy.name(), clips = clips.len(), "Scenes concatenated");
        self.advance(run, PipelineStage::Concatenated, PipelineStage::AudioMixed);

        run.check_cancelled()?;
        let mixed = run.ledger.allocate("mixed.mp4");
        let args = mix_args(
            &concatenated,
            &assets.voice,
            assets.background.as_deref(),
            &mixed,
            &self.config.audio,
        );
        self.encoder
            .invoke(&args, &run.cancel)
            .await
            .map_err(|e| SlidecastError::encoder(PipelineStage::AudioMixed.as_str(), e))?;
        self.advance(run, PipelineStage::AudioMixed, PipelineStage::SubtitleApplied);

        let (subtitled, outcome) = self
            .apply_subtitles(run, &mixed, assets.transcript.as_deref())
            .await?;
        tracing::info!(subtitles = outcome.as_str(), "Subtitle stage complete");
        self.advance(run, PipelineStage::SubtitleApplied, PipelineStage::Finalized);

        let finished = match job.display_title() {
            Some(title) => self.apply_title(run, &subtitled, &title).await?,
            None => subtitled,
        };
        run.check_cancelled()?;
        Ok(finished)
    }

    async fn fetch_assets(&self, job: &Job, run: &mut PipelineRun) -> SlidecastResult<FetchedAssets> {
        let mut plan: Vec<(String, PathBuf)> = Vec::new();
        let mut reserve = |uri: &str, stem: String, fallback_ext: &str| {
            let ext = uri_extension(uri).unwrap_or_else(|| fallback_ext.to_string());
            let dest = run.ledger.allocate(&format!("{stem}.{ext}"));
            plan.push((uri.to_string(), dest.clone()));
            dest
        };

        let images: Vec<PathBuf> = job
            .images
            .iter()
            .enumerate()
            .map(|(i, uri)| reserve(uri, format!("image_{:03}", i + 1), "jpg"))
            .collect();
        let voice = reserve(&job.voice, "voice".to_string(), "mp3");
        let background = job
            .background
            .as_deref()
            .map(|uri| reserve(uri, "background".to_string(), "mp3"));
        let transcript = job
            .transcript
            .as_deref()
            .map(|uri| reserve(uri, "transcript".to_string(), "txt"));

        let fetches = plan.iter().map(|(uri, dest)| async move {
            self.fetcher
                .fetch(uri, dest)
                .await
                .map_err(|e| SlidecastError::asset_fetch(uri.clone(), e))
        });
        let fetched = futures::future::try_join_all(fetches).await?;
        tracing::info!(assets = fetched.len(), "Assets fetched");

        Ok(FetchedAssets {
            images,
            voice,
            background,
            transcript,
        })
    }

    /// Overlay the title decoration. Failure here is fatal.
    async fn apply_title(&self, run: &mut PipelineRun, input: &Path, title: &str) -> SlidecastResult<PathBuf> {
        run.check_cancelled()?;
        let ass = run.ledger.allocate("title.ass");
        self.renderer
            .render_title_document(title)
            .write_to(&ass)
            .map_err(|e| SlidecastError::subtitle(format!("failed to write title document: {e}")))?;
        let output = run.ledger.allocate("titled.mp4");
        let args = burn_ass_args(&self.planner, input, &ass, &output);
        self.encoder
            .invoke(&args, &run.cancel)
            .await
            .map_err(|e| SlidecastError::encoder("title", e))?;
        tracing::debug!(title, "Title applied");
        Ok(output)
    }

    /// Move the finished video to `<output_dir>/output_<id>.mp4`.
    async fn publish(&self, job_id: &str, finished: &Path) -> SlidecastResult<PathBuf> {
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let dest = self.config.output_dir.join(format!("output_{job_id}.mp4"));
        if tokio::fs::rename(finished, &dest).await.is_err() {
            // Different filesystem; copy instead.
            tokio::fs::copy(finished, &dest).await?;
        }
        Ok(dest)
    }

    fn advance(&self, run: &mut PipelineRun, reached: PipelineStage, next: PipelineStage) {
        run.attempting = next;
        self.record_stage(&run.job_id, reached, &run.clock);
    }

    fn record_stage(&self, job_id: &str, stage: PipelineStage, clock: &RunClock) {
        tracing::info!(stage = stage.as_str(), elapsed_secs = clock.elapsed_secs(), "Stage reached");
        self.events.record(
            job_id,
            stage.as_str(),
            json!({ "elapsed_secs": clock.elapsed_secs() }),
        );
    }

    fn failure(&self, job_id: &str, stage: PipelineStage, err: &SlidecastError, clock: &RunClock) -> JobResult {
        tracing::error!(stage = stage.as_str(), error = %err, "Job failed");
        self.events.record(
            job_id,
            "error",
            json!({ "stage": stage.as_str(), "message": err.to_string() }),
        );
        JobResult::failure(
            job_id,
            stage,
            err.to_string(),
            clock.elapsed_secs(),
            slidecast_common::clock::now_rfc3339(),
        )
    }
}
