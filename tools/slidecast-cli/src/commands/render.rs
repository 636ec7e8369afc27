//! Run a job through the full pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use slidecast_common::config::AppConfig;
use slidecast_job_model::Job;
use slidecast_render_engine::{
    EventSink, FfmpegEncoder, HttpFetcher, JsonlEventSink, PipelineController, TracingEventSink,
};

pub async fn run(path: PathBuf, config: AppConfig, event_log: bool) -> anyhow::Result<()> {
    let job = Job::load(&path).map_err(|e| anyhow::anyhow!("Failed to load job: {e}"))?;

    println!("Rendering job {} from {}", job.id, path.display());
    println!("  Scenes: {}", job.images.len());
    println!("  Planned length: {:.1}s", job.total_duration_secs());
    println!("  Output dir: {}", config.output_dir.display());

    let encoder = FfmpegEncoder::from_config(&config.pipeline);
    if !encoder.is_available() {
        return Err(anyhow::anyhow!(
            "ffmpeg/ffprobe not found on PATH. Run `slidecast check` for details."
        ));
    }
    let fetcher = HttpFetcher::from_config(&config.pipeline);
    let (events, events_path): (Arc<dyn EventSink>, Option<PathBuf>) = if event_log {
        let sink = JsonlEventSink::new(config.events_dir.clone());
        let path = sink.path_for(&job.id);
        (Arc::new(sink) as Arc<dyn EventSink>, Some(path))
    } else {
        (Arc::new(TracingEventSink) as Arc<dyn EventSink>, None)
    };

    let controller = PipelineController::new(config, Arc::new(encoder), Arc::new(fetcher), events);
    let result = controller.run(&job).await;
    // Flushes the event file.
    drop(controller);

    println!("{}", serde_json::to_string_pretty(&result)?);
    if let Some(path) = events_path {
        println!("Events: {}", path.display());
    }

    match (&result.output_path, &result.error) {
        (Some(output), _) => {
            println!("\nRender complete: {}", output.display());
            Ok(())
        }
        (None, error) => Err(anyhow::anyhow!(
            "Render failed at {}: {}",
            result
                .failed_stage
                .map(|s| s.as_str())
                .unwrap_or("unknown stage"),
            error.as_deref().unwrap_or("unknown error")
        )),
    }
}
