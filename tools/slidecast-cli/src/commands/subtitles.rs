//! Convert a transcript file into a karaoke ASS document.

use std::path::PathBuf;

use slidecast_common::config::AppConfig;
use slidecast_job_model::transcript::{Transcript, TranscriptFormat};
use slidecast_processing_core::{SegmenterConfig, TranscriptSegmenter};
use slidecast_subtitles::{CueRenderer, SubtitleRenderConfig};

pub fn run(
    transcript: PathBuf,
    output: PathBuf,
    title: Option<String>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&transcript)?;
    let format = transcript
        .extension()
        .and_then(|e| e.to_str())
        .and_then(TranscriptFormat::from_extension);
    let parsed = Transcript::parse(&content, format)?;

    let segmenter = TranscriptSegmenter::new(SegmenterConfig::from(&config.compose));
    let cues = segmenter.segment(&parsed.words);
    if cues.is_empty() {
        return Err(anyhow::anyhow!(
            "{} words produced no cues (minimum group size is {})",
            parsed.len(),
            config.compose.min_group_size
        ));
    }

    let renderer = CueRenderer::new(SubtitleRenderConfig::from_app(config));
    let title = title.map(|t| t.trim().to_uppercase()).filter(|t| !t.is_empty());
    let document = renderer.render(&parsed.words, &cues, title.as_deref());
    document.write_to(&output)?;

    println!("Words: {}", parsed.len());
    println!("Cues: {}", cues.len());
    println!("Events: {}", document.events.len());
    println!("Written: {}", output.display());
    Ok(())
}
