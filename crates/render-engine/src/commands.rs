//! Encoder argument builders for the audio and subtitle stages.

use std::path::Path;

use slidecast_common::config::AudioMixConfig;
use slidecast_processing_core::ScenePlanner;

/// Arguments that lay narration (and optionally ducked background music)
/// under the concatenated video. Video is stream-copied.
pub fn mix_args(
    video: &Path,
    voice: &Path,
    background: Option<&Path>,
    output: &Path,
    config: &AudioMixConfig,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        video.display().to_string(),
        "-i".to_string(),
        voice.display().to_string(),
    ];
    if let Some(bg) = background {
        args.push("-i".to_string());
        args.push(bg.display().to_string());
    }
    args.push("-filter_complex".to_string());
    args.push(audio_graph(background.is_some(), config));
    args.extend(
        [
            "-map", "0:v", "-map", "[aout]", "-c:v", "copy", "-c:a",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(config.codec.clone());
    args.push("-b:a".to_string());
    args.push(config.bitrate.clone());
    args.push(output.display().to_string());
    args
}

/// Audio `filter_complex`. With background music the voice keys a
/// sidechain compressor on the music before both are mixed.
pub fn audio_graph(with_background: bool, config: &AudioMixConfig) -> String {
    if !with_background {
        return format!(
            "[1:a]volume={v}[voice];[voice]dynaudnorm=f={n}[aout]",
            v = config.voice_volume,
            n = config.normalize_frame_ms,
        );
    }
    format!(
        "[1:a]volume={v},asplit=2[voice][key];\
         [2:a]volume={b},afade=t=in:st=0:d={fade}[bg];\
         [bg][key]sidechaincompress=threshold={th}:ratio={ratio}:attack={attack}:release={release}[ducked];\
         [voice][ducked]amix=inputs=2:duration=first:dropout_transition=2,dynaudnorm=f={n}[aout]",
        v = config.voice_volume,
        b = config.background_volume,
        fade = config.background_fade_in_secs,
        th = config.duck_threshold,
        ratio = config.duck_ratio,
        attack = config.duck_attack_ms,
        release = config.duck_release_ms,
        n = config.normalize_frame_ms,
    )
}

/// Burn a synthesized ASS document into the video.
pub fn burn_ass_args(planner: &ScenePlanner, input: &Path, ass: &Path, output: &Path) -> Vec<String> {
    burn_args(planner, input, format!("ass={}", filter_path(ass)), output)
}

/// Burn a transcript file through the generic subtitles filter, which
/// reads SRT, WebVTT and ASS directly.
pub fn burn_subtitles_args(
    planner: &ScenePlanner,
    input: &Path,
    subtitles: &Path,
    output: &Path,
) -> Vec<String> {
    burn_args(planner, input, format!("subtitles={}", filter_path(subtitles)), output)
}

fn burn_args(planner: &ScenePlanner, input: &Path, filter: String, output: &Path) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.display().to_string(),
        "-vf".to_string(),
        filter,
    ];
    args.extend(planner.video_codec_args());
    args.push("-c:a".to_string());
    args.push("copy".to_string());
    args.push(output.display().to_string());
    args
}

/// Escape a path for use as a filter option value.
pub fn filter_path(path: &Path) -> String {
    let raw = path.display().to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | ':' | '\'' | ',' | ';' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
