//! Application configuration.

use crate::error::{SlidecastError, SlidecastResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root under which per-job workspaces are created.
    pub workspace_root: PathBuf,

    /// Directory receiving finished videos.
    pub output_dir: PathBuf,

    /// Directory receiving per-job event logs.
    pub events_dir: PathBuf,

    /// Scene, transition and subtitle layout parameters.
    pub compose: ComposeConfig,

    /// Voice/background mix parameters.
    pub audio: AudioMixConfig,

    /// Subtitle look.
    pub subtitles: SubtitleStyleConfig,

    /// Timeouts, retries and cleanup.
    pub pipeline: PipelineConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// How the running concatenation's join offsets are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcatStrategyKind {
    /// Probe the running concatenation after each join.
    Probed,
    /// Sum scene durations minus transitions, one encoder pass.
    Cumulative,
}

/// Composition parameters threaded through the segmenter, scene planner
/// and cue renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    pub frame_rate: u32,
    /// Encoder speed preset (e.g. "medium").
    pub preset: String,
    /// Constant rate factor; lower is better.
    pub quality: u32,
    pub width: u32,
    pub height: u32,
    /// Upper bound of the Ken Burns zoom factor.
    pub max_zoom: f64,
    /// Zoom increment per frame for the zoom variants.
    pub zoom_speed: f64,
    /// Named xfade styles used round-robin between scenes.
    pub transition_palette: Vec<String>,
    /// Cross-fade length in seconds.
    pub transition_duration: f64,
    pub concat_strategy: ConcatStrategyKind,
    /// Inter-word silence (seconds) that starts a new cue.
    pub pause_threshold: f64,
    pub min_group_size: usize,
    pub max_group_size: usize,
    pub max_chars_per_line: usize,
    pub max_lines: usize,
    /// Tokens longer than this are split into chunks of this many chars.
    pub long_token_threshold: usize,
}

/// Voice and background mixing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioMixConfig {
    pub voice_volume: f64,
    /// Background level relative to the voice.
    pub background_volume: f64,
    pub background_fade_in_secs: f64,
    pub duck_threshold: f64,
    pub duck_ratio: f64,
    pub duck_attack_ms: u32,
    pub duck_release_ms: u32,
    /// dynaudnorm frame length in milliseconds.
    pub normalize_frame_ms: u32,
    pub codec: String,
    pub bitrate: String,
}

/// Fonts and colours of the burned-in subtitles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleStyleConfig {
    pub font_name: String,
    pub font_size: u32,
    /// Base text colour, ASS `&HBBGGRR&` form.
    pub text_color: String,
    pub outline_color: String,
    /// Karaoke highlight fill.
    pub highlight_color: String,
    /// Karaoke highlight glow.
    pub glow_color: String,
    pub margin_v: u32,
    pub title_font_name: String,
    pub title_font_size: u32,
    /// Gradient colours, top to bottom.
    pub title_colors: (String, String),
    pub title_panel_color: String,
    pub title_glow_color: String,
}

/// Timeouts, retries, and workspace lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Budget for the whole run.
    pub run_timeout_secs: f64,
    /// Budget for one encoder invocation.
    pub encoder_timeout_secs: u64,
    /// Budget for one fetch attempt.
    pub fetch_timeout_secs: u64,
    pub fetch_attempts: u32,
    /// Linear backoff unit between fetch attempts.
    pub fetch_backoff_ms: u64,
    /// Remove the job workspace when the run ends.
    pub cleanup: bool,
    pub title_duration_secs: f64,
    /// Dwell added to the final scene.
    pub end_pad_secs: f64,
    /// How long a cancelled encoder may take to exit.
    pub kill_grace_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "slidecast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

/// Cross-fade styles understood by ffmpeg's `xfade` filter.
pub const DEFAULT_TRANSITIONS: [&str; 20] = [
    "fade",
    "wipeleft",
    "slideup",
    "circleopen",
    "dissolve",
    "smoothleft",
    "radial",
    "fadeblack",
    "wiperight",
    "slidedown",
    "circleclose",
    "diagtl",
    "smoothright",
    "rectcrop",
    "fadewhite",
    "slideleft",
    "hlslice",
    "vuslice",
    "pixelize",
    "distance",
];

impl Default for AppConfig {
    fn default() -> Self {
        let data = data_dir();
        Self {
            workspace_root: PathBuf::from("temp"),
            output_dir: data.join("output"),
            events_dir: data.join("events"),
            compose: ComposeConfig::default(),
            audio: AudioMixConfig::default(),
            subtitles: SubtitleStyleConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            preset: "medium".to_string(),
            quality: 23,
            width: 1920,
            height: 1080,
            max_zoom: 1.2,
            zoom_speed: 0.0015,
            transition_palette: DEFAULT_TRANSITIONS.iter().map(|s| s.to_string()).collect(),
            transition_duration: 0.5,
            concat_strategy: ConcatStrategyKind::Probed,
            pause_threshold: 0.7,
            min_group_size: 3,
            max_group_size: 8,
            max_chars_per_line: 42,
            max_lines: 2,
            long_token_threshold: 16,
        }
    }
}

impl Default for AudioMixConfig {
    fn default() -> Self {
        Self {
            voice_volume: 1.0,
            background_volume: 0.12,
            background_fade_in_secs: 2.0,
            duck_threshold: 0.05,
            duck_ratio: 8.0,
            duck_attack_ms: 20,
            duck_release_ms: 400,
            normalize_frame_ms: 150,
            codec: "aac".to_string(),
            bitrate: "128k".to_string(),
        }
    }
}

impl Default for SubtitleStyleConfig {
    fn default() -> Self {
        Self {
            font_name: "Arial".to_string(),
            font_size: 64,
            text_color: "&HFFFFFF&".to_string(),
            outline_color: "&H000000&".to_string(),
            highlight_color: "&H00E4FF&".to_string(),
            glow_color: "&H0080FF&".to_string(),
            margin_v: 90,
            title_font_name: "Bungee Spice".to_string(),
            title_font_size: 96,
            title_colors: ("&H00D7FF&".to_string(), "&H0045FF&".to_string()),
            title_panel_color: "&H201010&".to_string(),
            title_glow_color: "&H00A5FF&".to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            run_timeout_secs: 30.0 * 60.0,
            encoder_timeout_secs: 20 * 60,
            fetch_timeout_secs: 5 * 60,
            fetch_attempts: 3,
            fetch_backoff_ms: 1000,
            cleanup: true,
            title_duration_secs: 8.0,
            end_pad_secs: 2.0,
            kill_grace_ms: 3000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl PipelineConfig {
    /// Run budget. Values too large for a `Duration` saturate; NaN and
    /// negatives become zero.
    pub fn run_timeout(&self) -> Duration {
        if self.run_timeout_secs.is_nan() {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.run_timeout_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %config_path.display(), error = %e, "Ignoring config file");
                }
            }
        }
        Self::default()
    }

    /// Load and validate config from an explicit path.
    pub fn load_from(path: &Path) -> SlidecastResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SlidecastError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            SlidecastError::config(format!("cannot parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> SlidecastResult<()> {
        let c = &self.compose;
        if c.frame_rate == 0 || c.width == 0 || c.height == 0 {
            return Err(SlidecastError::config(
                "frame_rate, width and height must be positive",
            ));
        }
        if c.max_zoom < 1.0 || c.zoom_speed <= 0.0 {
            return Err(SlidecastError::config(
                "max_zoom must be >= 1 and zoom_speed > 0",
            ));
        }
        if c.transition_palette.is_empty() {
            return Err(SlidecastError::config("transition_palette is empty"));
        }
        if !(0.4..=0.5).contains(&c.transition_duration) {
            return Err(SlidecastError::config(format!(
                "transition_duration {} outside 0.4..=0.5",
                c.transition_duration
            )));
        }
        if c.min_group_size == 0 || c.min_group_size > c.max_group_size {
            return Err(SlidecastError::config(format!(
                "group sizes must satisfy 1 <= min ({}) <= max ({})",
                c.min_group_size, c.max_group_size
            )));
        }
        if c.max_lines == 0 || c.max_chars_per_line == 0 || c.long_token_threshold == 0 {
            return Err(SlidecastError::config(
                "max_lines, max_chars_per_line and long_token_threshold must be positive",
            ));
        }
        if self.pipeline.fetch_attempts == 0 {
            return Err(SlidecastError::config("fetch_attempts must be at least 1"));
        }
        let timeout = self.pipeline.run_timeout_secs;
        if !timeout.is_finite() || timeout <= 0.0 || Duration::try_from_secs_f64(timeout).is_err() {
            return Err(SlidecastError::config(format!(
                "run_timeout_secs must be a positive, finite number of seconds (got {timeout})"
            )));
        }
        Ok(())
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("slidecast").join("config.json")
}

/// Default data directory.
fn data_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("slidecast")
}
