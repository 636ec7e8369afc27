//! Scene planning: Ken Burns motion per image and the cross-fade graph
//! joining the rendered clips.
//!
//! Everything here produces filter expressions and encoder argument
//! lists; no pixels are touched.

use std::path::{Path, PathBuf};

use slidecast_common::config::{ComposeConfig, PipelineConfig};

/// Video codec for every encode pass.
pub const VIDEO_CODEC: &str = "libx264";

/// Pixel format of every intermediate and final clip.
pub const PIXEL_FORMAT: &str = "yuv420p";

/// Lower bound of any join offset, in seconds.
pub const MIN_TRANSITION_OFFSET: f64 = 0.5;

/// Slow pan/zoom applied to a still image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KenBurnsVariant {
    ZoomIn,
    ZoomOut,
    PanTopLeftToBottomRight,
    PanBottomRightToTopLeft,
    PanTopRightToBottomLeft,
    PanBottomLeftToTopRight,
    PanLeftToRight,
    PanTopToBottom,
}

/// Palette cycled through by scene index.
pub const KEN_BURNS_PALETTE: [KenBurnsVariant; 8] = [
    KenBurnsVariant::ZoomIn,
    KenBurnsVariant::ZoomOut,
    KenBurnsVariant::PanTopLeftToBottomRight,
    KenBurnsVariant::PanBottomRightToTopLeft,
    KenBurnsVariant::PanTopRightToBottomLeft,
    KenBurnsVariant::PanBottomLeftToTopRight,
    KenBurnsVariant::PanLeftToRight,
    KenBurnsVariant::PanTopToBottom,
];

/// `zoompan` expressions for one scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomPan {
    pub zoom: String,
    pub x: String,
    pub y: String,
}

const CENTER_X: &str = "iw/2-(iw/zoom/2)";
const CENTER_Y: &str = "ih/2-(ih/zoom/2)";

impl KenBurnsVariant {
    /// Variant for the 1-based scene `index`.
    pub fn for_scene(index: usize) -> Self {
        KEN_BURNS_PALETTE[index % KEN_BURNS_PALETTE.len()]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ZoomIn => "zoom_in",
            Self::ZoomOut => "zoom_out",
            Self::PanTopLeftToBottomRight => "pan_tl_br",
            Self::PanBottomRightToTopLeft => "pan_br_tl",
            Self::PanTopRightToBottomLeft => "pan_tr_bl",
            Self::PanBottomLeftToTopRight => "pan_bl_tr",
            Self::PanLeftToRight => "pan_left_right",
            Self::PanTopToBottom => "pan_top_bottom",
        }
    }

    /// Zoom and offset expressions over `frames` output frames.
    ///
    /// Zoom variants advance by `min(zoom_speed, (max_zoom - 1) / frames)`
    /// per frame so the zoom never passes `max_zoom` inside the scene.
    /// Pans hold `max_zoom` and travel the full free margin.
    pub fn motion(&self, frames: u32, max_zoom: f64, zoom_speed: f64) -> ZoomPan {
        let frames = frames.max(1);
        let step = zoom_speed.min((max_zoom - 1.0).max(0.0) / frames as f64);
        let progress = format!("min(on/{},1)", frames.saturating_sub(1).max(1));
        let fwd_x = format!("(iw-iw/zoom)*{progress}");
        let back_x = format!("(iw-iw/zoom)*(1-{progress})");
        let fwd_y = format!("(ih-ih/zoom)*{progress}");
        let back_y = format!("(ih-ih/zoom)*(1-{progress})");
        let hold = format!("{max_zoom:.3}");

        let (zoom, x, y) = match self {
            Self::ZoomIn => (
                format!("min(1+{step:.6}*on,{max_zoom:.3})"),
                CENTER_X.to_string(),
                CENTER_Y.to_string(),
            ),
            Self::ZoomOut => (
                format!("max({max_zoom:.3}-{step:.6}*on,1)"),
                CENTER_X.to_string(),
                CENTER_Y.to_string(),
            ),
            Self::PanTopLeftToBottomRight => (hold, fwd_x, fwd_y),
            Self::PanBottomRightToTopLeft => (hold, back_x, back_y),
            Self::PanTopRightToBottomLeft => (hold, back_x, fwd_y),
            Self::PanBottomLeftToTopRight => (hold, fwd_x, back_y),
            Self::PanLeftToRight => (hold, fwd_x, "(ih-ih/zoom)/2".to_string()),
            Self::PanTopToBottom => (hold, "(iw-iw/zoom)/2".to_string(), fwd_y),
        };
        ZoomPan { zoom, x, y }
    }
}

/// One still image turned into a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// 1-based position in the job.
    pub index: usize,
    pub image: PathBuf,
    /// Clip length in seconds, end pad included for the last scene.
    pub duration: f64,
    pub variant: KenBurnsVariant,
    pub frames: u32,
}

/// A cross-fade between clip `from` and clip `from + 1` (0-based).
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: usize,
    pub to: usize,
    pub effect: String,
    pub duration: f64,
    /// Seconds into the running concatenation where the fade starts.
    pub offset: f64,
}

/// Configuration for scene planning and encoding arguments.
#[derive(Debug, Clone)]
pub struct ScenePlanConfig {
    pub frame_rate: u32,
    pub width: u32,
    pub height: u32,
    pub preset: String,
    pub quality: u32,
    pub max_zoom: f64,
    pub zoom_speed: f64,
    pub transition_palette: Vec<String>,
    pub transition_duration: f64,
    /// Extra dwell appended to the last scene.
    pub end_pad_secs: f64,
}

impl Default for ScenePlanConfig {
    fn default() -> Self {
        Self::from_configs(&ComposeConfig::default(), &PipelineConfig::default())
    }
}

impl ScenePlanConfig {
    pub fn from_configs(compose: &ComposeConfig, pipeline: &PipelineConfig) -> Self {
        Self {
            frame_rate: compose.frame_rate,
            width: compose.width,
            height: compose.height,
            preset: compose.preset.clone(),
            quality: compose.quality,
            max_zoom: compose.max_zoom,
            zoom_speed: compose.zoom_speed,
            transition_palette: compose.transition_palette.clone(),
            transition_duration: compose.transition_duration,
            end_pad_secs: pipeline.end_pad_secs,
        }
    }
}

/// Errors raised while planning scenes.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("no images to plan")]
    Empty,

    #[error("{images} images but {durations} durations")]
    LengthMismatch { images: usize, durations: usize },

    #[error("scene {index} has non-positive duration {duration}")]
    InvalidDuration { index: usize, duration: f64 },

    #[error("transition palette is empty")]
    EmptyPalette,
}

/// Frame count for a clip of `duration` seconds.
pub fn frame_count(frame_rate: u32, duration: f64) -> u32 {
    (frame_rate as f64 * duration).round().max(1.0) as u32
}

/// Clamp a join offset into `[0.5, clip_duration - transition]`.
///
/// When the clip is too short for that window the lower bound wins.
pub fn clamp_offset(raw: f64, clip_duration: f64, transition_duration: f64) -> f64 {
    let upper = (clip_duration - transition_duration).max(MIN_TRANSITION_OFFSET);
    if !raw.is_finite() {
        return upper;
    }
    raw.clamp(MIN_TRANSITION_OFFSET, upper)
}

/// Round-robin pick from the palette for the 0-based join `index`.
pub fn pick_transition(palette: &[String], index: usize) -> Option<&str> {
    if palette.is_empty() {
        return None;
    }
    Some(palette[index % palette.len()].as_str())
}

/// Builds scene plans and the encoder arguments that realise them.
pub struct ScenePlanner {
    config: ScenePlanConfig,
}

impl ScenePlanner {
    pub fn new(config: ScenePlanConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ScenePlanConfig::default())
    }

    pub fn config(&self) -> &ScenePlanConfig {
        &self.config
    }

    /// Pair images with durations, pick variants, pad the last scene.
    pub fn plan_scenes(&self, images: &[PathBuf], durations: &[f64]) -> Result<Vec<Scene>, PlanError> {
        if images.is_empty() {
            return Err(PlanError::Empty);
        }
        if images.len() != durations.len() {
            return Err(PlanError::LengthMismatch {
                images: images.len(),
                durations: durations.len(),
            });
        }

        let last = images.len() - 1;
        images
            .iter()
            .zip(durations)
            .enumerate()
            .map(|(i, (image, &duration))| {
                let index = i + 1;
                if !duration.is_finite() || duration <= 0.0 {
                    return Err(PlanError::InvalidDuration { index, duration });
                }
                let duration = if i == last {
                    duration + self.config.end_pad_secs
                } else {
                    duration
                };
                Ok(Scene {
                    index,
                    image: image.clone(),
                    duration,
                    variant: KenBurnsVariant::for_scene(index),
                    frames: frame_count(self.config.frame_rate, duration),
                })
            })
            .collect()
    }

    /// Filter chain turning a still into a moving clip.
    pub fn scene_filter(&self, scene: &Scene) -> String {
        let c = &self.config;
        let motion = scene.variant.motion(scene.frames, c.max_zoom, c.zoom_speed);
        format!(
            "scale={prescale}:-2,zoompan=z='{z}':x='{x}':y='{y}':d={frames}:s={w}x{h}:fps={fps},setsar=1,format={pix}",
            prescale = c.width * 2,
            z = motion.zoom,
            x = motion.x,
            y = motion.y,
            frames = scene.frames,
            w = c.width,
            h = c.height,
            fps = c.frame_rate,
            pix = PIXEL_FORMAT,
        )
    }

    /// Arguments rendering one scene to a silent clip.
    pub fn scene_encode_args(&self, scene: &Scene, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-loop".to_string(),
            "1".to_string(),
            "-i".to_string(),
            scene.image.display().to_string(),
            "-t".to_string(),
            format!("{:.3}", scene.duration),
            "-vf".to_string(),
            self.scene_filter(scene),
        ];
        args.extend(self.video_codec_args());
        args.push("-an".to_string());
        args.push(output.display().to_string());
        args
    }

    /// Transitions for every adjacent pair, offsets from cumulative
    /// arithmetic over the planned durations.
    pub fn transitions(&self, scenes: &[Scene]) -> Result<Vec<Transition>, PlanError> {
        let t = self.config.transition_duration;
        let mut running = match scenes.first() {
            Some(first) => first.duration,
            None => return Ok(Vec::new()),
        };

        let mut transitions = Vec::with_capacity(scenes.len().saturating_sub(1));
        for (k, next) in scenes.iter().enumerate().skip(1) {
            let join = k - 1;
            let effect = pick_transition(&self.config.transition_palette, join)
                .ok_or(PlanError::EmptyPalette)?;
            let offset = clamp_offset(running - t, running, t);
            transitions.push(Transition {
                from: join,
                to: k,
                effect: effect.to_string(),
                duration: t,
                offset,
            });
            running = offset + next.duration;
        }
        Ok(transitions)
    }

    /// Transition for a pairwise join once the running length is known.
    pub fn probed_transition(&self, join: usize, running_duration: f64) -> Result<Transition, PlanError> {
        let t = self.config.transition_duration;
        let effect = pick_transition(&self.config.transition_palette, join)
            .ok_or(PlanError::EmptyPalette)?;
        Ok(Transition {
            from: join,
            to: join + 1,
            effect: effect.to_string(),
            duration: t,
            offset: clamp_offset(running_duration - t, running_duration, t),
        })
    }

    /// `filter_complex` chaining every clip through its cross-fade.
    /// The final label is `[vout]`.
    pub fn xfade_graph(&self, clip_count: usize, transitions: &[Transition]) -> String {
        let mut parts: Vec<String> = (0..clip_count)
            .map(|i| format!("[{i}:v]{}[v{i}]", self.normalize_chain()))
            .collect();

        if transitions.is_empty() {
            parts.push("[v0]null[vout]".to_string());
            return parts.join(";");
        }

        let mut prev = "v0".to_string();
        for (k, tr) in transitions.iter().enumerate() {
            let out = if k + 1 == transitions.len() {
                "vout".to_string()
            } else {
                format!("x{}", k + 1)
            };
            parts.push(format!(
                "[{prev}][v{to}]xfade=transition={effect}:duration={d:.3}:offset={o:.3}[{out}]",
                to = tr.to,
                effect = tr.effect,
                d = tr.duration,
                o = tr.offset,
            ));
            prev = out;
        }
        parts.join(";")
    }

    /// Arguments joining all clips in a single encoder pass.
    pub fn concat_args(&self, clips: &[PathBuf], transitions: &[Transition], output: &Path) -> Vec<String> {
        let mut args = vec!["-y".to_string()];
        for clip in clips {
            args.push("-i".to_string());
            args.push(clip.display().to_string());
        }
        args.push("-filter_complex".to_string());
        args.push(self.xfade_graph(clips.len(), transitions));
        args.push("-map".to_string());
        args.push("[vout]".to_string());
        args.extend(self.video_codec_args());
        args.push("-an".to_string());
        args.push(output.display().to_string());
        args
    }

    /// Arguments joining the running concatenation with the next clip.
    pub fn join_args(&self, running: &Path, next: &Path, transition: &Transition, output: &Path) -> Vec<String> {
        let graph = format!(
            "[0:v]{norm}[a];[1:v]{norm}[b];[a][b]xfade=transition={effect}:duration={d:.3}:offset={o:.3}[vout]",
            norm = self.normalize_chain(),
            effect = transition.effect,
            d = transition.duration,
            o = transition.offset,
        );
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            running.display().to_string(),
            "-i".to_string(),
            next.display().to_string(),
            "-filter_complex".to_string(),
            graph,
            "-map".to_string(),
            "[vout]".to_string(),
        ];
        args.extend(self.video_codec_args());
        args.push("-an".to_string());
        args.push(output.display().to_string());
        args
    }

    /// H.264 settings shared by every video encode.
    pub fn video_codec_args(&self) -> Vec<String> {
        let c = &self.config;
        vec![
            "-c:v".to_string(),
            VIDEO_CODEC.to_string(),
            "-preset".to_string(),
            c.preset.clone(),
            "-crf".to_string(),
            c.quality.to_string(),
            "-pix_fmt".to_string(),
            PIXEL_FORMAT.to_string(),
            "-r".to_string(),
            c.frame_rate.to_string(),
            "-g".to_string(),
            (c.frame_rate * 2).to_string(),
            "-keyint_min".to_string(),
            c.frame_rate.to_string(),
            "-sc_threshold".to_string(),
            "0".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]
    }

    fn normalize_chain(&self) -> String {
        format!(
            "settb=AVTB,setpts=PTS-STARTPTS,fps={},format={}",
            self.config.frame_rate, PIXEL_FORMAT
        )
    }
}
