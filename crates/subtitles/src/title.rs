//! Title decoration shown over the opening seconds of the video.
//!
//! Three stacked layers:
//! - **-2:** filled rounded panel (vector drawing)
//! - **-1:** blurred glow outline of the text
//! - **0:** the text itself, filled with a vertical two-colour gradient
//!   built from horizontal clip bands
//!
//! Every layer fades in; the text and glow scale from 120% to 100%
//! over the first second while the blur decays.

use slidecast_common::config::SubtitleStyleConfig;

use crate::ass::{escape_ass_text, format_bgr, parse_bgr, Dialogue};
use crate::karaoke::TITLE_STYLE;

pub const PANEL_LAYER: i32 = -2;
pub const GLOW_LAYER: i32 = -1;
pub const TEXT_LAYER: i32 = 0;

/// Number of clip bands approximating the gradient.
pub const GRADIENT_BANDS: usize = 6;

const FADE_IN_MS: u32 = 600;
const ENTRANCE_MS: u32 = 1000;
const ENTRANCE_SCALE: u32 = 120;
/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH_RATIO: f64 = 0.62;

/// Builds the title layers for one video.
pub struct TitleDecoration<'a> {
    style: &'a SubtitleStyleConfig,
    width: u32,
    height: u32,
    duration_secs: f64,
}

impl<'a> TitleDecoration<'a> {
    pub fn new(style: &'a SubtitleStyleConfig, width: u32, height: u32, duration_secs: f64) -> Self {
        Self {
            style,
            width,
            height,
            duration_secs,
        }
    }

    /// Fixed anchor of the title (centre of the text).
    pub fn anchor(&self) -> (u32, u32) {
        (self.width / 2, (self.height as f64 * 0.2).round() as u32)
    }

    pub fn render(&self, title: &str) -> Vec<Dialogue> {
        let text = escape_ass_text(title.trim());
        let end = self.duration_secs;
        let mut dialogues = vec![
            Dialogue::new(PANEL_LAYER, 0.0, end, TITLE_STYLE, self.panel(&text)),
            Dialogue::new(GLOW_LAYER, 0.0, end, TITLE_STYLE, self.glow(&text)),
        ];
        dialogues.extend(
            self.gradient_bands(&text)
                .into_iter()
                .map(|band| Dialogue::new(TEXT_LAYER, 0.0, end, TITLE_STYLE, band)),
        );
        dialogues
    }

    /// Scale-in over the first second; `settle_blur` also decays the blur.
    fn entrance(&self, settle_blur: bool) -> String {
        format!(
            "\\fscx{s}\\fscy{s}\\t(0,{ENTRANCE_MS},\\fscx100\\fscy100{blur})",
            s = ENTRANCE_SCALE,
            blur = if settle_blur { "\\blur0" } else { "" },
        )
    }

    fn panel(&self, text: &str) -> String {
        let font = self.style.title_font_size as f64;
        let text_w = text.chars().count() as f64 * font * GLYPH_WIDTH_RATIO;
        let text_h = font * 1.2;
        let w = (text_w + font * 1.2).min(self.width as f64 * 0.92).round();
        let h = (text_h + font * 0.7).round();
        let r = (h / 2.0).min(font * 0.4).round();
        let (cx, cy) = self.anchor();
        let x0 = (cx as f64 - w / 2.0).round().max(0.0);
        let y0 = (cy as f64 - h / 2.0).round().max(0.0);

        let path = format!(
            "m {r} 0 l {wr} 0 b {w} 0 {w} 0 {w} {r} l {w} {hr} b {w} {h} {w} {h} {wr} {h} \
             l {r} {h} b 0 {h} 0 {h} 0 {hr} l 0 {r} b 0 0 0 0 {r} 0",
            wr = w - r,
            hr = h - r,
        );
        format!(
            "{{\\an7\\pos({x0},{y0})\\fad({FADE_IN_MS},0)\\bord0\\shad0\\1c{panel}\\1a&H30&\\p1}}{path}{{\\p0}}",
            panel = self.style.title_panel_color,
        )
    }

    fn glow(&self, text: &str) -> String {
        let (cx, cy) = self.anchor();
        format!(
            "{{\\an5\\pos({cx},{cy})\\fad({FADE_IN_MS},0)\\1a&HFF&\\3c{glow}\\bord10\\blur14{entrance}}}{text}",
            glow = self.style.title_glow_color,
            entrance = self.entrance(false),
        )
    }

    fn gradient_bands(&self, text: &str) -> Vec<String> {
        let (cx, cy) = self.anchor();
        let (top, bottom) = &self.style.title_colors;
        let top_rgb = parse_bgr(top);
        let bottom_rgb = parse_bgr(bottom);

        let font = self.style.title_font_size as f64;
        let span = font * 1.2 * ENTRANCE_SCALE as f64 / 100.0;
        let y_top = cy as f64 - span / 2.0;
        let band_h = span / GRADIENT_BANDS as f64;

        (0..GRADIENT_BANDS)
            .map(|i| {
                let t = i as f64 / (GRADIENT_BANDS - 1) as f64;
                let color = match (top_rgb, bottom_rgb) {
                    (Some(a), Some(b)) => format_bgr(lerp_bgr(a, b, t)),
                    _ => top.clone(),
                };
                // Outer bands run to the frame edge so nothing escapes the fill.
                let y0 = if i == 0 {
                    0
                } else {
                    (y_top + band_h * i as f64).round() as u32
                };
                let y1 = if i + 1 == GRADIENT_BANDS {
                    self.height
                } else {
                    (y_top + band_h * (i + 1) as f64).round() as u32
                };
                format!(
                    "{{\\an5\\pos({cx},{cy})\\clip(0,{y0},{w},{y1})\\fad({FADE_IN_MS},0)\\1c{color}\\3c{outline}\\bord2\\shad0\\blur6{entrance}}}{text}",
                    w = self.width,
                    outline = self.style.outline_color,
                    entrance = self.entrance(true),
                )
            })
            .collect()
    }
}

fn lerp_bgr(a: (u8, u8, u8), b: (u8, u8, u8), t: f64) -> (u8, u8, u8) {
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
    (mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}
