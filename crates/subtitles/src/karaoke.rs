//! Cue rendering: a base line per cue plus one karaoke overlay per word.

use slidecast_common::config::{AppConfig, SubtitleStyleConfig};
use slidecast_job_model::transcript::Word;
use slidecast_processing_core::segmenter::Cue;

use crate::ass::{style_color, AssDocument, AssStyle, Dialogue};
use crate::layout::{LineLayout, WrapOptions};
use crate::title::TitleDecoration;

/// Layer of the base dialogue lines.
pub const BASE_LAYER: i32 = 0;

/// Layer of the per-word highlight overlays.
pub const HIGHLIGHT_LAYER: i32 = 1;

pub const DEFAULT_STYLE: &str = "Default";
pub const TITLE_STYLE: &str = "Title";

/// Everything the renderer needs to lay out and colour cues.
#[derive(Debug, Clone)]
pub struct SubtitleRenderConfig {
    pub play_res_x: u32,
    pub play_res_y: u32,
    pub wrap: WrapOptions,
    pub style: SubtitleStyleConfig,
    pub title_duration_secs: f64,
}

impl Default for SubtitleRenderConfig {
    fn default() -> Self {
        Self::from_app(&AppConfig::default())
    }
}

impl SubtitleRenderConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            play_res_x: config.compose.width,
            play_res_y: config.compose.height,
            wrap: WrapOptions {
                max_chars_per_line: config.compose.max_chars_per_line,
                max_lines: config.compose.max_lines,
                long_token_threshold: config.compose.long_token_threshold,
            },
            style: config.subtitles.clone(),
            title_duration_secs: config.pipeline.title_duration_secs,
        }
    }
}

/// Turns cues into an ASS document.
pub struct CueRenderer {
    config: SubtitleRenderConfig,
}

impl CueRenderer {
    pub fn new(config: SubtitleRenderConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(SubtitleRenderConfig::default())
    }

    pub fn config(&self) -> &SubtitleRenderConfig {
        &self.config
    }

    /// Empty document carrying the header and both styles.
    pub fn document(&self, title: &str) -> AssDocument {
        AssDocument::new(
            title,
            self.config.play_res_x,
            self.config.play_res_y,
            vec![self.default_style(), self.title_style()],
        )
    }

    /// Render every cue, and the title decoration when one is given.
    pub fn render(&self, words: &[Word], cues: &[Cue], title: Option<&str>) -> AssDocument {
        let mut doc = self.document(title.unwrap_or("slidecast"));
        if let Some(title) = title {
            for dialogue in self.title_decoration().render(title) {
                doc.push(dialogue);
            }
        }
        for cue in cues {
            for dialogue in self.render_cue(words, cue) {
                doc.push(dialogue);
            }
        }
        doc
    }

    /// Document holding only the title decoration.
    pub fn render_title_document(&self, title: &str) -> AssDocument {
        self.render(&[], &[], Some(title))
    }

    /// Base line followed by one overlay per in-bounds word.
    pub fn render_cue(&self, words: &[Word], cue: &Cue) -> Vec<Dialogue> {
        let cue_words = cue.words(words);
        let texts: Vec<&str> = cue_words.iter().map(|w| w.text.as_str()).collect();
        let layout = LineLayout::wrap(&texts, &self.config.wrap);

        let mut dialogues = Vec::with_capacity(cue_words.len() + 1);
        dialogues.push(Dialogue::new(
            BASE_LAYER,
            cue.start,
            cue.end,
            DEFAULT_STYLE,
            layout.plain(),
        ));

        let style = &self.config.style;
        for (i, word) in cue_words.iter().enumerate() {
            if !cue.contains_span(word.start, word.end) {
                tracing::debug!(
                    word = %word.text,
                    start = word.start,
                    end = word.end,
                    "Word outside cue bounds, no highlight"
                );
                continue;
            }
            let text = layout.render(|token, escaped| {
                if token.word == i {
                    format!(
                        "{{\\1c{fill}\\3c{glow}\\bord4\\blur3}}{escaped}{{\\r}}",
                        fill = style.highlight_color,
                        glow = style.glow_color,
                    )
                } else {
                    escaped.to_string()
                }
            });
            dialogues.push(Dialogue::new(
                HIGHLIGHT_LAYER,
                word.start,
                word.end,
                DEFAULT_STYLE,
                text,
            ));
        }
        dialogues
    }

    fn title_decoration(&self) -> TitleDecoration<'_> {
        TitleDecoration::new(
            &self.config.style,
            self.config.play_res_x,
            self.config.play_res_y,
            self.config.title_duration_secs,
        )
    }

    fn default_style(&self) -> AssStyle {
        let s = &self.config.style;
        AssStyle {
            name: DEFAULT_STYLE.to_string(),
            font_name: s.font_name.clone(),
            font_size: s.font_size,
            primary_color: style_color(&s.text_color),
            secondary_color: style_color(&s.highlight_color),
            outline_color: style_color(&s.outline_color),
            back_color: "&H80000000".to_string(),
            bold: true,
            spacing: 0,
            border_style: 1,
            outline: 3,
            shadow: 1,
            alignment: 2,
            margin_l: 60,
            margin_r: 60,
            margin_v: s.margin_v,
        }
    }

    fn title_style(&self) -> AssStyle {
        let s = &self.config.style;
        AssStyle {
            name: TITLE_STYLE.to_string(),
            font_name: s.title_font_name.clone(),
            font_size: s.title_font_size,
            primary_color: style_color(&s.title_colors.0),
            secondary_color: "&H00FFFFFF".to_string(),
            outline_color: style_color(&s.title_glow_color),
            back_color: "&H00000000".to_string(),
            bold: true,
            spacing: 1,
            border_style: 1,
            outline: 2,
            shadow: 0,
            alignment: 5,
            margin_l: 10,
            margin_r: 10,
            margin_v: 10,
        }
    }
}
