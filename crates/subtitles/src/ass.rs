//! ASS (Advanced SubStation Alpha) document model.
//!
//! Produces the plain-text layout consumed by ffmpeg's `ass` filter:
//! `[Script Info]`, `[V4+ Styles]` and `[Events]`, in that order.

use std::fmt::Write;
use std::path::Path;

/// Column schema of the `[V4+ Styles]` section.
pub const STYLE_FORMAT: &str = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";

/// Column schema of the `[Events]` section.
pub const EVENT_FORMAT: &str =
    "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

/// Style record for the `[V4+ Styles]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct AssStyle {
    pub name: String,
    pub font_name: String,
    pub font_size: u32,
    /// Colours in `&HAABBGGRR` form.
    pub primary_color: String,
    pub secondary_color: String,
    pub outline_color: String,
    pub back_color: String,
    pub bold: bool,
    /// Horizontal letter spacing in pixels.
    pub spacing: u32,
    /// 1 = outline + drop shadow, 3 = opaque box.
    pub border_style: u8,
    pub outline: u32,
    pub shadow: u32,
    /// Numpad layout: 1-3 bottom, 4-6 middle, 7-9 top.
    pub alignment: u8,
    pub margin_l: u32,
    pub margin_r: u32,
    pub margin_v: u32,
}

impl AssStyle {
    /// Format the style line for the ASS file.
    pub fn to_style_line(&self) -> String {
        let bold_val = if self.bold { -1 } else { 0 };
        format!(
            "Style: {name},{font},{size},{primary},{secondary},{outline},{back},{bold},0,0,0,100,100,{spacing},0,{border},{outline_w},{shadow},{align},{ml},{mr},{mv},1",
            name = self.name,
            font = self.font_name,
            size = self.font_size,
            primary = self.primary_color,
            secondary = self.secondary_color,
            outline = self.outline_color,
            back = self.back_color,
            bold = bold_val,
            spacing = self.spacing,
            border = self.border_style,
            outline_w = self.outline,
            shadow = self.shadow,
            align = self.alignment,
            ml = self.margin_l,
            mr = self.margin_r,
            mv = self.margin_v,
        )
    }
}

/// A `Dialogue:` record.
#[derive(Debug, Clone, PartialEq)]
pub struct Dialogue {
    pub layer: i32,
    pub start: f64,
    pub end: f64,
    pub style: String,
    /// Text with inline override tags, already escaped.
    pub text: String,
}

impl Dialogue {
    pub fn new(layer: i32, start: f64, end: f64, style: &str, text: impl Into<String>) -> Self {
        Self {
            layer,
            start,
            end,
            style: style.to_string(),
            text: text.into(),
        }
    }

    pub fn to_line(&self) -> String {
        format!(
            "Dialogue: {},{},{},{},,0,0,0,,{}",
            self.layer,
            format_ass_time(self.start),
            format_ass_time(self.end),
            self.style,
            self.text
        )
    }
}

/// A complete subtitle document.
#[derive(Debug, Clone, PartialEq)]
pub struct AssDocument {
    pub title: String,
    pub play_res_x: u32,
    pub play_res_y: u32,
    pub styles: Vec<AssStyle>,
    pub events: Vec<Dialogue>,
}

impl AssDocument {
    pub fn new(title: impl Into<String>, play_res_x: u32, play_res_y: u32, styles: Vec<AssStyle>) -> Self {
        Self {
            title: title.into(),
            play_res_x,
            play_res_y,
            styles,
            events: Vec::new(),
        }
    }

    pub fn push(&mut self, dialogue: Dialogue) {
        self.events.push(dialogue);
    }

    /// Serialize the document to ASS text.
    pub fn render(&self) -> String {
        let mut out = String::new();

        // Writing to a String cannot fail.
        let _ = writeln!(out, "[Script Info]");
        let _ = writeln!(out, "Title: {}", self.title);
        let _ = writeln!(out, "ScriptType: v4.00+");
        let _ = writeln!(out, "PlayResX: {}", self.play_res_x);
        let _ = writeln!(out, "PlayResY: {}", self.play_res_y);
        let _ = writeln!(out, "WrapStyle: 2");
        let _ = writeln!(out, "ScaledBorderAndShadow: yes");
        let _ = writeln!(out, "YCbCr Matrix: TV.709");
        let _ = writeln!(out);

        let _ = writeln!(out, "[V4+ Styles]");
        let _ = writeln!(out, "{STYLE_FORMAT}");
        for style in &self.styles {
            let _ = writeln!(out, "{}", style.to_style_line());
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "[Events]");
        let _ = writeln!(out, "{EVENT_FORMAT}");
        for event in &self.events {
            let _ = writeln!(out, "{}", event.to_line());
        }

        out
    }

    /// Write the rendered document to disk.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.render())
    }
}

/// Format seconds as `H:MM:SS.CC`, flooring to the centisecond.
///
/// Flooring keeps an overlay from outliving its word. A tiny epsilon
/// absorbs binary representation error (`0.29 * 100 == 28.999...`).
pub fn format_ass_time(secs: f64) -> String {
    let total_cs = if secs.is_finite() && secs > 0.0 {
        (secs * 100.0 + 1e-6).floor() as u64
    } else {
        0
    };
    let hours = total_cs / 360_000;
    let minutes = (total_cs % 360_000) / 6000;
    let seconds = (total_cs % 6000) / 100;
    let centis = total_cs % 100;
    format!("{hours}:{minutes:02}:{seconds:02}.{centis:02}")
}

/// Escape text so it cannot be read as override tags.
pub fn escape_ass_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '{' => escaped.push_str("\\{"),
            '}' => escaped.push_str("\\}"),
            '\n' | '\r' => escaped.push(' '),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Convert an override-tag colour (`&HBBGGRR&`) into a style colour
/// (`&H00BBGGRR`).
pub fn style_color(tag_color: &str) -> String {
    let hex = tag_color.trim_start_matches("&H").trim_end_matches('&');
    format!("&H{hex:0>8}")
}

/// Parse an override-tag colour into `(b, g, r)`.
pub fn parse_bgr(tag_color: &str) -> Option<(u8, u8, u8)> {
    let hex = tag_color.trim_start_matches("&H").trim_end_matches('&');
    if hex.len() != 6 || !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let b = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let r = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((b, g, r))
}

/// Format `(b, g, r)` as an override-tag colour.
pub fn format_bgr((b, g, r): (u8, u8, u8)) -> String {
    format!("&H{b:02X}{g:02X}{r:02X}&")
}
