//! Timed transcript words and the formats they are read from.
//!
//! Two shapes of transcript exist in the wild: per-word timings (Whisper /
//! stable-ts JSON) and caption lines (SRT, WebVTT). Caption lines are
//! spread evenly across their tokens so the rest of the pipeline only
//! ever sees [`Word`]s.

use serde::{Deserialize, Serialize};

/// Confidence assigned to words derived from caption lines.
pub const CAPTION_WORD_CONFIDENCE: f64 = 1.0;

/// One spoken word with its time span in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: f64,
    pub end: f64,
    /// Recognizer confidence in `[0, 1]`.
    pub confidence: f64,
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            confidence: CAPTION_WORD_CONFIDENCE,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A caption line: a window of text without per-word timing.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLine {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl CaptionLine {
    /// Divide the line's window evenly across its whitespace tokens.
    pub fn to_words(&self) -> Vec<Word> {
        let tokens: Vec<&str> = self.text.split_whitespace().collect();
        if tokens.is_empty() {
            return Vec::new();
        }
        let step = (self.end - self.start) / tokens.len() as f64;
        let last = tokens.len() - 1;
        tokens
            .into_iter()
            .enumerate()
            .map(|(i, token)| {
                let start = self.start + step * i as f64;
                let end = if i == last {
                    self.end
                } else {
                    self.start + step * (i + 1) as f64
                };
                Word::new(token, start, end)
            })
            .collect()
    }
}

/// Convert a sequence of caption lines into timed words.
pub fn words_from_captions(lines: &[CaptionLine]) -> Vec<Word> {
    lines.iter().flat_map(CaptionLine::to_words).collect()
}

/// Source format of a transcript file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptFormat {
    Json,
    Srt,
    Vtt,
    Ass,
}

impl TranscriptFormat {
    /// Guess the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "srt" => Some(Self::Srt),
            "vtt" => Some(Self::Vtt),
            "ass" | "ssa" => Some(Self::Ass),
            _ => None,
        }
    }

    /// Guess the format from the content itself.
    pub fn sniff(content: &str) -> Option<Self> {
        let head = content.trim_start_matches('\u{feff}').trim_start();
        if head.starts_with('{') || (head.starts_with('[') && !head.starts_with("[Script Info]")) {
            Some(Self::Json)
        } else if head.starts_with("WEBVTT") {
            Some(Self::Vtt)
        } else if head.starts_with("[Script Info]") {
            Some(Self::Ass)
        } else if head.contains("-->") {
            Some(Self::Srt)
        } else {
            None
        }
    }
}

/// A parsed transcript, ready for segmentation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transcript {
    pub words: Vec<Word>,
}

impl Transcript {
    /// Parse transcript text. `format` overrides content sniffing.
    pub fn parse(content: &str, format: Option<TranscriptFormat>) -> Result<Self, TranscriptError> {
        let content = content.trim_start_matches('\u{feff}');
        let format = format
            .or_else(|| TranscriptFormat::sniff(content))
            .ok_or(TranscriptError::UnknownFormat)?;

        let words = match format {
            TranscriptFormat::Json => parse_json(content)?,
            TranscriptFormat::Srt | TranscriptFormat::Vtt => {
                words_from_captions(&parse_captions(content)?)
            }
            TranscriptFormat::Ass => return Err(TranscriptError::Unsupported("ass")),
        };

        let transcript = Self { words };
        transcript.check()?;
        Ok(transcript)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn check(&self) -> Result<(), TranscriptError> {
        if self.words.is_empty() {
            return Err(TranscriptError::Empty);
        }
        for (i, w) in self.words.iter().enumerate() {
            if !w.start.is_finite() || !w.end.is_finite() || w.start < 0.0 || w.start > w.end {
                return Err(TranscriptError::Malformed(format!(
                    "word #{} '{}' has invalid span {}..{}",
                    i + 1,
                    w.text,
                    w.start,
                    w.end
                )));
            }
        }
        if let Some(pair) = self.words.windows(2).find(|p| p[1].start < p[0].start) {
            return Err(TranscriptError::Malformed(format!(
                "word '{}' at {} starts before preceding word '{}' at {}",
                pair[1].text, pair[1].start, pair[0].text, pair[0].start
            )));
        }
        Ok(())
    }
}

/// Errors raised while reading a transcript.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("transcript format not recognized")]
    UnknownFormat,

    #[error("{0} transcripts carry no word timings")]
    Unsupported(&'static str),

    #[error("transcript contains no words")]
    Empty,

    #[error("malformed transcript: {0}")]
    Malformed(String),

    #[error("invalid transcript JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonTranscript {
    Words(Vec<RawWord>),
    WordList { words: Vec<RawWord> },
    Segments { segments: Vec<RawSegment> },
}

#[derive(Deserialize)]
struct RawWord {
    #[serde(alias = "text")]
    word: String,
    start: f64,
    end: f64,
    #[serde(default, alias = "confidence")]
    probability: Option<f64>,
}

#[derive(Deserialize)]
struct RawSegment {
    start: f64,
    end: f64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    words: Vec<RawWord>,
}

impl RawWord {
    fn into_word(self) -> Option<Word> {
        let text = self.word.trim();
        if text.is_empty() {
            return None;
        }
        Some(Word {
            text: text.to_string(),
            start: self.start,
            end: self.end,
            confidence: self
                .probability
                .map(|p| p.clamp(0.0, 1.0))
                .unwrap_or(CAPTION_WORD_CONFIDENCE),
        })
    }
}

fn parse_json(content: &str) -> Result<Vec<Word>, TranscriptError> {
    let parsed: JsonTranscript = serde_json::from_str(content)?;
    let words = match parsed {
        JsonTranscript::Words(words) | JsonTranscript::WordList { words } => {
            words.into_iter().filter_map(RawWord::into_word).collect()
        }
        JsonTranscript::Segments { segments } => segments
            .into_iter()
            .flat_map(|segment| {
                if segment.words.is_empty() {
                    CaptionLine {
                        start: segment.start,
                        end: segment.end,
                        text: segment.text,
                    }
                    .to_words()
                } else {
                    segment
                        .words
                        .into_iter()
                        .filter_map(RawWord::into_word)
                        .collect()
                }
            })
            .collect(),
    };
    Ok(words)
}

/// Parse SRT or WebVTT cue blocks into caption lines.
pub fn parse_captions(content: &str) -> Result<Vec<CaptionLine>, TranscriptError> {
    let mut lines = Vec::new();
    let normalized = content.replace("\r\n", "\n");

    for block in normalized.split("\n\n") {
        let mut rows = block.lines().map(str::trim).filter(|l| !l.is_empty());
        let Some(timing) = rows.by_ref().find(|l| l.contains("-->")) else {
            continue;
        };
        let (start, end) = parse_timing_row(timing)?;
        let text = rows.map(strip_markup).collect::<Vec<_>>().join(" ");
        if !text.trim().is_empty() {
            lines.push(CaptionLine { start, end, text });
        }
    }
    Ok(lines)
}

fn parse_timing_row(row: &str) -> Result<(f64, f64), TranscriptError> {
    let malformed = || TranscriptError::Malformed(format!("bad timing row '{row}'"));
    let (left, right) = row.split_once("-->").ok_or_else(malformed)?;
    // VTT allows cue settings after the end time.
    let end_token = right.split_whitespace().next().ok_or_else(malformed)?;
    let start = parse_timestamp(left.trim()).ok_or_else(malformed)?;
    let end = parse_timestamp(end_token).ok_or_else(malformed)?;
    Ok((start, end))
}

/// Parse `HH:MM:SS,mmm`, `HH:MM:SS.mmm` or `MM:SS.mmm`.
fn parse_timestamp(raw: &str) -> Option<f64> {
    let raw = raw.replace(',', ".");
    let parts: Vec<&str> = raw.split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (h.parse::<f64>().ok()?, m.parse::<f64>().ok()?, *s),
        [m, s] => (0.0, m.parse::<f64>().ok()?, *s),
        _ => return None,
    };
    let s = s.parse::<f64>().ok()?;
    Some(h * 3600.0 + m * 60.0 + s)
}

/// Drop inline `<i>`-style tags and `{\an8}`-style overrides.
fn strip_markup(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut depth_angle = false;
    let mut depth_brace = false;
    for c in line.chars() {
        match c {
            '<' => depth_angle = true,
            '>' if depth_angle => depth_angle = false,
            '{' => depth_brace = true,
            '}' if depth_brace => depth_brace = false,
            _ if depth_angle || depth_brace => {}
            _ => out.push(c),
        }
    }
    out
}
