//! Line wrapping for cue text.
//!
//! The same layout is reused by the base line and every karaoke overlay
//! of a cue, so a highlighted word never shifts position.

use crate::ass::escape_ass_text;

/// Lower bound of the per-line character target.
pub const MIN_LINE_TARGET: usize = 20;

/// Wrapping limits.
#[derive(Debug, Clone, Copy)]
pub struct WrapOptions {
    pub max_chars_per_line: usize,
    pub max_lines: usize,
    /// Tokens longer than this are cut into chunks of this length.
    pub long_token_threshold: usize,
}

/// A piece of a word placed on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutToken {
    pub text: String,
    /// Index of the source word within the cue.
    pub word: usize,
}

/// Wrapped lines of a cue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineLayout {
    pub lines: Vec<Vec<LayoutToken>>,
}

impl LineLayout {
    /// Wrap `words` into at most `max_lines` lines.
    pub fn wrap(words: &[&str], options: &WrapOptions) -> Self {
        let tokens = tokenize(words, options.long_token_threshold.max(1));
        if tokens.is_empty() {
            return Self { lines: Vec::new() };
        }

        let total = line_width(&tokens);
        let max_lines = options.max_lines.max(1);
        let upper = options.max_chars_per_line.max(MIN_LINE_TARGET);
        let target = total.div_ceil(max_lines).clamp(MIN_LINE_TARGET, upper);

        let mut lines: Vec<Vec<LayoutToken>> = vec![Vec::new()];
        let mut current_len = 0;
        for token in tokens {
            let len = token.text.chars().count();
            let sep = separator(lines.last().and_then(|l| l.last()), &token);
            let on_final_line = lines.len() >= max_lines;
            let line_has_content = lines.last().is_some_and(|l| !l.is_empty());

            if line_has_content && !on_final_line && current_len + sep + len > target {
                lines.push(Vec::new());
                current_len = len;
            } else {
                current_len += sep + len;
            }
            if let Some(line) = lines.last_mut() {
                line.push(token);
            }
        }

        if lines.len() == 2 {
            lines = balance_two_lines(lines);
        }
        Self { lines }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Render the layout with `\N` between lines. `decorate` receives each
    /// token and its escaped text and returns what to emit.
    pub fn render(&self, mut decorate: impl FnMut(&LayoutToken, &str) -> String) -> String {
        self.lines
            .iter()
            .map(|line| {
                let mut out = String::new();
                let mut prev: Option<&LayoutToken> = None;
                for token in line {
                    if separator(prev, token) == 1 {
                        out.push(' ');
                    }
                    out.push_str(&decorate(token, &escape_ass_text(&token.text)));
                    prev = Some(token);
                }
                out
            })
            .collect::<Vec<_>>()
            .join("\\N")
    }

    /// Render without decoration.
    pub fn plain(&self) -> String {
        self.render(|_, text| text.to_string())
    }
}

fn tokenize(words: &[&str], chunk: usize) -> Vec<LayoutToken> {
    let mut tokens = Vec::new();
    for (word, text) in words.iter().enumerate() {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() > chunk {
            for piece in chars.chunks(chunk) {
                tokens.push(LayoutToken {
                    text: piece.iter().collect(),
                    word,
                });
            }
        } else {
            tokens.push(LayoutToken {
                text: text.to_string(),
                word,
            });
        }
    }
    tokens
}

/// Chunks of one word are glued together; distinct words get a space.
fn separator(prev: Option<&LayoutToken>, token: &LayoutToken) -> usize {
    match prev {
        Some(p) if p.word != token.word => 1,
        _ => 0,
    }
}

fn line_width(tokens: &[LayoutToken]) -> usize {
    let mut width = 0;
    let mut prev: Option<&LayoutToken> = None;
    for token in tokens {
        width += separator(prev, token) + token.text.chars().count();
        prev = Some(token);
    }
    width
}

/// Re-split two lines at the token boundary closest to the textual midpoint.
fn balance_two_lines(lines: Vec<Vec<LayoutToken>>) -> Vec<Vec<LayoutToken>> {
    let tokens: Vec<LayoutToken> = lines.into_iter().flatten().collect();
    let total = line_width(&tokens);

    let mut best_split = 1;
    let mut best_distance = usize::MAX;
    for split in 1..tokens.len() {
        let left = line_width(&tokens[..split]);
        let distance = (2 * left).abs_diff(total);
        if distance < best_distance {
            best_distance = distance;
            best_split = split;
        }
    }

    let mut first = tokens;
    let second = first.split_off(best_split.min(first.len()));
    if second.is_empty() {
        vec![first]
    } else {
        vec![first, second]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn options(max_chars: usize, max_lines: usize) -> WrapOptions {
        WrapOptions {
            max_chars_per_line: max_chars,
            max_lines,
            long_token_threshold: 16,
        }
    }

    #[test]
    fn test_short_cue_single_line() {
        let layout = LineLayout::wrap(&["hello", "there", "friend"], &options(42, 2));
        assert_eq!(layout.line_count(), 1);
        assert_eq!(layout.plain(), "hello there friend");
    }

    #[test]
    fn test_two_lines_are_balanced() {
        let words = [
            "the", "quick", "brown", "fox", "jumps", "over", "the", "lazy", "dog", "again",
        ];
        let layout = LineLayout::wrap(&words, &options(42, 2));
        assert_eq!(layout.line_count(), 2);
        let plain = layout.plain();
        let (first, second) = plain.split_once("\\N").unwrap();
        assert!(first.len().abs_diff(second.len()) <= 6, "{plain}");
    }

    #[test]
    fn test_final_line_takes_remainder() {
        let words = ["aaaaaaaaaa"; 12];
        let layout = LineLayout::wrap(&words, &options(24, 3));
        assert_eq!(layout.line_count(), 3);
        let last_len: usize = layout.lines[2].len();
        assert!(last_len >= layout.lines[0].len());
    }

    #[test]
    fn test_long_token_chunked_and_glued() {
        let words = ["supercalifragilisticexpialidocious", "ok"];
        let layout = LineLayout::wrap(&words, &options(42, 2));
        let chunks: Vec<&str> = layout
            .lines
            .iter()
            .flatten()
            .filter(|t| t.word == 0)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(chunks, ["supercalifragili", "sticexpialidocio", "us"]);
        assert!(layout.plain().replace("\\N", "").contains("supercalifragilisticexpialidocious"));
    }

    #[test]
    fn test_render_escapes_and_decorates() {
        let layout = LineLayout::wrap(&["{a}", "b"], &options(42, 2));
        let text = layout.render(|t, s| if t.word == 1 { format!("<{s}>") } else { s.to_string() });
        assert_eq!(text, "\\{a\\} <b>");
    }

    #[test]
    fn test_empty_words() {
        assert_eq!(LineLayout::wrap(&[], &options(42, 2)).line_count(), 0);
    }

    proptest! {
        #[test]
        fn prop_every_word_exactly_once(
            words in prop::collection::vec("[a-z]{1,24}", 1..14),
            max_chars in 10usize..60,
            max_lines in 1usize..4,
        ) {
            let refs: Vec<&str> = words.iter().map(String::as_str).collect();
            let layout = LineLayout::wrap(&refs, &options(max_chars, max_lines));
            prop_assert!(layout.line_count() <= max_lines);

            let flat: Vec<&LayoutToken> = layout.lines.iter().flatten().collect();
            for (i, word) in words.iter().enumerate() {
                let rebuilt: String = flat
                    .iter()
                    .filter(|t| t.word == i)
                    .map(|t| t.text.as_str())
                    .collect();
                prop_assert_eq!(&rebuilt, word);
            }
            let order: Vec<usize> = flat.iter().map(|t| t.word).collect();
            prop_assert!(order.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
