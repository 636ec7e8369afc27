//! Transcript segmentation: grouping timed words into subtitle cues.
//!
//! # Algorithm
//!
//! 1. **Scan** words in order, growing a group from the first word.
//! 2. **Break** before a word when the silence since the previous word
//!    exceeds the pause threshold, or the group already holds the maximum
//!    number of words.
//! 3. **Commit** a closed group only if it reaches the minimum size;
//!    undersized groups are dropped, never merged into a neighbour.

use slidecast_common::config::ComposeConfig;
use slidecast_job_model::transcript::Word;

/// Configuration for the segmenter.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Silence (seconds) between two words that forces a new cue.
    pub pause_threshold: f64,

    /// Groups smaller than this are dropped from subtitle output.
    pub min_group_size: usize,

    /// A group is closed as soon as it holds this many words.
    pub max_group_size: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self::from(&ComposeConfig::default())
    }
}

impl From<&ComposeConfig> for SegmenterConfig {
    fn from(config: &ComposeConfig) -> Self {
        Self {
            pause_threshold: config.pause_threshold,
            min_group_size: config.min_group_size,
            max_group_size: config.max_group_size,
        }
    }
}

/// A contiguous run of words shown as one subtitle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cue {
    /// Index of the first word (inclusive).
    pub start_index: usize,
    /// Index of the last word (inclusive).
    pub end_index: usize,
    /// Start of the first word.
    pub start: f64,
    /// End of the last word.
    pub end: f64,
}

impl Cue {
    pub fn word_count(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    /// The cue's words within the transcript it was cut from.
    pub fn words<'a>(&self, all: &'a [Word]) -> &'a [Word] {
        &all[self.start_index..=self.end_index]
    }

    /// Closed-interval containment of a word's span.
    pub fn contains_span(&self, start: f64, end: f64) -> bool {
        start >= self.start && end <= self.end
    }
}

/// Groups words into cues.
pub struct TranscriptSegmenter {
    config: SegmenterConfig,
}

impl TranscriptSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(SegmenterConfig::default())
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Split `words` into cues. Words in undersized groups get no cue.
    pub fn segment(&self, words: &[Word]) -> Vec<Cue> {
        let mut cues = Vec::new();
        if words.is_empty() {
            return cues;
        }

        let max_group = self.config.max_group_size.max(1);
        let mut group_start = 0;

        for i in 1..words.len() {
            let gap = words[i].start - words[i - 1].end;
            let group_len = i - group_start;
            if gap > self.config.pause_threshold || group_len >= max_group {
                self.commit(words, group_start, i - 1, &mut cues);
                group_start = i;
            }
        }
        self.commit(words, group_start, words.len() - 1, &mut cues);

        cues
    }

    fn commit(&self, words: &[Word], start_index: usize, end_index: usize, cues: &mut Vec<Cue>) {
        let size = end_index - start_index + 1;
        if size < self.config.min_group_size {
            tracing::trace!(start_index, end_index, size, "Dropping undersized word group");
            return;
        }
        cues.push(Cue {
            start_index,
            end_index,
            start: words[start_index].start,
            end: words[end_index].end,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn w(text: &str, start: f64, end: f64) -> Word {
        Word::new(text, start, end)
    }

    fn segmenter(pause: f64, min: usize, max: usize) -> TranscriptSegmenter {
        TranscriptSegmenter::new(SegmenterConfig {
            pause_threshold: pause,
            min_group_size: min,
            max_group_size: max,
        })
    }

    #[test]
    fn test_undersized_group_dropped_not_merged() {
        let words = vec![
            w("a", 0.0, 0.3),
            w("b", 0.31, 0.6),
            w("c", 1.5, 1.8),
            w("d", 1.81, 2.1),
            w("e", 2.11, 2.4),
        ];
        let cues = segmenter(0.7, 3, 8).segment(&words);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].start_index, 2);
        assert_eq!(cues[0].end_index, 4);
        assert!((cues[0].start - 1.5).abs() < 1e-9);
        assert!((cues[0].end - 2.4).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input() {
        assert!(TranscriptSegmenter::with_defaults().segment(&[]).is_empty());
    }

    #[test]
    fn test_contiguous_block_split_at_max() {
        let words: Vec<Word> = (0..10)
            .map(|i| w("x", i as f64 * 0.2, i as f64 * 0.2 + 0.2))
            .collect();
        let cues = segmenter(0.7, 1, 4).segment(&words);
        let sizes: Vec<usize> = cues.iter().map(Cue::word_count).collect();
        assert_eq!(sizes, [4, 4, 2]);
    }

    #[test]
    fn test_trailing_group_follows_min_rule() {
        let words: Vec<Word> = (0..5)
            .map(|i| w("x", i as f64 * 0.2, i as f64 * 0.2 + 0.2))
            .collect();
        let cues = segmenter(0.7, 2, 4).segment(&words);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].word_count(), 4);
    }

    #[test]
    fn test_gap_equal_to_threshold_does_not_split() {
        let words = vec![w("a", 0.0, 0.5), w("b", 1.0, 1.5), w("c", 2.0, 2.5)];
        let cues = segmenter(0.5, 1, 8).segment(&words);
        assert_eq!(cues.len(), 1);
    }

    #[test]
    fn test_closed_interval_containment() {
        let cue = Cue {
            start_index: 0,
            end_index: 1,
            start: 1.0,
            end: 2.0,
        };
        assert!(cue.contains_span(1.0, 2.0));
        assert!(!cue.contains_span(0.99, 1.5));
        assert!(!cue.contains_span(1.5, 2.01));
    }

    fn arb_words() -> impl Strategy<Value = Vec<Word>> {
        prop::collection::vec((0.0f64..2.0, 0.05f64..0.8), 0..60).prop_map(|steps| {
            let mut t = 0.0;
            steps
                .into_iter()
                .map(|(gap, len)| {
                    let start = t + gap;
                    let end = start + len;
                    t = end;
                    Word::new("w", start, end)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_cue_sizes_within_bounds(
            words in arb_words(),
            min in 1usize..5,
            extra in 0usize..6,
            pause in 0.1f64..1.5,
        ) {
            let max = min + extra;
            let cues = segmenter(pause, min, max).segment(&words);
            let mut last_end: Option<usize> = None;
            for cue in &cues {
                prop_assert!(cue.word_count() >= min);
                prop_assert!(cue.word_count() <= max);
                prop_assert!(cue.end_index >= cue.start_index);
                if let Some(prev) = last_end {
                    prop_assert!(cue.start_index > prev);
                }
                last_end = Some(cue.end_index);
                prop_assert_eq!(cue.start, words[cue.start_index].start);
                prop_assert_eq!(cue.end, words[cue.end_index].end);
            }
        }

        #[test]
        fn prop_no_cue_spans_a_long_pause(words in arb_words(), pause in 0.1f64..1.5) {
            let cues = segmenter(pause, 1, 8).segment(&words);
            for cue in &cues {
                for pair in cue.words(&words).windows(2) {
                    prop_assert!(pair[1].start - pair[0].end <= pause);
                }
            }
        }

        #[test]
        fn prop_min_one_covers_every_word(words in arb_words(), pause in 0.1f64..1.5) {
            let cues = segmenter(pause, 1, 8).segment(&words);
            let covered: usize = cues.iter().map(Cue::word_count).sum();
            prop_assert_eq!(covered, words.len());
        }
    }
}
