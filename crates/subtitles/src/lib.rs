//! Slidecast Subtitles
//!
//! Burned-in subtitle synthesis:
//! - **ASS documents:** script header, style records, dialogue events
//! - **Layout:** cue text wrapped into a bounded number of lines
//! - **Karaoke:** a base line per cue plus one highlight overlay per word
//! - **Title:** panel, glow and gradient text for the opening title

pub mod ass;
pub mod karaoke;
pub mod layout;
pub mod title;

pub use ass::{format_ass_time, AssDocument, Dialogue};
pub use karaoke::{CueRenderer, SubtitleRenderConfig};
pub use layout::{LineLayout, WrapOptions};
