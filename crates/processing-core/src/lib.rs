//! Slidecast Processing Core
//!
//! Turns job data into editing decisions:
//! - **Segmenter:** group timed transcript words into subtitle cues
//! - **Scene Plan:** Ken Burns motion per image, cross-fade graph between
//!   clips, and the encoder arguments realising both
//!
//! This crate is pure computation: no I/O, no process spawning.
//! All inputs are data; all outputs are data.

pub mod scene_plan;
pub mod segmenter;

pub use scene_plan::{ScenePlanConfig, ScenePlanner};
pub use segmenter::{Cue, SegmenterConfig, TranscriptSegmenter};
