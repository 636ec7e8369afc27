//! Slidecast Job Model
//!
//! Defines the data contracts shared by the pipeline:
//! - **Job:** the submission contract (images, durations, voice, optional
//!   background, transcript, and title) and its validation rules
//! - **JobResult / PipelineStage:** what a finished run reports
//! - **Transcript:** timed words, caption lines, and the formats they are
//!   parsed from
//!
//! All times are seconds as `f64`.

pub mod job;
pub mod transcript;

pub use job::*;
pub use transcript::*;
