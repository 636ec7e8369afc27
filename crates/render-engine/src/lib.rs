//! Slidecast Render Engine
//!
//! Turns a validated job into a finished narrated video by driving an
//! external encoder through a fixed sequence of stages.
//!
//! # Pipeline Architecture
//!
//! ```text
//! images ──── fetch ── scene clips (Ken Burns) ──┐
//!                                                ├── xfade concat
//! voice ───── fetch ─────────────────────────────┤
//! background ─ fetch ── ducked under voice ──────┴── audio mix
//!                                                        │
//! transcript ─ fetch ── cues ── karaoke ASS ─────────────┤ subtitle ladder
//!                                                        │
//! title ─────────────── title ASS ───────────────────────┤
//!                                                        ▼
//!                                               output_<id>.mp4
//! ```
//!
//! Every transient file lives in a per-run workspace tracked by a
//! [`ledger::ResourceLedger`] and is removed on every exit path.

pub mod commands;
pub mod concat;
pub mod encoder;
pub mod events;
pub mod fetcher;
pub mod ladder;
pub mod ledger;
pub mod pipeline;

pub use concat::{CumulativeConcat, ProbedConcat, ScenePlanStrategy};
pub use encoder::{probe_duration, EncoderOutput, FfmpegEncoder, MediaEncoder};
pub use events::{EventRecord, EventSink, JsonlEventSink, MemoryEventSink, TracingEventSink};
pub use fetcher::{HttpFetcher, ResourceFetcher};
pub use ladder::SubtitleOutcome;
pub use ledger::ResourceLedger;
pub use pipeline::{FetchedAssets, PipelineController};
