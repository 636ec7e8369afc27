//! Concatenation of rendered scene clips with cross-fades.
//!
//! Two strategies:
//! - [`ProbedConcat`] joins pairwise, probing the running concatenation
//!   before each join so offsets follow the real encoded length.
//! - [`CumulativeConcat`] computes every offset from planned durations
//!   and joins all clips in one encoder pass.

use std::path::PathBuf;

use async_trait::async_trait;
use slidecast_common::config::ConcatStrategyKind;
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_processing_core::scene_plan::Scene;
use slidecast_processing_core::ScenePlanner;
use tokio_util::sync::CancellationToken;

use crate::encoder::{probe_duration, MediaEncoder};
use crate::ledger::ResourceLedger;

const STAGE: &str = "concatenated";

/// Everything a strategy needs from the running pipeline.
pub struct ConcatContext<'a> {
    pub planner: &'a ScenePlanner,
    pub scenes: &'a [Scene],
    pub encoder: &'a dyn MediaEncoder,
    pub ledger: &'a mut ResourceLedger,
    pub cancel: &'a CancellationToken,
}

/// Strategy producing one video from the scene clips.
#[async_trait]
pub trait ScenePlanStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Join `clips` (one per scene, in order) and return the result.
    async fn concatenate(
        &self,
        ctx: &mut ConcatContext<'_>,
        clips: &[PathBuf],
    ) -> SlidecastResult<PathBuf>;
}

pub fn strategy_for(kind: ConcatStrategyKind) -> Box<dyn ScenePlanStrategy> {
    match kind {
        ConcatStrategyKind::Probed => Box::new(ProbedConcat),
        ConcatStrategyKind::Cumulative => Box::new(CumulativeConcat),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProbedConcat;

#[async_trait]
impl ScenePlanStrategy for ProbedConcat {
    fn name(&self) -> &'static str {
        "probed"
    }

    async fn concatenate(
        &self,
        ctx: &mut ConcatContext<'_>,
        clips: &[PathBuf],
    ) -> SlidecastResult<PathBuf> {
        let (first, rest) = split_clips(clips)?;
        let mut running = first.clone();
        for (i, next) in rest.iter().enumerate() {
            let join = i;
            let running_duration = probe_duration(ctx.encoder, &running, ctx.cancel)
                .await
                .map_err(|e| SlidecastError::encoder(STAGE, e))?;
            let transition = ctx
                .planner
                .probed_transition(join, running_duration)
                .map_err(|e| SlidecastError::Other(e.into()))?;
            let output = ctx.ledger.allocate(&format!("concat_{:03}.mp4", join + 1));
            tracing::debug!(
                join,
                effect = %transition.effect,
                running_duration,
                offset = transition.offset,
                "Joining clip"
            );
            let args = ctx.planner.join_args(&running, next, &transition, &output);
            ctx.encoder
                .invoke(&args, ctx.cancel)
                .await
                .map_err(|e| SlidecastError::encoder(STAGE, e))?;
            running = output;
        }
        Ok(running)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CumulativeConcat;

#[async_trait]
impl ScenePlanStrategy for CumulativeConcat {
    fn name(&self) -> &'static str {
        "cumulative"
    }

    async fn concatenate(
        &self,
        ctx: &mut ConcatContext<'_>,
        clips: &[PathBuf],
    ) -> SlidecastResult<PathBuf> {
        let (first, rest) = split_clips(clips)?;
        if rest.is_empty() {
            return Ok(first.clone());
        }
        let transitions = ctx
            .planner
            .transitions(ctx.scenes)
            .map_err(|e| SlidecastError::Other(e.into()))?;
        let output = ctx.ledger.allocate("concat.mp4");
        let args = ctx.planner.concat_args(clips, &transitions, &output);
        ctx.encoder
            .invoke(&args, ctx.cancel)
            .await
            .map_err(|e| SlidecastError::encoder(STAGE, e))?;
        Ok(output)
    }
}

fn split_clips(clips: &[PathBuf]) -> SlidecastResult<(&PathBuf, &[PathBuf])> {
    clips
        .split_first()
        .ok_or_else(|| SlidecastError::invalid_job("no scene clips to concatenate"))
}
