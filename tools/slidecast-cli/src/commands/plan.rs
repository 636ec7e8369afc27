//! Print the scene plan for a job without running anything.

use std::path::PathBuf;

use slidecast_common::config::AppConfig;
use slidecast_job_model::Job;
use slidecast_processing_core::scene_plan::ScenePlanConfig;
use slidecast_processing_core::ScenePlanner;

pub fn run(path: PathBuf, config: &AppConfig) -> anyhow::Result<()> {
    let job = Job::load(&path).map_err(|e| anyhow::anyhow!("Failed to load job: {e}"))?;
    job.validate()
        .map_err(|e| anyhow::anyhow!("Job is invalid: {e}"))?;

    let planner = ScenePlanner::new(ScenePlanConfig::from_configs(&config.compose, &config.pipeline));
    let images: Vec<PathBuf> = job.images.iter().map(PathBuf::from).collect();
    let scenes = planner.plan_scenes(&images, &job.durations)?;
    let transitions = planner.transitions(&scenes)?;

    println!("Job: {}", job.id);
    println!();
    println!("Scenes:");
    for scene in &scenes {
        println!(
            "  #{:<3} {:<28} {:>6.2}s {:>5} frames  {}",
            scene.index,
            scene.variant.name(),
            scene.duration,
            scene.frames,
            scene.image.display()
        );
        println!("       {}", planner.scene_filter(scene));
    }

    println!();
    println!("Transitions (planned offsets):");
    if transitions.is_empty() {
        println!("  none");
    }
    for tr in &transitions {
        println!(
            "  {} -> {}  {:<12} offset {:.3}s  duration {:.3}s",
            tr.from + 1,
            tr.to + 1,
            tr.effect,
            tr.offset,
            tr.duration
        );
    }

    println!();
    println!("Strategy: {:?}", config.compose.concat_strategy);
    Ok(())
}
