//! Validate a job file.

use std::path::PathBuf;

use slidecast_job_model::Job;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating job at: {}", path.display());

    let job = Job::load(&path).map_err(|e| anyhow::anyhow!("Failed to load job: {e}"))?;

    println!("  ID: {}", job.id);
    println!("  Images: {}", job.images.len());
    println!("  Total duration: {:.2}s", job.total_duration_secs());
    println!("  Voice: {}", job.voice);
    if let Some(bg) = &job.background {
        println!("  Background: {bg}");
    }
    if let Some(transcript) = &job.transcript {
        println!("  Transcript: {transcript}");
    }
    if let Some(title) = job.display_title() {
        println!("  Title: {title}");
    }

    match job.validate() {
        Ok(()) => {
            println!("\nJob is valid.");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Job is invalid: {e}")),
    }
}
