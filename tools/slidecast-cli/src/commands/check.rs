//! Check that the external encoder is available.

use slidecast_common::config::AppConfig;
use slidecast_render_engine::FfmpegEncoder;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Slidecast System Check");
    println!("{}", "=".repeat(50));

    let encoder = FfmpegEncoder::from_config(&config.pipeline);
    let encoder_ok = encoder.is_available();
    if encoder_ok {
        println!("[OK] ffmpeg and ffprobe found on PATH");
    } else {
        println!("[MISSING] ffmpeg/ffprobe not found on PATH");
        println!("     Install ffmpeg (with libass and libx264) from your package manager.");
    }

    println!("[OK] Workspace root: {}", config.workspace_root.display());
    println!("[OK] Output dir: {}", config.output_dir.display());
    println!("[OK] Events dir: {}", config.events_dir.display());
    println!(
        "     Budget: {:.0}s per run, {}s per encode, cleanup {}",
        config.pipeline.run_timeout_secs,
        config.pipeline.encoder_timeout_secs,
        if config.pipeline.cleanup { "on" } else { "off" }
    );

    println!();
    if encoder_ok {
        println!("All required tools are available. Slidecast is ready.");
    } else {
        println!("Some required tools are missing. See above for fixes.");
    }
    Ok(())
}
