//! Slidecast CLI: render narrated slideshow videos from job files.
//!
//! Usage:
//!   slidecast render <JOB>        Run a job through the full pipeline
//!   slidecast validate <JOB>      Validate a job file
//!   slidecast plan <JOB>          Print the scene plan and encoder arguments
//!   slidecast subtitles <FILE>    Convert a transcript into an ASS document
//!   slidecast check               Check for the external encoder
//!   slidecast config              Print (or save) the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use slidecast_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "slidecast",
    about = "Narrated slideshow videos with karaoke subtitles",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file (defaults to the user config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job through the full pipeline
    Render {
        /// Path to the job JSON file
        job: PathBuf,

        /// Directory receiving output_<id>.mp4
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Root directory for per-job workspaces
        #[arg(long)]
        workspace: Option<PathBuf>,

        /// Keep the job workspace after the run
        #[arg(long)]
        keep_workspace: bool,

        /// Overall time budget in seconds
        #[arg(long)]
        timeout_secs: Option<f64>,

        /// Log pipeline events instead of writing the events file
        #[arg(long)]
        no_event_log: bool,
    },

    /// Validate a job file
    Validate {
        /// Path to the job JSON file
        job: PathBuf,
    },

    /// Print the scene plan and encoder arguments for a job
    Plan {
        /// Path to the job JSON file
        job: PathBuf,
    },

    /// Convert a transcript into a karaoke ASS document
    Subtitles {
        /// Transcript file (JSON word timings, SRT or WebVTT)
        transcript: PathBuf,

        /// Output .ass path
        #[arg(short, long)]
        output: PathBuf,

        /// Title decoration to include
        #[arg(long)]
        title: Option<String>,
    },

    /// Check for the external encoder
    Check,

    /// Print the effective configuration
    Config {
        /// Write it to the user config location
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    slidecast_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Render {
            job,
            output_dir,
            workspace,
            keep_workspace,
            timeout_secs,
            no_event_log,
        } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(dir) = workspace {
                config.workspace_root = dir;
            }
            if keep_workspace {
                config.pipeline.cleanup = false;
            }
            if let Some(secs) = timeout_secs {
                config.pipeline.run_timeout_secs = secs;
            }
            config.validate()?;
            commands::render::run(job, config, !no_event_log).await
        }
        Commands::Validate { job } => commands::validate::run(job),
        Commands::Plan { job } => commands::plan::run(job, &config),
        Commands::Subtitles {
            transcript,
            output,
            title,
        } => commands::subtitles::run(transcript, output, title, &config),
        Commands::Check => commands::check::run(&config),
        Commands::Config { save } => commands::config::run(&config, save),
    }
}
