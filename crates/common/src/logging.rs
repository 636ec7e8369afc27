//! Logging and tracing initialization.

use crate::config::LoggingConfig;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Initialize the tracing subscriber with the given configuration.
///
/// Only binaries call this; library code logs through `tracing` and
/// inherits whatever subscriber the host installed.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let writer = make_writer(config);

    if config.json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .with_ansi(config.file.is_none())
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}

fn make_writer(config: &LoggingConfig) -> BoxMakeWriter {
    if let Some(path) = &config.file {
        let opened = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path);
        match opened {
            Ok(file) => return BoxMakeWriter::new(std::sync::Mutex::new(file)),
            Err(e) => eprintln!("cannot open log file {}: {e}", path.display()),
        }
    }
    BoxMakeWriter::new(std::io::stderr)
}
