use std::{fs, path::Path};

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod formatter;
pub mod writer;

pub use formatter::LineFormatter;
pub use writer::RotatingFileWriter;

use crate::configs::Config;

/// Installs the global subscriber: console output plus an optional
/// line-capped log file. `RUST_LOG` wins over the configured level.
pub fn init(config: &Config) {
    let level = config.logging.level.as_deref().unwrap_or("info");
    let filter_str = match config.logging.filters.as_deref() {
        Some(extra) if !extra.is_empty() => format!("{level},{extra}"),
        _ => level.to_string(),
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    let stdout_layer = fmt::layer()
        .event_format(LineFormatter::new(true))
        .with_ansi(true);

    let file_layer = config.logging.file.as_ref().and_then(|file| {
        if let Some(parent) = Path::new(&file.path).parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Failed to create log directory: {e}");
                return None;
            }
        }
        match RotatingFileWriter::open(&file.path, file.max_lines) {
            Ok(writer) => Some(
                fmt::layer()
                    .with_writer(writer)
                    .event_format(LineFormatter::new(false))
                    .with_ansi(false),
            ),
            Err(e) => {
                eprintln!("Failed to open log file {}: {e}", file.path);
                None
            }
        }
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();
}
