//! Tracing setup for the relay and the terminal client.
//!
//! All entry points share one subscriber shape: an `EnvFilter` seeded from
//! the configured level, plus a single fmt layer whose writer differs.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{RelayError, Result};

/// Map a configured level name to a tracing level. Unknown names mean info.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Filter honoring `RUST_LOG`, with `level` as the floor directive.
fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(parse_level(level).into())
}

/// Where log lines go.
struct Sink<W> {
    writer: W,
    ansi: bool,
    target: bool,
}

impl<W> Sink<W>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    /// Install this sink as the global subscriber.
    fn install(self, level: &str) -> Result<()> {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(self.writer)
                    .with_ansi(self.ansi)
                    .with_target(self.target),
            )
            .with(level_filter(level))
            .try_init()
            .map_err(|e| RelayError::Config(format!("logging already initialized: {e}")))
    }
}

/// Open the log file, creating its parent directory when needed.
fn open_log_file(path: &str) -> Result<File> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(File::create(path)?)
}

/// Log to stdout and to the configured file.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let file = Arc::new(open_log_file(&config.file)?);
    Sink {
        writer: std::io::stdout.and(file),
        ansi: false,
        target: true,
    }
    .install(&config.level)
}

/// Log to stdout only. Fallback when the log file can't be opened.
pub fn init_console_only(level: &str) -> Result<()> {
    Sink {
        writer: std::io::stdout,
        ansi: true,
        target: true,
    }
    .install(level)
}

/// Log to stderr only, keeping stdout free for chat output.
pub fn init_stderr(level: &str) -> Result<()> {
    Sink {
        writer: std::io::stderr,
        ansi: true,
        target: false,
    }
    .install(level)
}
